use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber.
///
/// `AIFY_LOG` sets the filter (default `warn`). With `AIFY_LOG_FILE` set,
/// output is appended to that file instead of stderr so it doesn't tear
/// through streamed replies.
pub fn init_tracing() {
    let filter = || {
        EnvFilter::try_from_env("AIFY_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    let file_logging = std::env::var("AIFY_LOG_FILE").ok().filter(|p| !p.is_empty());

    let file = file_logging.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let registry = tracing_subscriber::registry();
    let result = match file {
        Some(file) => registry
            .with(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(filter()),
            )
            .try_init(),
        None => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter()),
            )
            .try_init(),
    };

    if result.is_err() {
        // Already installed, e.g. by a test harness
        return;
    }
    if let Some(path) = file_logging {
        tracing::debug!(path = %path, "file logging enabled");
    }
}
