use std::io::Write;

use aify_core::session::RunnerOptions;
use aify_core::{ApiClient, ChatBackend, CoreConfig, Directory, SessionEvent, SessionRunner};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use super::render::{error_line, history_line, ReplyPrinter, DIM, PROMPT, RESET};

const QUIT_COMMAND: &str = "/quit";

/// Interactive chat on one thread. Each input line becomes a run; Ctrl-C
/// aborts a run in flight and exits when idle.
pub async fn run_chat(
    client: ApiClient,
    config: &CoreConfig,
    thread_id: String,
    assistant: Option<String>,
) -> Result<()> {
    let directory = Directory::load(&client)
        .await
        .context("Failed to load assistants and threads")?;
    let assistant_id = match assistant {
        Some(id) => id,
        None => directory
            .thread(&thread_id)
            .and_then(|t| t.assistant_id())
            .map(str::to_string)
            .with_context(|| format!("Thread {} has no assistant, pass --assistant", thread_id))?,
    };
    let title = directory
        .assistant(&assistant_id)
        .map(|a| a.display_name().to_string())
        .unwrap_or_else(|| assistant_id.clone());
    let directory = directory.into_shared();

    let (mut runner, mut events) = SessionRunner::new(
        client,
        Some(assistant_id),
        Some(thread_id.clone()),
        RunnerOptions::from(config),
    );
    runner.on_reply_committed(Directory::preview_updater(&directory));

    runner.load_history().await;
    while events.try_recv().is_ok() {}

    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "{DIM}{title} on {thread_id}. Ctrl-C stops a reply, {QUIT_COMMAND} exits.{RESET}"
    )?;
    for message in runner.session().history() {
        writeln!(stdout, "{}", history_line(message))?;
    }

    let mut printer = ReplyPrinter::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            writeln!(stdout)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == QUIT_COMMAND {
            break;
        }

        submit_line(&mut runner, &mut events, &mut printer, &line).await?;
    }

    if let Some(preview) = directory.lock().preview(&thread_id) {
        writeln!(stdout, "{DIM}last reply: {preview}{RESET}")?;
    }
    Ok(())
}

async fn submit_line<B: ChatBackend>(
    runner: &mut SessionRunner<B>,
    events: &mut UnboundedReceiver<SessionEvent>,
    printer: &mut ReplyPrinter,
    line: &str,
) -> Result<()> {
    let abort = runner.abort_handle();
    let mut stdout = std::io::stdout();

    let submit = runner.submit(Some(line));
    tokio::pin!(submit);
    let result = loop {
        tokio::select! {
            Some(event) = events.recv() => write_event(&mut stdout, printer, &event)?,
            result = &mut submit => break result,
            _ = tokio::signal::ctrl_c() => {
                abort.abort();
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        write_event(&mut stdout, printer, &event)?;
    }

    // Transport failures leave the session usable
    if let Err(e) = result {
        writeln!(stdout, "{}", error_line(&e))?;
    }
    Ok(())
}

fn write_event(
    out: &mut impl Write,
    printer: &mut ReplyPrinter,
    event: &SessionEvent,
) -> std::io::Result<()> {
    if let Some(text) = printer.render(event) {
        write!(out, "{}", text)?;
        out.flush()?;
    }
    Ok(())
}
