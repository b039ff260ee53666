use std::path::Path;

use aify_core::secure_storage::{SecureStorage, SecureStorageError};
use aify_core::{ApiClient, CoreConfig};
use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Resolve config file + env, apply `--base-url`, then fill a missing secret
/// key from the keyring entry for that server.
pub fn resolve_config(config_path: Option<&Path>, base_url: Option<&str>) -> Result<CoreConfig> {
    let mut config = CoreConfig::resolve(config_path).context("Failed to load config")?;
    if let Some(url) = base_url {
        config.base_url = url.to_string();
    }

    if config.secret_key.is_none() {
        config.secret_key = stored_secret_key(&config.base_url);
    }
    Ok(config)
}

fn stored_secret_key(base_url: &str) -> Option<String> {
    match SecureStorage::for_server(base_url).get() {
        Ok(key) => Some(key),
        Err(SecureStorageError::KeyNotFound(_)) => {
            debug!(base_url, "no stored secret key");
            None
        }
        Err(e) => {
            warn!(base_url, error = %e, "keyring unavailable");
            None
        }
    }
}

/// Client for commands that need an authenticated session
pub fn authenticated_client(config: &CoreConfig) -> Result<ApiClient> {
    let client = ApiClient::new(config);
    if !client.has_secret_key() {
        anyhow::bail!(
            "No secret key for {}. Run `aify login <username>` or set AIFY_SECRET_KEY",
            client.base_url()
        );
    }
    Ok(client)
}
