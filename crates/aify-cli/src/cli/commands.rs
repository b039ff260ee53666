use aify_core::models::{AssistantCreate, MessageRead, ThreadCreate};
use aify_core::secure_storage::SecureStorage;
use aify_core::{ApiClient, CoreConfig, Directory};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::info;

use super::args::{Cli, Commands};
use super::output::{assistant_json, history_json, print_json, thread_json};
use super::repl;
use super::setup::{authenticated_client, resolve_config};

/// Run one parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.base_url.as_deref())?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Login { username, password } => {
            let value = login(&config, &username, &password).await?;
            print_json(&value, pretty)
        }
        Commands::Logout => {
            let storage = SecureStorage::for_server(&config.base_url);
            storage.delete().context("Failed to remove stored secret key")?;
            print_json(&json!({"logged_out": storage.account()}), pretty)
        }
        Commands::Assistants => {
            let client = authenticated_client(&config)?;
            let assistants = client
                .list_assistants()
                .await
                .context("Failed to list assistants")?;
            let value: Vec<Value> = assistants.iter().map(assistant_json).collect();
            print_json(&value, pretty)
        }
        Commands::NewAssistant {
            name,
            description,
            instructions,
            icon,
            tools,
            metadata,
        } => {
            let client = authenticated_client(&config)?;
            let request = assistant_request(
                name,
                description,
                instructions,
                icon,
                tools.as_deref(),
                metadata.as_deref(),
            )?;
            let assistant = client
                .create_assistant(&request)
                .await
                .context("Failed to create assistant")?;
            print_json(&assistant_json(&assistant), pretty)
        }
        Commands::DeleteAssistant { assistant_id } => {
            let client = authenticated_client(&config)?;
            let status = client
                .delete_assistant(&assistant_id)
                .await
                .with_context(|| format!("Failed to delete assistant {}", assistant_id))?;
            print_json(&status, pretty)
        }
        Commands::Threads => {
            let client = authenticated_client(&config)?;
            let directory = Directory::load(&client)
                .await
                .context("Failed to list threads")?;
            let value: Vec<Value> = directory
                .threads()
                .iter()
                .map(|t| thread_json(t, &directory))
                .collect();
            print_json(&value, pretty)
        }
        Commands::NewThread { assistant_id } => {
            let client = authenticated_client(&config)?;
            let value = new_thread(&client, &assistant_id).await?;
            print_json(&value, pretty)
        }
        Commands::DeleteThread { thread_id } => {
            let client = authenticated_client(&config)?;
            let status = client
                .delete_thread(&thread_id)
                .await
                .with_context(|| format!("Failed to delete thread {}", thread_id))?;
            print_json(&status, pretty)
        }
        Commands::History { thread_id } => {
            let client = authenticated_client(&config)?;
            let messages = client
                .list_messages(&thread_id, config.history_limit)
                .await
                .with_context(|| format!("Failed to load messages of {}", thread_id))?;
            let history: Vec<_> = messages.data.iter().rev().map(MessageRead::to_message).collect();
            print_json(&history_json(&history), pretty)
        }
        Commands::Chat { thread_id, assistant } => {
            let client = authenticated_client(&config)?;
            repl::run_chat(client, &config, thread_id, assistant).await
        }
    }
}

async fn login(config: &CoreConfig, username: &str, password: &str) -> Result<Value> {
    let client = ApiClient::new(config);
    let result = client
        .login(username, password)
        .await
        .with_context(|| format!("Login failed for {}", username))?;

    let storage = SecureStorage::for_server(client.base_url());
    storage
        .set(&result.secret_key.id)
        .context("Failed to store secret key in keyring")?;
    info!(username, server = storage.account(), "logged in");

    Ok(json!({
        "user_id": result.user.id,
        "username": result.user.username.as_deref().unwrap_or(username),
        "server": storage.account(),
    }))
}

/// Create a thread whose metadata names the assistant
async fn new_thread(client: &ApiClient, assistant_id: &str) -> Result<Value> {
    let assistant = client
        .get_assistant(assistant_id)
        .await
        .with_context(|| format!("Unknown assistant {}", assistant_id))?;
    let thread = client
        .create_thread(&ThreadCreate::for_assistant(&assistant.id, assistant.display_name()))
        .await
        .context("Failed to create thread")?;
    Ok(json!({
        "id": thread.id,
        "assistant_id": assistant.id,
        "assistant": assistant.display_name(),
    }))
}

/// Body for a new assistant. The icon lives in metadata; the model is left to the server.
fn assistant_request(
    name: String,
    description: Option<String>,
    instructions: Option<String>,
    icon: Option<String>,
    tools: Option<&str>,
    metadata: Option<&str>,
) -> Result<AssistantCreate> {
    let tools: Vec<Value> = match tools {
        Some(json) => serde_json::from_str(json).context("--tools must be a JSON array")?,
        None => Vec::new(),
    };
    let mut metadata: Map<String, Value> = match metadata {
        Some(json) => serde_json::from_str(json).context("--metadata must be a JSON object")?,
        None => Map::new(),
    };
    if let Some(icon) = icon {
        metadata.insert("icon".to_string(), Value::String(icon));
    }

    Ok(AssistantCreate {
        name,
        description,
        model: String::new(),
        instructions,
        tools,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_request_puts_icon_in_metadata() {
        let request = assistant_request(
            "Writer".to_string(),
            Some("Drafts text".to_string()),
            None,
            Some("pen".to_string()),
            Some(r#"[{"type": "retrieval"}]"#),
            Some(r#"{"team": "docs", "icon": "old"}"#),
        )
        .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "Writer",
                "description": "Drafts text",
                "model": "",
                "tools": [{"type": "retrieval"}],
                "metadata": {"team": "docs", "icon": "pen"}
            })
        );
    }

    #[test]
    fn test_assistant_request_defaults() {
        let request = assistant_request("Plain".to_string(), None, None, None, None, None).unwrap();
        assert!(request.tools.is_empty());
        assert!(request.metadata.is_empty());
    }

    #[test]
    fn test_assistant_request_rejects_bad_tools() {
        let err = assistant_request("X".to_string(), None, None, None, Some("{}"), None).unwrap_err();
        assert!(err.to_string().contains("--tools"));
    }
}
