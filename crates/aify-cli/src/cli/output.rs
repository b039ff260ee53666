use aify_core::models::{Assistant, Message, Thread};
use aify_core::Directory;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};

/// Print a value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

pub fn assistant_json(assistant: &Assistant) -> Value {
    json!({
        "id": assistant.id,
        "name": assistant.display_name(),
        "description": assistant.description,
        "icon": assistant.icon(),
    })
}

/// Thread with its assistant resolved through the directory
pub fn thread_json(thread: &Thread, directory: &Directory) -> Value {
    let assistant = directory
        .assistant_for_thread(&thread.id)
        .map(|a| a.display_name().to_string())
        .or_else(|| thread.assistant_name().map(str::to_string));
    json!({
        "id": thread.id,
        "assistant_id": thread.assistant_id(),
        "assistant": assistant,
        "created_at": thread.created_at,
    })
}

pub fn history_json(history: &[Message]) -> Value {
    Value::Array(
        history
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect(),
    )
}
