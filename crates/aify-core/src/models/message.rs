use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Anything the server sends that is not `user` is rendered as the assistant.
    pub fn from_wire(role: Option<&str>) -> Self {
        match role {
            Some("user") => Role::User,
            _ => Role::Assistant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a session's history. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<Vec<MessageText>>,
}

/// Message as returned by `GET /threads/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRead {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Vec<MessageContent>>,
    #[serde(default)]
    pub extra: Option<String>,
}

impl MessageRead {
    /// First text value of the first content part, empty when the server sent none
    pub fn text(&self) -> &str {
        self.content
            .as_deref()
            .and_then(|parts| parts.first())
            .and_then(|part| part.text.as_deref())
            .and_then(|texts| texts.first())
            .map(|t| t.value.as_str())
            .unwrap_or("")
    }

    /// Flatten into a history entry, appending `extra` after a blank line when present
    pub fn to_message(&self) -> Message {
        let mut content = self.text().to_string();
        if let Some(extra) = self.extra.as_deref().filter(|e| !e.is_empty()) {
            content.push_str("\n\n");
            content.push_str(extra);
        }
        Message {
            role: Role::from_wire(self.role.as_deref()),
            content,
        }
    }
}

/// Body of `POST /threads/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    pub role: Role,
    pub content: String,
}
