use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A server-side configured assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Assistant {
    /// Name shown in lists; unnamed assistants are shown by id
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.id)
    }

    /// Icon stored in `metadata.icon`
    pub fn icon(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("icon")?.as_str()
    }
}

/// Body of `POST /assistants`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
