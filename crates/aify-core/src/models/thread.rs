use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// A persisted conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Missing or null metadata is treated as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: Map<String, Value>,
}

impl Thread {
    /// Assistant this thread is bound to, via `metadata.assistant_id`
    pub fn assistant_id(&self) -> Option<&str> {
        self.metadata.get("assistant_id")?.as_str()
    }

    pub fn assistant_name(&self) -> Option<&str> {
        self.metadata.get("assistant_name")?.as_str()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of `POST /threads`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadCreate {
    pub metadata: Map<String, Value>,
}

impl ThreadCreate {
    pub fn for_assistant(assistant_id: &str, assistant_name: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("assistant_id".to_string(), json!(assistant_id));
        metadata.insert("assistant_name".to_string(), json!(assistant_name));
        Self { metadata }
    }
}
