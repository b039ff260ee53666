use serde::{Deserialize, Serialize};

/// Paged list envelope returned by every `GET` collection route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "default_list_object")]
    pub object: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub first_id: Option<String>,
    #[serde(default)]
    pub last_id: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

fn default_list_object() -> String {
    "list".to_string()
}

/// Result of a `DELETE` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionStatus {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_defaults() {
        let list: ListResponse<String> = serde_json::from_str("{}").unwrap();
        assert_eq!(list.object, "list");
        assert!(list.data.is_empty());
        assert!(!list.has_more);
    }
}
