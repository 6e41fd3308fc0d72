//! Storage layout configuration
//!
//! Describes how entities are laid out in the tables generated SQL reads
//! from: one table per resource type, one JSON-typed column per entity.

use serde::{Deserialize, Serialize};

/// Storage layout of the target tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Column holding the JSON document of each entity.
    ///
    /// Default: "resource"
    #[serde(default = "default_json_column")]
    pub json_column: String,

    /// Field inside the document that holds the entity's stable key.
    ///
    /// Default: "id"
    #[serde(default = "default_key_field")]
    pub key_field: String,
}

fn default_json_column() -> String {
    "resource".to_string()
}

fn default_key_field() -> String {
    "id".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            json_column: default_json_column(),
            key_field: default_key_field(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_storage() {
        let config = StorageConfig::default();
        assert_eq!(config.json_column, "resource");
        assert_eq!(config.key_field, "id");
    }

    #[test]
    fn test_deserialize_partial_storage() {
        let config: StorageConfig = toml::from_str(r#"json_column = "doc""#).unwrap();
        assert_eq!(config.json_column, "doc");
        assert_eq!(config.key_field, "id");
    }
}
