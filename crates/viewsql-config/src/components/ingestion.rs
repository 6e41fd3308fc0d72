//! Ingestion configuration for untrusted document text

use serde::{Deserialize, Serialize};

/// Settings for ingestion repair and default filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Profile identifier used for the synthesized default filter when a
    /// caller does not supply one.
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Upper bound, in bytes, on the prefix of the document text that
    /// fragment recovery scans. Keys and values past it are not recovered.
    ///
    /// Default: 65536
    #[serde(default = "default_max_fragment_bytes")]
    pub max_fragment_bytes: usize,
}

fn default_max_fragment_bytes() -> usize {
    64 * 1024
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            default_profile: None,
            max_fragment_bytes: default_max_fragment_bytes(),
        }
    }
}
