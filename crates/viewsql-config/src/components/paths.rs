//! Path translation configuration

use serde::{Deserialize, Serialize};

/// Settings for the path expression translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Field names treated as multi-valued.
    ///
    /// A navigation step into one of these fields takes element 0 unless
    /// the path indexes, filters or consumes the collection explicitly.
    #[serde(default = "default_multi_valued_fields")]
    pub multi_valued_fields: Vec<String>,
}

fn default_multi_valued_fields() -> Vec<String> {
    [
        "address",
        "category",
        "coding",
        "communication",
        "component",
        "contact",
        "contained",
        "dosageInstruction",
        "extension",
        "generalPractitioner",
        "given",
        "identifier",
        "interpretation",
        "line",
        "link",
        "modifierExtension",
        "name",
        "note",
        "participant",
        "performer",
        "photo",
        "prefix",
        "profile",
        "qualification",
        "reasonCode",
        "referenceRange",
        "security",
        "suffix",
        "tag",
        "telecom",
    ]
    .iter()
    .map(|field| field.to_string())
    .collect()
}

impl PathConfig {
    /// Check whether a field is configured as multi-valued
    pub fn is_multi_valued(&self, field: &str) -> bool {
        self.multi_valued_fields.iter().any(|f| f == field)
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            multi_valued_fields: default_multi_valued_fields(),
        }
    }
}
