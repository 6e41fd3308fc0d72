//! # viewsql configuration
//!
//! Typed configuration for the view-definition compiler. Every field has a
//! default, so an empty TOML document is a valid configuration.
//!
//! ```rust,no_run
//! use viewsql_config::CompilerConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CompilerConfig::load("viewsql.toml")?;
//!     println!("documents live in column {}", config.storage.json_column);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod components;
mod loader;

pub use components::*;
pub use loader::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the compiler pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// How documents are stored in the target tables.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Path translation settings.
    #[serde(default)]
    pub paths: PathConfig,
    /// Repair settings for untrusted document text.
    #[serde(default)]
    pub ingestion: IngestionConfig,
}
