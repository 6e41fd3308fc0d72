//! Configuration components
//!
//! One module per pipeline concern.

pub mod ingestion;
pub mod paths;
pub mod storage;

pub use ingestion::*;
pub use paths::*;
pub use storage::*;
