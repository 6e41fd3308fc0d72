//! # viewsql-core
//!
//! Compiles declarative view definitions (column projections, iteration
//! and filters written in a restricted path-expression language over JSON
//! documents) into SQL for a generic dialect and five named dialects.
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──► repair ──► normalize ──► validate ──► generate
//!                                         │             │
//!                                 ValidationResult  GeneratedSql
//! ```
//!
//! - [`repair`]: best-effort recovery of near-valid JSON text
//! - [`normalize`]: rewrites historical document shapes to the canonical one
//! - [`validate`]: structural errors and warnings with positional locators
//! - [`path`]: parses and lowers path expressions to a dialect-independent IR
//! - [`generate`]: renders full statements per [`Dialect`]
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use viewsql_core::{compile, CompileInput, Dialect};
//!
//! let outcome = compile(
//!     CompileInput::Value(json!({
//!         "status": "active",
//!         "resource": "Patient",
//!         "select": [{"column": [{"name": "id", "path": "getResourceKey()"}]}],
//!         "where": [{"expression": "active = true"}]
//!     })),
//!     None,
//! );
//!
//! let sql = outcome.sql.unwrap();
//! assert_eq!(sql.generic, "SELECT id AS id FROM Patient WHERE active = true");
//! assert!(sql.per_dialect[&Dialect::Sqlite].starts_with("SELECT json_extract("));
//! ```

pub mod error;
pub mod generate;
pub mod model;
pub mod normalize;
pub mod path;
pub mod pipeline;
pub mod render;
pub mod repair;
pub mod validate;

pub use error::{
    FailureSite, GenerateError, TranslationError, TranslationFailure, TranslationResult,
};
pub use generate::{GeneratedSql, SqlGenerator};
pub use model::{
    Column, ColumnLocator, FilterExpression, Iteration, JoinSpec, JoinType, SelectBlock, Status,
    ViewDocument,
};
pub use normalize::normalize;
pub use path::{translate, PathTranslator};
pub use pipeline::{compile, CompileInput, CompileOutcome, Compiler};
pub use render::{Dialect, UnknownDialect};
pub use repair::{repair, RepairStrategy, Repaired, Repairer};
pub use validate::{validate, ValidatedView, ValidationResult};

pub use viewsql_config::CompilerConfig;
