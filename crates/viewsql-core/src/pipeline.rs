//! Repair, normalize, validate and generate in one call.

use crate::error::TranslationFailure;
use crate::generate::{GeneratedSql, SqlGenerator};
use crate::model::ViewDocument;
use crate::normalize::normalize;
use crate::repair::{RepairStrategy, Repairer};
use crate::validate::{ValidatedView, ValidationResult};
use serde_json::Value;
use tracing::debug;
use viewsql_config::CompilerConfig;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileInput<'a> {
    /// Untrusted text, run through ingestion repair first
    Text(&'a str),
    /// A structured value from a trusted caller
    Value(Value),
}

/// Everything produced for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
    /// The canonical document
    pub document: Value,
    pub validation: ValidationResult,
    /// Present only when the document is valid and every path translated
    pub sql: Option<GeneratedSql>,
    /// Columns, iteration sources and filters that failed to translate
    pub failures: Vec<TranslationFailure>,
    /// Repair strategy used for text input
    pub repair: Option<RepairStrategy>,
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        self.sql.is_some()
    }
}

/// Runs the full compilation pipeline with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Compile a document. `profile` overrides the configured default
    /// profile for the synthesized filter and the repair fallback.
    pub fn compile(&self, input: CompileInput<'_>, profile: Option<&str>) -> CompileOutcome {
        let profile = profile.or(self.config.ingestion.default_profile.as_deref());

        let (raw, repair) = match input {
            CompileInput::Text(text) => {
                let repaired = Repairer::new(self.config.ingestion.clone()).repair(text, profile);
                (repaired.value, Some(repaired.strategy))
            }
            CompileInput::Value(value) => (value, None),
        };

        let document = normalize(raw, profile);
        let mut outcome = CompileOutcome {
            document,
            validation: ValidationResult::default(),
            sql: None,
            failures: Vec::new(),
            repair,
        };

        let doc = match ViewDocument::from_value(outcome.document.clone()) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("Normalized document does not deserialize: {}", e);
                outcome.validation = ValidationResult::invalid(format!("document: {}", e));
                return outcome;
            }
        };

        let view = match ValidatedView::new(&doc) {
            Ok(view) => view,
            Err(result) => {
                outcome.validation = result;
                return outcome;
            }
        };
        outcome.validation = ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: view.warnings().to_vec(),
        };

        match SqlGenerator::new(self.config.clone()).generate(&view) {
            Ok(sql) => outcome.sql = Some(sql),
            Err(e) => outcome.failures = e.failures().to_vec(),
        }

        outcome
    }
}

/// Compile with the default configuration
pub fn compile(input: CompileInput<'_>, profile: Option<&str>) -> CompileOutcome {
    Compiler::default().compile(input, profile)
}
