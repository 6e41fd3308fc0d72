//! Error types for path translation and SQL generation

use std::fmt;
use thiserror::Error;

/// A path expression that cannot be translated.
///
/// Every variant carries the offending substring so callers can point at
/// the exact construct that was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("Empty path expression")]
    Empty,

    #[error("Syntax error near `{offending}`: {details}")]
    Syntax { offending: String, details: String },

    #[error("Unsupported function `{offending}`")]
    UnknownFunction { offending: String },

    #[error("Unsupported predicate `{offending}`: only `field = literal` is supported")]
    UnsupportedPredicate { offending: String },

    #[error("Unknown type `{name}` in `{offending}`")]
    UnknownType { name: String, offending: String },

    #[error("Undefined constant `%{name}`")]
    UndefinedConstant { name: String },

    #[error("Constant `%{name}` is not a scalar literal")]
    NonScalarConstant { name: String },

    #[error("`{offending}` is not allowed here: {reason}")]
    Misplaced {
        offending: String,
        reason: &'static str,
    },
}

/// Where in a document a translation failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSite {
    /// A column path, with the column's output name
    Column { locator: String, name: String },
    /// The `forEach`/`forEachOrNull` source of a block
    Iteration { locator: String },
    /// A `where` entry
    Filter { locator: String },
}

impl fmt::Display for FailureSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureSite::Column { locator, name } => write!(f, "{} ({})", locator, name),
            FailureSite::Iteration { locator } | FailureSite::Filter { locator } => {
                write!(f, "{}", locator)
            }
        }
    }
}

/// One failed translation inside a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{site}: {error}")]
pub struct TranslationFailure {
    pub site: FailureSite,
    pub error: TranslationError,
}

/// Errors from SQL generation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// One or more columns, iteration sources or filters failed to translate
    #[error("{} path expression(s) could not be translated: {}", .0.len(), join_failures(.0))]
    Translation(Vec<TranslationFailure>),
}

impl GenerateError {
    pub fn failures(&self) -> &[TranslationFailure] {
        match self {
            GenerateError::Translation(failures) => failures,
        }
    }
}

fn join_failures(failures: &[TranslationFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for translation
pub type TranslationResult<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_names_column() {
        let failure = TranslationFailure {
            site: FailureSite::Column {
                locator: "select[0].column[1]".to_string(),
                name: "phone".to_string(),
            },
            error: TranslationError::UnknownFunction {
                offending: "exists()".to_string(),
            },
        };

        assert_eq!(
            failure.to_string(),
            "select[0].column[1] (phone): Unsupported function `exists()`"
        );
    }

    #[test]
    fn test_generate_error_lists_all_failures() {
        let err = GenerateError::Translation(vec![
            TranslationFailure {
                site: FailureSite::Filter {
                    locator: "where[0]".to_string(),
                },
                error: TranslationError::Empty,
            },
            TranslationFailure {
                site: FailureSite::Iteration {
                    locator: "select[1].forEach".to_string(),
                },
                error: TranslationError::UndefinedConstant {
                    name: "x".to_string(),
                },
            },
        ]);

        let message = err.to_string();
        assert!(message.starts_with("2 path expression(s)"));
        assert!(message.contains("where[0]: Empty path expression"));
        assert!(message.contains("select[1].forEach: Undefined constant `%x`"));
        assert_eq!(err.failures().len(), 2);
    }
}
