//! Path expression translation.
//!
//! Two passes: [`syntax`] parses text into a syntax tree, [`lower`] turns
//! that tree into the dialect-independent [`ir`]. Dialect renderers in
//! [`crate::render`] produce SQL text from the IR.

pub mod ir;
mod lower;
pub mod syntax;

use crate::error::{TranslationError, TranslationResult};
use crate::render::{Dialect, FragmentRenderer};
use ir::{Extraction, Nav, Predicate};
use lower::Lowering;
use serde_json::Value;
use std::collections::BTreeMap;
use syntax::{parse_expression, Term};
use viewsql_config::{CompilerConfig, PathConfig};

/// Translates path expressions with a given field configuration and set of
/// document constants.
pub struct PathTranslator<'a> {
    lowering: Lowering<'a>,
}

impl<'a> PathTranslator<'a> {
    pub fn new(paths: &'a PathConfig, constants: &'a BTreeMap<String, Value>) -> Self {
        Self {
            lowering: Lowering::new(paths, constants),
        }
    }

    /// Lower a column path
    pub fn lower_column(&self, path: &str) -> TranslationResult<Extraction> {
        self.lowering.column(&single_term(path)?)
    }

    /// Lower a `forEach`/`forEachOrNull` source
    pub fn lower_iteration(&self, path: &str) -> TranslationResult<Vec<Nav>> {
        self.lowering.iteration(&single_term(path)?)
    }

    /// Lower a filter expression into its `and`-joined predicates
    pub fn lower_filter(&self, expression: &str) -> TranslationResult<Vec<Predicate>> {
        parse_expression(expression)?
            .terms
            .iter()
            .map(|term| self.lowering.predicate(term))
            .collect()
    }
}

fn single_term(path: &str) -> TranslationResult<Term> {
    let mut expression = parse_expression(path)?;
    if expression.terms.len() > 1 {
        return Err(TranslationError::Misplaced {
            offending: path.trim().to_string(),
            reason: "`and` is only supported in filters",
        });
    }
    Ok(expression.terms.remove(0))
}

/// Translate a column path into an extraction fragment for `dialect`, using
/// the default configuration and no constants.
///
/// # Example
///
/// ```
/// use viewsql_core::{translate, Dialect};
///
/// assert_eq!(translate("name[0].family", Dialect::Generic).unwrap(), "name[0].family");
/// assert_eq!(
///     translate("name.family.first()", Dialect::Sqlite).unwrap(),
///     "json_extract(resource, '$.name[0].family')"
/// );
/// assert!(translate("foo.bar(", Dialect::Generic).is_err());
/// ```
pub fn translate(path: &str, dialect: Dialect) -> TranslationResult<String> {
    let config = CompilerConfig::default();
    let constants = BTreeMap::new();
    let extraction = PathTranslator::new(&config.paths, &constants).lower_column(path)?;
    Ok(FragmentRenderer::new(dialect, &config.storage).extraction(&extraction))
}
