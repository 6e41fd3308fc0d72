//! Structural validation of view definitions.
//!
//! Collects every problem in one pass. Errors block SQL generation, warnings
//! never do. Each message starts with a locator such as
//! `select[2].column[0].name` so callers can map it back to the document.

use crate::model::{Column, JoinSpec, SelectBlock, Status, ViewDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Declared column types recognized without a warning
pub const KNOWN_COLUMN_TYPES: &[&str] = &[
    "base64Binary",
    "boolean",
    "canonical",
    "code",
    "date",
    "dateTime",
    "decimal",
    "id",
    "instant",
    "integer",
    "integer64",
    "markdown",
    "oid",
    "positiveInt",
    "string",
    "time",
    "unsignedInt",
    "uri",
    "url",
    "uuid",
];

static KEBAB_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid kebab-case regex"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// `%name` outside of quoted strings; quoted strings match the first branch
static CONSTANT_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'(?:[^'\\]|\\.)*'|%([A-Za-z_][A-Za-z0-9_]*)").expect("valid constant regex")
});

/// Outcome of validating a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True when there are no errors
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A result with a single error, for documents that could not be read
    pub fn invalid(error: String) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }
}

/// A document known to have no structural errors.
///
/// The only way to obtain one is [`ValidatedView::new`], so SQL generation
/// can never run on an invalid document.
#[derive(Debug, Clone)]
pub struct ValidatedView<'a> {
    document: &'a ViewDocument,
    warnings: Vec<String>,
}

impl<'a> ValidatedView<'a> {
    /// Validate `document`, returning the full result if it has errors
    pub fn new(document: &'a ViewDocument) -> Result<Self, ValidationResult> {
        let result = validate(document);
        if result.is_valid {
            Ok(Self {
                document,
                warnings: result.warnings,
            })
        } else {
            Err(result)
        }
    }

    pub fn document(&self) -> &'a ViewDocument {
        self.document
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Default)]
struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Diagnostics {
    fn error(&mut self, locator: impl AsRef<str>, message: impl AsRef<str>) {
        self.errors
            .push(format!("{}: {}", locator.as_ref(), message.as_ref()));
    }

    fn warning(&mut self, locator: impl AsRef<str>, message: impl AsRef<str>) {
        self.warnings
            .push(format!("{}: {}", locator.as_ref(), message.as_ref()));
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Validate a canonical document
pub fn validate(doc: &ViewDocument) -> ValidationResult {
    let mut diagnostics = Diagnostics::default();

    check_root(doc, &mut diagnostics);

    if doc.select.is_empty() {
        diagnostics.error("select", "must contain at least one block");
    }
    for (index, block) in doc.select.iter().enumerate() {
        check_block(index, block, &mut diagnostics);
    }

    for (index, filter) in doc.filters.iter().enumerate() {
        if filter.expression.trim().is_empty() {
            diagnostics.error(format!("where[{}].expression", index), "is required");
        }
    }

    check_unique_names(doc, &mut diagnostics);
    check_constants(doc, &mut diagnostics);

    let result = diagnostics.finish();
    debug!(
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "Validated view definition"
    );
    result
}

fn check_root(doc: &ViewDocument, diagnostics: &mut Diagnostics) {
    if doc.resource.trim().is_empty() {
        diagnostics.error("resource", "is required");
    }

    match &doc.status {
        None => diagnostics.error("status", "is required"),
        Some(Status::Other(other)) => diagnostics.error(
            "status",
            format!(
                "unknown value '{}', expected one of draft, active, retired",
                other
            ),
        ),
        Some(_) => {}
    }

    if let Some(id) = &doc.id {
        if !KEBAB_CASE.is_match(id) {
            diagnostics.warning("id", format!("'{}' should be kebab-case", id));
        }
    }

    if let Some(name) = &doc.name {
        if !IDENTIFIER.is_match(name) {
            diagnostics.warning("name", format!("'{}' is not a valid identifier", name));
        }
    }
}

fn check_block(index: usize, block: &SelectBlock, diagnostics: &mut Diagnostics) {
    let locator = format!("select[{}]", index);

    if block.columns.is_empty() {
        diagnostics.error(
            format!("{}.column", locator),
            "must contain at least one column",
        );
    }

    if block.for_each.is_some() && block.for_each_or_null.is_some() {
        diagnostics.error(&locator, "forEach and forEachOrNull are mutually exclusive");
    }
    for (key, path) in [
        ("forEach", &block.for_each),
        ("forEachOrNull", &block.for_each_or_null),
    ] {
        if matches!(path, Some(path) if path.trim().is_empty()) {
            diagnostics.error(format!("{}.{}", locator, key), "must not be empty");
        }
    }

    if block.union_all && block.iteration().is_none() {
        diagnostics.warning(
            format!("{}.unionAll", locator),
            "has no effect without forEach or forEachOrNull",
        );
    }

    for (column_index, column) in block.columns.iter().enumerate() {
        check_column(
            &format!("{}.column[{}]", locator, column_index),
            column,
            diagnostics,
        );
    }

    if let Some(join) = &block.join {
        check_join(&format!("{}.join", locator), join, diagnostics);
    }
}

fn check_column(locator: &str, column: &Column, diagnostics: &mut Diagnostics) {
    if column.name.trim().is_empty() {
        diagnostics.error(format!("{}.name", locator), "is required");
    } else if !IDENTIFIER.is_match(&column.name) {
        diagnostics.warning(
            format!("{}.name", locator),
            format!("'{}' does not match {}", column.name, IDENTIFIER.as_str()),
        );
    }

    if column.path.trim().is_empty() {
        diagnostics.error(format!("{}.path", locator), "is required");
    }

    if let Some(column_type) = &column.column_type {
        if !KNOWN_COLUMN_TYPES.contains(&column_type.as_str()) {
            diagnostics.warning(
                format!("{}.type", locator),
                format!("unknown type '{}'", column_type),
            );
        }
    }
}

fn check_join(locator: &str, join: &JoinSpec, diagnostics: &mut Diagnostics) {
    if join.table.trim().is_empty() {
        diagnostics.error(format!("{}.table", locator), "is required");
    }
    if join.condition.trim().is_empty() {
        diagnostics.error(format!("{}.condition", locator), "is required");
    }
    if join.join_type.keyword().is_none() {
        let found: String = join.join_type.clone().into();
        let message = if found.is_empty() {
            "is required, expected one of inner, left, right, full".to_string()
        } else {
            format!(
                "unknown join type '{}', expected one of inner, left, right, full",
                found
            )
        };
        diagnostics.error(format!("{}.type", locator), message);
    }
}

/// One error per duplicated name, listing every location
fn check_unique_names(doc: &ViewDocument, diagnostics: &mut Diagnostics) {
    let mut locations: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (locator, column) in doc.flattened_columns() {
        if !column.name.is_empty() {
            locations
                .entry(column.name.as_str())
                .or_default()
                .push(locator.to_string());
        }
    }

    for (name, found_at) in locations {
        if found_at.len() > 1 {
            diagnostics.error(
                "select",
                format!(
                    "duplicate column name '{}' at {}",
                    name,
                    found_at.join(", ")
                ),
            );
        }
    }
}

fn check_constants(doc: &ViewDocument, diagnostics: &mut Diagnostics) {
    for (name, value) in &doc.constants {
        let locator = format!("constants.{}", name);
        if !IDENTIFIER.is_match(name) {
            diagnostics.error(&locator, "name is not a valid identifier");
        }
        if matches!(value, Value::Null | Value::Array(_) | Value::Object(_)) {
            diagnostics.error(&locator, "value must be a string, number or boolean");
        }
    }

    let mut check = |locator: String, expression: &str| {
        for captures in CONSTANT_REFERENCE.captures_iter(expression) {
            if let Some(name) = captures.get(1) {
                if !doc.constants.contains_key(name.as_str()) {
                    diagnostics.error(
                        &locator,
                        format!("references undeclared constant %{}", name.as_str()),
                    );
                }
            }
        }
    };

    for (index, block) in doc.select.iter().enumerate() {
        for (key, path) in [
            ("forEach", &block.for_each),
            ("forEachOrNull", &block.for_each_or_null),
        ] {
            if let Some(path) = path {
                check(format!("select[{}].{}", index, key), path);
            }
        }
    }
    for (locator, column) in doc.flattened_columns() {
        check(format!("{}.path", locator), &column.path);
    }
    for (index, filter) in doc.filters.iter().enumerate() {
        check(format!("where[{}].expression", index), &filter.expression);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterExpression, JoinType};
    use serde_json::json;
    use test_case::test_case;

    fn valid_doc() -> ViewDocument {
        ViewDocument {
            id: Some("patient-demographics".to_string()),
            name: Some("patient_demographics".to_string()),
            status: Some(Status::Active),
            resource: "Patient".to_string(),
            select: vec![SelectBlock::with_columns(vec![
                Column::new("id", "getResourceKey()"),
                Column::new("family", "name.family"),
            ])],
            filters: vec![FilterExpression::new("active = true")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_document() {
        let result = validate(&valid_doc());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_select_is_error() {
        let doc = ViewDocument {
            select: Vec::new(),
            ..valid_doc()
        };
        let result = validate(&doc);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"select: must contain at least one block".to_string()));
    }

    #[test]
    fn test_collects_all_root_errors() {
        let result = validate(&ViewDocument {
            select: vec![SelectBlock::default()],
            ..Default::default()
        });
        assert_eq!(
            result.errors,
            vec![
                "resource: is required",
                "status: is required",
                "select[0].column: must contain at least one column",
            ]
        );
    }

    #[test]
    fn test_unknown_status() {
        let doc = ViewDocument {
            status: Some(Status::Other("final".to_string())),
            ..valid_doc()
        };
        let result = validate(&doc);
        assert_eq!(
            result.errors,
            vec!["status: unknown value 'final', expected one of draft, active, retired"]
        );
    }

    #[test]
    fn test_duplicate_names_reported_once_with_all_locations() {
        let mut doc = valid_doc();
        doc.select.push(SelectBlock::with_columns(vec![
            Column::new("given", "name.given"),
            Column::new("family", "name.family"),
        ]));
        doc.select.push(SelectBlock::with_columns(vec![Column::new(
            "family", "name[1].family",
        )]));

        let result = validate(&doc);
        assert_eq!(
            result.errors,
            vec![
                "select: duplicate column name 'family' at select[0].column[1], \
                 select[1].column[1], select[2].column[0]"
            ]
        );
    }

    #[test]
    fn test_iteration_exclusivity() {
        let mut doc = valid_doc();
        doc.select[0].for_each = Some("name".to_string());
        doc.select[0].for_each_or_null = Some("".to_string());

        let result = validate(&doc);
        assert!(result
            .errors
            .contains(&"select[0]: forEach and forEachOrNull are mutually exclusive".to_string()));
        assert!(result
            .errors
            .contains(&"select[0].forEachOrNull: must not be empty".to_string()));
    }

    #[test]
    fn test_join_checks() {
        let mut doc = valid_doc();
        doc.select[0].join = Some(JoinSpec {
            join_type: JoinType::Other("sideways".to_string()),
            table: "Observation".to_string(),
            condition: String::new(),
        });

        let result = validate(&doc);
        assert_eq!(
            result.errors,
            vec![
                "select[0].join.condition: is required",
                "select[0].join.type: unknown join type 'sideways', expected one of inner, left, right, full",
            ]
        );
    }

    #[test_case("Patient Demographics", "id" ; "id not kebab")]
    #[test_case("2fast", "name" ; "name not identifier")]
    fn test_root_warnings(value: &str, field: &str) {
        let mut doc = valid_doc();
        match field {
            "id" => doc.id = Some(value.to_string()),
            _ => doc.name = Some(value.to_string()),
        }
        let result = validate(&doc);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with(&format!("{}: ", field)));
    }

    #[test]
    fn test_column_warnings_do_not_block() {
        let mut doc = valid_doc();
        doc.select[0].columns[1].name = "family-name".to_string();
        doc.select[0].columns[1].column_type = Some("text".to_string());
        doc.select[0].union_all = true;

        let result = validate(&doc);
        assert!(result.is_valid);
        assert_eq!(
            result.warnings,
            vec![
                "select[0].unionAll: has no effect without forEach or forEachOrNull",
                "select[0].column[1].name: 'family-name' does not match ^[A-Za-z][A-Za-z0-9_]*$",
                "select[0].column[1].type: unknown type 'text'",
            ]
        );
    }

    #[test]
    fn test_missing_column_fields_and_empty_filter() {
        let mut doc = valid_doc();
        doc.select[0].columns.push(Column::default());
        doc.filters.push(FilterExpression::new("  "));

        let result = validate(&doc);
        assert_eq!(
            result.errors,
            vec![
                "select[0].column[2].name: is required",
                "select[0].column[2].path: is required",
                "where[1].expression: is required",
            ]
        );
    }

    #[test]
    fn test_constants() {
        let mut doc = valid_doc();
        doc.constants.insert("sys".to_string(), json!("http://loinc.org"));
        doc.constants.insert("bad".to_string(), json!([1]));
        doc.select[0]
            .columns
            .push(Column::new("code", "code.coding.where(system = %sys).code"));
        doc.filters
            .push(FilterExpression::new("gender = %g and note = '%literal'"));

        let result = validate(&doc);
        assert_eq!(
            result.errors,
            vec![
                "constants.bad: value must be a string, number or boolean",
                "where[1].expression: references undeclared constant %g",
            ]
        );
    }

    #[test]
    fn test_constants_checked_in_both_iteration_keys() {
        let mut doc = valid_doc();
        doc.select[0].for_each = Some("name.where(use = %a)".to_string());
        doc.select[0].for_each_or_null = Some("telecom.where(system = %b)".to_string());

        let result = validate(&doc);
        assert!(result
            .errors
            .contains(&"select[0].forEach: references undeclared constant %a".to_string()));
        assert!(result
            .errors
            .contains(&"select[0].forEachOrNull: references undeclared constant %b".to_string()));
    }

    #[test]
    fn test_validated_view_requires_zero_errors() {
        let doc = valid_doc();
        assert!(ValidatedView::new(&doc).is_ok());

        let broken = ViewDocument {
            resource: String::new(),
            ..valid_doc()
        };
        let result = ValidatedView::new(&broken).unwrap_err();
        assert_eq!(result.errors, vec!["resource: is required"]);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let value = serde_json::to_value(validate(&valid_doc())).unwrap();
        assert_eq!(value["isValid"], json!(true));
    }
}
