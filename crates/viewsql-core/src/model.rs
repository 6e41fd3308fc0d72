//! Typed view definition document.
//!
//! Mirrors the canonical JSON shape produced by the normalizer. Fields that
//! the validator must be able to reject (unknown status, unknown join type,
//! both iteration keys set) are representable here on purpose so the
//! validator can name them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Root view definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub select: Vec<SelectBlock>,
    #[serde(default, rename = "where")]
    pub filters: Vec<FilterExpression>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, Value>,
}

impl ViewDocument {
    /// Deserialize a (normalized) JSON value into a document
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Columns of every block in document order, paired with their locators
    pub fn flattened_columns(&self) -> impl Iterator<Item = (ColumnLocator, &Column)> + '_ {
        self.select.iter().enumerate().flat_map(|(block, select)| {
            select
                .columns
                .iter()
                .enumerate()
                .map(move |(column, col)| (ColumnLocator { block, column }, col))
        })
    }
}

/// Position of a column inside the `select` tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnLocator {
    pub block: usize,
    pub column: usize,
}

impl fmt::Display for ColumnLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select[{}].column[{}]", self.block, self.column)
    }
}

/// Lifecycle status of a view definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Draft,
    Active,
    Retired,
    /// A value outside the known set, kept so it can be reported
    Other(String),
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "draft" => Status::Draft,
            "active" => Status::Active,
            "retired" => Status::Retired,
            _ => Status::Other(value),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Draft => write!(f, "draft"),
            Status::Active => write!(f, "active"),
            Status::Retired => write!(f, "retired"),
            Status::Other(other) => write!(f, "{}", other),
        }
    }
}

/// One unit of column production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBlock {
    #[serde(default, rename = "column")]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each_or_null: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub union_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
}

impl SelectBlock {
    /// Block of plain columns with no iteration or join
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// The iteration of this block.
    ///
    /// Returns `None` when neither key is set. When both are set (which the
    /// validator rejects) `forEach` wins.
    pub fn iteration(&self) -> Option<Iteration<'_>> {
        match (&self.for_each, &self.for_each_or_null) {
            (Some(path), _) => Some(Iteration::ForEach(path)),
            (None, Some(path)) => Some(Iteration::ForEachOrNull(path)),
            (None, None) => None,
        }
    }
}

/// Row-multiplying iteration over a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration<'a> {
    /// Drop the row when the source is empty
    ForEach(&'a str),
    /// Emit a single null row when the source is empty
    ForEachOrNull(&'a str),
}

impl<'a> Iteration<'a> {
    pub fn path(&self) -> &'a str {
        match *self {
            Iteration::ForEach(path) | Iteration::ForEachOrNull(path) => path,
        }
    }

    pub fn keeps_empty(&self) -> bool {
        matches!(self, Iteration::ForEachOrNull(_))
    }
}

/// Join against another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(default, rename = "type")]
    pub join_type: JoinType,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub condition: String,
}

/// Join kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Other(String),
}

impl Default for JoinType {
    fn default() -> Self {
        JoinType::Other(String::new())
    }
}

impl JoinType {
    /// SQL keyword(s) preceding `JOIN`
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            JoinType::Inner => Some("INNER"),
            JoinType::Left => Some("LEFT"),
            JoinType::Right => Some("RIGHT"),
            JoinType::Full => Some("FULL"),
            JoinType::Other(_) => None,
        }
    }
}

impl From<String> for JoinType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "inner" => JoinType::Inner,
            "left" => JoinType::Left,
            "right" => JoinType::Right,
            "full" => JoinType::Full,
            _ => JoinType::Other(value),
        }
    }
}

impl From<JoinType> for String {
    fn from(join_type: JoinType) -> Self {
        match join_type {
            JoinType::Inner => "inner".to_string(),
            JoinType::Left => "left".to_string(),
            JoinType::Right => "right".to_string(),
            JoinType::Full => "full".to_string(),
            JoinType::Other(other) => other,
        }
    }
}

/// One output field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// A filter over the source rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpression {
    #[serde(default)]
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FilterExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_canonical_document() {
        let doc = ViewDocument::from_value(json!({
            "resourceType": "ViewDefinition",
            "id": "patient-demographics",
            "name": "patient_demographics",
            "status": "active",
            "resource": "Patient",
            "select": [{
                "column": [
                    {"name": "id", "path": "getResourceKey()"},
                    {"name": "family", "path": "name.family", "type": "string"}
                ]
            }],
            "where": [{"expression": "active = true"}]
        }))
        .unwrap();

        assert_eq!(doc.status, Some(Status::Active));
        assert_eq!(doc.resource, "Patient");
        assert_eq!(doc.select[0].columns.len(), 2);
        assert_eq!(doc.select[0].columns[1].column_type.as_deref(), Some("string"));
        assert_eq!(doc.filters[0].expression, "active = true");
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let doc = ViewDocument::from_value(json!({"status": "final"})).unwrap();
        assert_eq!(doc.status, Some(Status::Other("final".to_string())));
    }

    #[test]
    fn test_missing_fields_default() {
        let doc = ViewDocument::from_value(json!({})).unwrap();
        assert_eq!(doc.status, None);
        assert!(doc.resource.is_empty());
        assert!(doc.select.is_empty());
        assert!(doc.filters.is_empty());
    }

    #[test]
    fn test_iteration_variants() {
        let block: SelectBlock = serde_json::from_value(json!({
            "forEachOrNull": "name",
            "column": [{"name": "family", "path": "family"}]
        }))
        .unwrap();
        assert_eq!(block.iteration(), Some(Iteration::ForEachOrNull("name")));
        assert!(block.iteration().unwrap().keeps_empty());

        let plain = SelectBlock::with_columns(vec![Column::new("id", "id")]);
        assert_eq!(plain.iteration(), None);
    }

    #[test]
    fn test_join_type_keyword() {
        let join: JoinSpec = serde_json::from_value(json!({
            "type": "left",
            "table": "Observation",
            "condition": "Observation.subject = Patient.id"
        }))
        .unwrap();
        assert_eq!(join.join_type.keyword(), Some("LEFT"));

        let odd: JoinType = "sideways".to_string().into();
        assert_eq!(odd.keyword(), None);
    }

    #[test]
    fn test_flattened_columns_locators() {
        let doc = ViewDocument {
            select: vec![
                SelectBlock::with_columns(vec![Column::new("a", "a")]),
                SelectBlock::with_columns(vec![Column::new("b", "b"), Column::new("c", "c")]),
            ],
            ..Default::default()
        };

        let locators: Vec<String> = doc
            .flattened_columns()
            .map(|(loc, _)| loc.to_string())
            .collect();
        assert_eq!(
            locators,
            vec!["select[0].column[0]", "select[1].column[0]", "select[1].column[1]"]
        );
    }

    #[test]
    fn test_serialize_round_trip_keeps_wire_names() {
        let doc = ViewDocument {
            status: Some(Status::Draft),
            resource: "Patient".to_string(),
            select: vec![SelectBlock {
                columns: vec![Column::new("given", "given")],
                for_each: Some("name".to_string()),
                ..Default::default()
            }],
            filters: vec![FilterExpression::new("active = true")],
            ..Default::default()
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["status"], "draft");
        assert_eq!(value["select"][0]["forEach"], "name");
        assert_eq!(value["where"][0]["expression"], "active = true");
        assert_eq!(ViewDocument::from_value(value).unwrap(), doc);
    }
}
