//! Dialect renderers for the extraction IR.
//!
//! Every dialect implements [`DialectSyntax`], the handful of primitives
//! (scalar extraction, array expansion, literals, lateral iteration) that
//! [`FragmentRenderer`] composes into column fragments, predicates and
//! iteration joins. Dialects are a closed set; dispatch is an exhaustive
//! match on [`Dialect`].

mod bigquery;
mod containment;
mod generic;
mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

use crate::path::ir::{ElementFilter, Extraction, Literal, Nav, Predicate, Segment};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use viewsql_config::StorageConfig;

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Dotted-path fragments over a notional nested table
    #[serde(rename = "generic")]
    Generic,
    #[serde(rename = "postgresql")]
    Postgres,
    /// The embedded demonstration engine
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlserver")]
    SqlServer,
    #[serde(rename = "bigquery")]
    BigQuery,
}

impl Dialect {
    /// The five named target dialects, in output order
    pub const NAMED: [Dialect; 5] = [
        Dialect::Postgres,
        Dialect::Sqlite,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::BigQuery,
    ];

    /// Generic followed by the named dialects
    pub const ALL: [Dialect; 6] = [
        Dialect::Generic,
        Dialect::Postgres,
        Dialect::Sqlite,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::BigQuery,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
            Dialect::BigQuery => "bigquery",
        }
    }

    pub(crate) fn syntax(self) -> &'static dyn DialectSyntax {
        match self {
            Dialect::Generic => &generic::GenericSyntax,
            Dialect::Postgres => &postgres::PostgresSyntax,
            Dialect::Sqlite => &sqlite::SqliteSyntax,
            Dialect::MySql => &mysql::MySqlSyntax,
            Dialect::SqlServer => &sqlserver::SqlServerSyntax,
            Dialect::BigQuery => &bigquery::BigQuerySyntax,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A dialect identifier outside the fixed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown dialect `{0}`")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|dialect| dialect.id() == s)
            .ok_or_else(|| UnknownDialect(s.to_string()))
    }
}

/// Per-dialect SQL primitives.
///
/// `base` is always an already-rendered SQL expression holding a JSON
/// document (or the empty string for the generic dialect's root), `path` a
/// navigation relative to it.
pub(crate) trait DialectSyntax: Send + Sync {
    /// Expression for the document root given the JSON column name
    fn root(&self, json_column: &str) -> String {
        self.quote_identifier(json_column)
    }

    /// Scalar value at `path`, comparable with [`DialectSyntax::literal`]
    fn scalar(&self, base: &str, path: &[Nav]) -> String;

    /// JSON value at `path`, left unwrapped
    fn collection(&self, base: &str, path: &[Nav]) -> String;

    /// Table source yielding the elements of the array at `path` as `alias`
    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String;

    /// The current element of an [`DialectSyntax::elements`] source
    fn element(&self, alias: &str) -> String;

    /// First `projection` of `source` rows satisfying `condition`
    fn first_match(&self, projection: &str, source: &str, condition: &str) -> String {
        format!(
            "(SELECT {} FROM {} WHERE {} LIMIT 1)",
            projection, source, condition
        )
    }

    fn literal(&self, value: &Literal) -> String {
        text_literal(value)
    }

    /// Key part of a `Type/key` reference string
    fn reference_key(&self, reference: &str, resource_type: Option<&str>) -> String {
        match resource_type {
            Some(resource_type) => format!(
                "REPLACE({}, {}, '')",
                reference,
                sql_string(&format!("{}/", resource_type))
            ),
            None => self.untyped_reference_key(reference),
        }
    }

    /// Everything after the first `/`
    fn untyped_reference_key(&self, reference: &str) -> String;

    /// Join clause expanding `source` per row; `keep_empty` keeps rows
    /// whose collection is empty
    fn iterate(&self, source: &str, keep_empty: bool) -> String;

    /// Identifier quote pair
    fn quotes(&self) -> (char, char) {
        ('"', '"')
    }

    fn quote_identifier(&self, name: &str) -> String {
        if is_plain_identifier(name) {
            return name.to_string();
        }
        let (open, close) = self.quotes();
        let escaped = name.replace(close, &format!("{}{}", close, close));
        format!("{}{}{}", open, escaped, close)
    }
}

/// Renders IR for one dialect, allocating subquery and iteration aliases.
pub(crate) struct FragmentRenderer<'a> {
    dialect: Dialect,
    syntax: &'static dyn DialectSyntax,
    storage: &'a StorageConfig,
    filter_aliases: usize,
    iteration_aliases: usize,
}

impl<'a> FragmentRenderer<'a> {
    pub(crate) fn new(dialect: Dialect, storage: &'a StorageConfig) -> Self {
        Self {
            dialect,
            syntax: dialect.syntax(),
            storage,
            filter_aliases: 0,
            iteration_aliases: 0,
        }
    }

    /// Expression for the current row's document
    pub(crate) fn root(&self) -> String {
        self.syntax.root(&self.storage.json_column)
    }

    pub(crate) fn identifier(&self, name: &str) -> String {
        self.syntax.quote_identifier(name)
    }

    /// Render an extraction against the row's document
    pub(crate) fn extraction(&mut self, extraction: &Extraction) -> String {
        let root = self.root();
        self.extraction_from(&root, extraction)
    }

    /// Render an extraction against `base` (the row's document, or the
    /// element of an iteration)
    pub(crate) fn extraction_from(&mut self, base: &str, extraction: &Extraction) -> String {
        match extraction {
            Extraction::ResourceKey => {
                let root = self.root();
                self.syntax
                    .scalar(&root, &[Nav::Field(self.storage.key_field.clone())])
            }
            Extraction::Value(segments) => self.navigate(base, segments, Shape::Scalar),
            Extraction::Collection(segments) => self.navigate(base, segments, Shape::Collection),
            Extraction::ReferenceKey {
                segments,
                resource_type,
            } => {
                let reference = self.navigate(base, segments, Shape::Scalar);
                self.syntax
                    .reference_key(&reference, resource_type.as_deref())
            }
        }
    }

    /// Render a filter predicate against the row's document
    pub(crate) fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Equals { extraction, value } => format!(
                "{} = {}",
                self.extraction(extraction),
                self.syntax.literal(value)
            ),
            Predicate::Contains { collection, value } => {
                let rule = containment::rule(self.dialect);
                rule(&self.root(), collection, value)
            }
        }
    }

    /// Join clause for an iteration and the expression for its element
    pub(crate) fn iteration(&mut self, path: &[Nav], keep_empty: bool) -> (String, String) {
        let alias = format!("_fe{}", self.iteration_aliases);
        self.iteration_aliases += 1;

        let source = self.syntax.elements(&self.root(), path, &alias);
        (
            self.syntax.iterate(&source, keep_empty),
            self.syntax.element(&alias),
        )
    }

    fn navigate(&mut self, base: &str, segments: &[Segment], shape: Shape) -> String {
        let (prefix, filtered) = split_at_filter(segments);
        let Some((filter, rest)) = filtered else {
            return match shape {
                Shape::Scalar => self.syntax.scalar(base, &prefix),
                Shape::Collection => self.syntax.collection(base, &prefix),
            };
        };

        let alias = format!("_t{}", self.filter_aliases);
        self.filter_aliases += 1;

        let source = self.syntax.elements(base, &prefix, &alias);
        let element = self.syntax.element(&alias);
        let condition = format!(
            "{} = {}",
            self.syntax
                .scalar(&element, &[Nav::Field(filter.field.clone())]),
            self.syntax.literal(&filter.value)
        );
        let projection = self.navigate(&element, rest, shape);

        self.syntax.first_match(&projection, &source, &condition)
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Scalar,
    Collection,
}

/// Navigation before the first element filter, and the filter with the
/// segments following it
fn split_at_filter(segments: &[Segment]) -> (Vec<Nav>, Option<(&ElementFilter, &[Segment])>) {
    let mut prefix = Vec::new();
    for (position, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Nav(nav) => prefix.push(nav.clone()),
            Segment::Filter(filter) => return (prefix, Some((filter, &segments[position + 1..]))),
        }
    }
    (prefix, None)
}

// ============================================================================
// Shared text helpers
// ============================================================================

static PLAIN_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub(crate) fn is_plain_identifier(name: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(name)
}

/// Single-quoted SQL string literal
pub(crate) fn sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Literal compared against text extracted from a document
pub(crate) fn text_literal(value: &Literal) -> String {
    sql_string(&value.as_text())
}

/// Literal in its native SQL type
pub(crate) fn sql_literal(value: &Literal) -> String {
    match value {
        Literal::String(s) => sql_string(s),
        Literal::Integer(i) => i.to_string(),
        Literal::Decimal(d) => d.clone(),
        Literal::Boolean(b) => b.to_string(),
    }
}

/// JSONPath text: `$.name[0].family`
pub(crate) fn json_path(path: &[Nav]) -> String {
    let mut out = String::from("$");
    for nav in path {
        match nav {
            Nav::Field(name) => {
                out.push('.');
                out.push_str(name);
            }
            Nav::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

/// Dotted path with bracket indices: `name[0].family`
pub(crate) fn dotted_path(path: &[Nav]) -> String {
    let mut out = String::new();
    for nav in path {
        match nav {
            Nav::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            Nav::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}
