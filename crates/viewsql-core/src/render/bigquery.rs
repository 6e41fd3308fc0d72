//! BigQuery dialect over a `JSON` column.

use super::{json_path, sql_string, DialectSyntax};
use crate::path::ir::Nav;

pub(crate) struct BigQuerySyntax;

impl DialectSyntax for BigQuerySyntax {
    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        format!("JSON_VALUE({}, {})", base, sql_string(&json_path(path)))
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        format!("JSON_QUERY({}, {})", base, sql_string(&json_path(path)))
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!(
            "UNNEST(JSON_QUERY_ARRAY({}, {})) AS {}",
            base,
            sql_string(&json_path(path)),
            alias
        )
    }

    fn element(&self, alias: &str) -> String {
        alias.to_string()
    }

    fn untyped_reference_key(&self, reference: &str) -> String {
        format!("SPLIT({}, '/')[SAFE_OFFSET(1)]", reference)
    }

    fn iterate(&self, source: &str, keep_empty: bool) -> String {
        if keep_empty {
            format!("LEFT JOIN {} ON TRUE", source)
        } else {
            format!("CROSS JOIN {}", source)
        }
    }

    fn quotes(&self) -> (char, char) {
        ('`', '`')
    }
}
