//! MySQL 8 dialect.

use super::{json_path, sql_string, DialectSyntax};
use crate::path::ir::Nav;

pub(crate) struct MySqlSyntax;

impl DialectSyntax for MySqlSyntax {
    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        format!("JSON_UNQUOTE({})", self.collection(base, path))
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        format!("JSON_EXTRACT({}, {})", base, sql_string(&json_path(path)))
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!(
            "JSON_TABLE({}, {} COLUMNS (value JSON PATH '$')) AS {}",
            base,
            sql_string(&format!("{}[*]", json_path(path))),
            alias
        )
    }

    fn element(&self, alias: &str) -> String {
        format!("{}.value", alias)
    }

    fn untyped_reference_key(&self, reference: &str) -> String {
        format!("SUBSTRING_INDEX({}, '/', -1)", reference)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_table_source() {
        assert_eq!(
            MySqlSyntax.elements("resource", &[Nav::Field("telecom".to_string())], "_t0"),
            "JSON_TABLE(resource, '$.telecom[*]' COLUMNS (value JSON PATH '$')) AS _t0"
        );
    }
}
