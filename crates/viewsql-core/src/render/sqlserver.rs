//! SQL Server dialect using `OPENJSON` and `APPLY`.

use super::{json_path, sql_string, DialectSyntax};
use crate::path::ir::Nav;

pub(crate) struct SqlServerSyntax;

impl DialectSyntax for SqlServerSyntax {
    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        // OPENJSON already yields scalar elements as text
        if path.is_empty() {
            return base.to_string();
        }
        format!("JSON_VALUE({}, {})", base, sql_string(&json_path(path)))
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        format!("JSON_QUERY({}, {})", base, sql_string(&json_path(path)))
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!(
            "OPENJSON({}, {}) AS {}",
            base,
            sql_string(&json_path(path)),
            alias
        )
    }

    fn element(&self, alias: &str) -> String {
        format!("{}.value", alias)
    }

    fn first_match(&self, projection: &str, source: &str, condition: &str) -> String {
        format!(
            "(SELECT TOP 1 {} FROM {} WHERE {})",
            projection, source, condition
        )
    }

    fn untyped_reference_key(&self, reference: &str) -> String {
        format!("SUBSTRING({0}, CHARINDEX('/', {0}) + 1, LEN({0}))", reference)
    }

    fn iterate(&self, source: &str, keep_empty: bool) -> String {
        if keep_empty {
            format!("OUTER APPLY {}", source)
        } else {
            format!("CROSS APPLY {}", source)
        }
    }

    fn quotes(&self) -> (char, char) {
        ('[', ']')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_reference_key() {
        assert_eq!(
            SqlServerSyntax.untyped_reference_key("r"),
            "SUBSTRING(r, CHARINDEX('/', r) + 1, LEN(r))"
        );
    }
}
