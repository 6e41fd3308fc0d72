//! SQLite dialect, the embedded demonstration engine.
//!
//! `json_extract` returns native SQL values, so booleans compare as 1/0
//! and numbers unquoted.

use super::{json_path, sql_string, DialectSyntax};
use crate::path::ir::{Literal, Nav};

pub(crate) struct SqliteSyntax;

impl DialectSyntax for SqliteSyntax {
    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        if path.is_empty() {
            return base.to_string();
        }
        format!("json_extract({}, {})", base, sql_string(&json_path(path)))
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        self.scalar(base, path)
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!(
            "json_each({}, {}) AS {}",
            base,
            sql_string(&json_path(path)),
            alias
        )
    }

    fn element(&self, alias: &str) -> String {
        format!("{}.value", alias)
    }

    fn literal(&self, value: &Literal) -> String {
        match value {
            Literal::String(s) => sql_string(s),
            Literal::Integer(i) => i.to_string(),
            Literal::Decimal(d) => d.clone(),
            Literal::Boolean(b) => u8::from(*b).to_string(),
        }
    }

    fn untyped_reference_key(&self, reference: &str) -> String {
        format!("SUBSTR({0}, INSTR({0}, '/') + 1)", reference)
    }

    fn iterate(&self, source: &str, keep_empty: bool) -> String {
        if keep_empty {
            format!("LEFT JOIN {} ON TRUE", source)
        } else {
            format!("CROSS JOIN {}", source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_literals_are_integers() {
        assert_eq!(SqliteSyntax.literal(&Literal::Boolean(true)), "1");
        assert_eq!(SqliteSyntax.literal(&Literal::Boolean(false)), "0");
        assert_eq!(
            SqliteSyntax.literal(&Literal::String("x".to_string())),
            "'x'"
        );
    }

    #[test]
    fn test_elements_source() {
        assert_eq!(
            SqliteSyntax.elements("resource", &[Nav::Field("name".to_string())], "_fe0"),
            "json_each(resource, '$.name') AS _fe0"
        );
    }
}
