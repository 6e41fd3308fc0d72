//! Generic dialect: dotted paths over a notional nested table.
//!
//! Fragments read like the path expressions themselves (`name[0].family`),
//! with the root document's fields addressed as bare columns.

use super::{dotted_path, sql_literal, DialectSyntax};
use crate::path::ir::{Literal, Nav};

pub(crate) struct GenericSyntax;

impl GenericSyntax {
    fn qualified(base: &str, path: &[Nav]) -> String {
        let path = dotted_path(path);
        match (base.is_empty(), path.is_empty()) {
            (true, _) => path,
            (false, true) => base.to_string(),
            (false, false) if path.starts_with('[') => format!("{}{}", base, path),
            (false, false) => format!("{}.{}", base, path),
        }
    }
}

impl DialectSyntax for GenericSyntax {
    fn root(&self, _json_column: &str) -> String {
        String::new()
    }

    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        Self::qualified(base, path)
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        Self::qualified(base, path)
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!("UNNEST({}) AS {}", Self::qualified(base, path), alias)
    }

    fn element(&self, alias: &str) -> String {
        alias.to_string()
    }

    fn literal(&self, value: &Literal) -> String {
        sql_literal(value)
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
    fn test_qualified_paths() {
        let path = vec![Nav::Field("family".to_string())];
        assert_eq!(GenericSyntax.scalar("", &path), "family");
        assert_eq!(GenericSyntax.scalar("_fe0", &path), "_fe0.family");
        assert_eq!(GenericSyntax.scalar("_fe0", &[]), "_fe0");
        assert_eq!(GenericSyntax.scalar("_fe0", &[Nav::Index(1)]), "_fe0[1]");
    }

    #[test]
    fn test_untyped_reference_key() {
        assert_eq!(
            GenericSyntax.untyped_reference_key("subject.reference"),
            "SUBSTR(subject.reference, INSTR(subject.reference, '/') + 1)"
        );
    }
}
