//! PostgreSQL dialect over a `jsonb` column.

use super::{sql_string, DialectSyntax};
use crate::path::ir::Nav;

pub(crate) struct PostgresSyntax;

/// Text array path literal: `'{name,0,family}'`
pub(super) fn pg_path(path: &[Nav]) -> String {
    let parts: Vec<String> = path
        .iter()
        .map(|nav| match nav {
            Nav::Field(name) => name.clone(),
            Nav::Index(index) => index.to_string(),
        })
        .collect();
    sql_string(&format!("{{{}}}", parts.join(",")))
}

impl DialectSyntax for PostgresSyntax {
    fn scalar(&self, base: &str, path: &[Nav]) -> String {
        format!("{} #>> {}", base, pg_path(path))
    }

    fn collection(&self, base: &str, path: &[Nav]) -> String {
        format!("{} #> {}", base, pg_path(path))
    }

    fn elements(&self, base: &str, path: &[Nav], alias: &str) -> String {
        format!(
            "jsonb_array_elements({}) AS {}(value)",
            self.collection(base, path),
            alias
        )
    }

    fn element(&self, alias: &str) -> String {
        format!("{}.value", alias)
    }

    fn untyped_reference_key(&self, reference: &str) -> String {
        format!("split_part({}, '/', 2)", reference)
    }

    fn iterate(&self, source: &str, keep_empty: bool) -> String {
        if keep_empty {
            format!("LEFT JOIN LATERAL {} ON TRUE", source)
        } else {
            format!("CROSS JOIN LATERAL {}", source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_path() {
        assert_eq!(
            pg_path(&[Nav::Field("name".to_string()), Nav::Index(0)]),
            "'{name,0}'"
        );
        assert_eq!(pg_path(&[]), "'{}'");
    }
}
