//! Containment rewrite table.
//!
//! "Does this collection hold this literal" has no portable SQL spelling,
//! so each dialect gets exactly one rule. Rules receive the structured
//! predicate, never generated SQL text.

use super::postgres::pg_path;
use super::{dotted_path, json_path, sql_literal, sql_string, text_literal, Dialect};
use crate::path::ir::{Literal, Nav};
use serde_json::Value;

/// Renders `collection contains value` against a document expression
pub(crate) type ContainmentRule = fn(base: &str, collection: &[Nav], value: &Literal) -> String;

/// The containment rule for `dialect`
pub(crate) fn rule(dialect: Dialect) -> ContainmentRule {
    match dialect {
        Dialect::Generic => generic,
        Dialect::Postgres => postgres,
        Dialect::Sqlite => sqlite,
        Dialect::MySql => mysql,
        Dialect::SqlServer => sqlserver,
        Dialect::BigQuery => bigquery,
    }
}

/// JSON text of a one-element array holding `value`
fn json_singleton(value: &Literal) -> String {
    Value::Array(vec![value.to_json()]).to_string()
}

fn generic(_base: &str, collection: &[Nav], value: &Literal) -> String {
    format!("{} = ANY({})", sql_literal(value), dotted_path(collection))
}

fn postgres(base: &str, collection: &[Nav], value: &Literal) -> String {
    format!(
        "{} #> {} @> {}::jsonb",
        base,
        pg_path(collection),
        sql_string(&json_singleton(value))
    )
}

fn sqlite(base: &str, collection: &[Nav], value: &Literal) -> String {
    let literal = match value {
        Literal::Boolean(b) => u8::from(*b).to_string(),
        other => sql_literal(other),
    };
    format!(
        "EXISTS (SELECT 1 FROM json_each({}, {}) WHERE value = {})",
        base,
        sql_string(&json_path(collection)),
        literal
    )
}

fn mysql(base: &str, collection: &[Nav], value: &Literal) -> String {
    let scalar = value.to_json().to_string();
    format!(
        "JSON_CONTAINS(JSON_EXTRACT({}, {}), {})",
        base,
        sql_string(&json_path(collection)),
        sql_string(&scalar)
    )
}

fn sqlserver(base: &str, collection: &[Nav], value: &Literal) -> String {
    format!(
        "EXISTS (SELECT 1 FROM OPENJSON({}, {}) WHERE value = {})",
        base,
        sql_string(&json_path(collection)),
        text_literal(value)
    )
}

fn bigquery(base: &str, collection: &[Nav], value: &Literal) -> String {
    format!(
        "{} IN UNNEST(JSON_VALUE_ARRAY({}, {}))",
        text_literal(value),
        base,
        sql_string(&json_path(collection))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn profile_path() -> Vec<Nav> {
        vec![
            Nav::Field("meta".to_string()),
            Nav::Field("profile".to_string()),
        ]
    }

    fn profile() -> Literal {
        Literal::String("http://example.org/StructureDefinition/x".to_string())
    }

    #[test]
    fn test_every_dialect_has_a_rule() {
        for dialect in Dialect::ALL {
            let rendered = rule(dialect)("resource", &profile_path(), &profile());
            assert!(
                rendered.contains("http://example.org/StructureDefinition/x"),
                "{}: {}",
                dialect,
                rendered
            );
        }
    }

    #[test]
    fn test_named_dialect_rules_are_distinct() {
        let rendered: BTreeSet<String> = Dialect::NAMED
            .iter()
            .map(|dialect| rule(*dialect)("resource", &profile_path(), &profile()))
            .collect();
        assert_eq!(rendered.len(), 5);
    }

    #[test]
    fn test_rule_texts() {
        let path = profile_path();
        let value = Literal::String("p".to_string());

        assert_eq!(generic("", &path, &value), "'p' = ANY(meta.profile)");
        assert_eq!(
            postgres("resource", &path, &value),
            r#"resource #> '{meta,profile}' @> '["p"]'::jsonb"#
        );
        assert_eq!(
            sqlite("resource", &path, &value),
            "EXISTS (SELECT 1 FROM json_each(resource, '$.meta.profile') WHERE value = 'p')"
        );
        assert_eq!(
            mysql("resource", &path, &value),
            r#"JSON_CONTAINS(JSON_EXTRACT(resource, '$.meta.profile'), '"p"')"#
        );
        assert_eq!(
            sqlserver("resource", &path, &value),
            "EXISTS (SELECT 1 FROM OPENJSON(resource, '$.meta.profile') WHERE value = 'p')"
        );
        assert_eq!(
            bigquery("resource", &path, &value),
            "'p' IN UNNEST(JSON_VALUE_ARRAY(resource, '$.meta.profile'))"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let value = Literal::String("O'Brien".to_string());
        assert_eq!(
            mysql("resource", &profile_path(), &value),
            r#"JSON_CONTAINS(JSON_EXTRACT(resource, '$.meta.profile'), '"O''Brien"')"#
        );
    }
}
