//! End-to-end tests over the public API.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use test_case::test_case;
use viewsql_core::{
    compile, normalize, repair, translate, validate, CompileInput, CompilerConfig, Dialect,
    RepairStrategy, SqlGenerator, TranslationError, ValidatedView, ViewDocument,
};

fn canonical_example() -> Value {
    json!({
        "resourceType": "ViewDefinition",
        "status": "active",
        "resource": "Patient",
        "select": [{"column": [{"name": "id", "path": "getResourceKey()"}]}],
        "where": [{"expression": "active = true"}]
    })
}

#[test]
fn test_canonical_example_generic_sql() {
    let outcome = compile(CompileInput::Value(canonical_example()), None);
    let sql = outcome.sql.expect("canonical example should compile");

    assert_eq!(sql.generic, "SELECT id AS id FROM Patient WHERE active = true");
    assert_eq!(
        sql.per_dialect.keys().copied().collect::<Vec<_>>(),
        Dialect::NAMED.to_vec()
    );
}

#[test]
fn test_containment_predicate_is_distinct_per_named_dialect() {
    let mut doc = canonical_example();
    doc["where"] = json!([{
        "expression": "meta.profile.contains('http://hl7.org/fhir/us/core/StructureDefinition/us-core-patient')"
    }]);

    let sql = compile(CompileInput::Value(doc), None).sql.unwrap();
    let distinct: BTreeSet<&str> = sql.per_dialect.values().map(String::as_str).collect();
    assert_eq!(distinct.len(), 5);
    for statement in sql.per_dialect.values() {
        assert!(statement.contains("us-core-patient"), "{}", statement);
    }
}

#[test]
fn test_duplicate_names_yield_exactly_one_error() {
    let doc = ViewDocument::from_value(json!({
        "status": "active",
        "resource": "Patient",
        "select": [
            {"column": [{"name": "id", "path": "getResourceKey()"}]},
            {"forEach": "name", "column": [{"name": "id", "path": "family"}]}
        ]
    }))
    .unwrap();

    let result = validate(&doc);
    let uniqueness: Vec<&String> = result
        .errors
        .iter()
        .filter(|e| e.contains("duplicate column name"))
        .collect();
    assert_eq!(uniqueness.len(), 1);
    assert!(uniqueness[0].contains("select[0].column[0]"));
    assert!(uniqueness[0].contains("select[1].column[0]"));
}

#[test_case("name.family.first()", "name[0].family" ; "first and index zero")]
#[test_case("name.given.first()", "name[0].given[0]" ; "first on a trailing collection")]
fn test_equivalent_paths(left: &str, right: &str) {
    for dialect in Dialect::ALL {
        assert_eq!(translate(left, dialect), translate(right, dialect));
    }
}

#[test_case("foo.bar(" ; "unbalanced paren")]
#[test_case("telecom.where(system = 'phone).value" ; "unbalanced quote")]
#[test_case("name.exists()" ; "unknown function")]
#[test_case("telecom.where(system != 'phone').value" ; "non-equality predicate")]
#[test_case("value.ofType(Nonsense)" ; "unknown type")]
fn test_unsupported_paths_fail_closed(path: &str) {
    for dialect in Dialect::ALL {
        assert!(translate(path, dialect).is_err(), "{} in {}", path, dialect);
    }
}

#[test]
fn test_failure_names_offending_fragment() {
    assert_eq!(
        translate("name.where(use ~ 'official').family", Dialect::Generic),
        Err(TranslationError::UnsupportedPredicate {
            offending: "where(use ~ 'official')".to_string()
        })
    );
}

#[test]
fn test_repair_round_trips_truncated_document() {
    let original = serde_json::to_string(&canonical_example()).unwrap();
    let truncated = original.strip_suffix("]}").unwrap();

    let repaired = repair(truncated, None);
    assert_eq!(repaired.strategy, RepairStrategy::Balanced);
    assert_eq!(
        serde_json::from_str::<Value>(&repaired.text).unwrap(),
        canonical_example()
    );
}

#[test]
fn test_unrecoverable_text_compiles_fallback() {
    let outcome = compile(
        CompileInput::Text("I could not produce a view definition."),
        Some("http://hl7.org/fhir/StructureDefinition/Observation"),
    );

    assert_eq!(outcome.repair, Some(RepairStrategy::Fallback));
    let sql = outcome.sql.expect("fallback document should be valid");
    assert!(sql.generic.starts_with("SELECT id AS id, resourceType AS resourceType FROM Observation"));
    assert!(sql
        .generic
        .ends_with("WHERE 'http://hl7.org/fhir/StructureDefinition/Observation' = ANY(meta.profile)"));
}

#[test]
fn test_historical_shape_compiles_like_canonical() {
    let historical = json!({
        "status": "active",
        "definition": {
            "resourceType": "Patient",
            "select": {"0": {"name": "id", "path": "getResourceKey()"}},
            "where": [{"expression": "active = true"}]
        }
    });

    let from_historical = compile(CompileInput::Value(historical), None);
    let from_canonical = compile(CompileInput::Value(canonical_example()), None);
    assert_eq!(from_historical.sql, from_canonical.sql);
}

#[test]
fn test_configuration_changes_storage_layout() {
    let config = CompilerConfig::from_toml_str(
        r#"
        [storage]
        json_column = "doc"
        key_field = "logical_id"
        "#,
    )
    .unwrap();

    let doc = ViewDocument::from_value(normalize(canonical_example(), None)).unwrap();
    let view = ValidatedView::new(&doc).unwrap();
    let sql = SqlGenerator::new(config)
        .generate_dialect(&view, Dialect::Sqlite)
        .unwrap();

    assert_eq!(
        sql,
        "SELECT json_extract(doc, '$.logical_id') AS id FROM Patient \
         WHERE json_extract(doc, '$.active') = 1"
    );
}

#[test]
fn test_outputs_serialize_camel_case() {
    let outcome = compile(CompileInput::Value(canonical_example()), None);

    let validation = serde_json::to_value(&outcome.validation).unwrap();
    assert_eq!(validation["isValid"], json!(true));

    let sql = serde_json::to_value(outcome.sql.unwrap()).unwrap();
    assert!(sql["perDialect"]["postgresql"].is_string());
    assert!(sql["perDialect"]["sqlserver"].is_string());
}

#[test]
fn test_constant_array_beside_null_constants_compiles() {
    let outcome = compile(
        CompileInput::Value(json!({
            "status": "active",
            "resource": "Patient",
            "constants": null,
            "constant": [{"name": "g", "valueString": "female"}],
            "select": [{"column": [{"name": "id", "path": "getResourceKey()"}]}],
            "where": [{"expression": "gender = %g"}]
        })),
        None,
    );

    assert!(outcome.validation.is_valid, "{:?}", outcome.validation.errors);
    assert_eq!(outcome.document["constants"], json!({"g": "female"}));
    assert_eq!(
        outcome.sql.unwrap().generic,
        "SELECT id AS id FROM Patient WHERE gender = 'female'"
    );
}

#[test]
fn test_multibyte_whitespace_in_column_path_is_reported() {
    let outcome = compile(
        CompileInput::Value(json!({
            "status": "active",
            "resource": "Patient",
            "select": [{"column": [{"name": "family", "path": "name\u{00A0}family"}]}],
            "where": []
        })),
        None,
    );

    assert!(outcome.sql.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].error,
        TranslationError::Syntax { .. }
    ));
}
