//! Shape normalization.
//!
//! Upstream producers emitted several shapes for the same content. Each
//! value is classified into a shape enum by key presence and rewritten to
//! the canonical nested-block form:
//!
//! - a `definition` sub-object holding `resourceType`/`select`/`where`
//! - `select` as an object keyed by numeric-string indices
//! - `select` entries that are flat `{name, path}` columns
//! - `where` as a single object or bare strings, or entries using `path`
//! - `constant` as a `[{name, valueString}]` array
//!
//! Normalizing a canonical document is a no-op.

use crate::path::ir::Literal;
use serde_json::{Map, Value};
use tracing::debug;

/// Rewrite `input` into the canonical document shape.
///
/// `default_profile` is used for the synthesized filter when the document
/// has no `where`; the document's own `url` is used otherwise. Non-object
/// input is returned unchanged.
pub fn normalize(input: Value, default_profile: Option<&str>) -> Value {
    let mut doc = match input {
        Value::Object(doc) => doc,
        other => return other,
    };

    hoist_definition(&mut doc);

    let select = normalize_select(doc.remove("select"));
    doc.insert("select".to_string(), select);

    let filters = match doc.remove("where") {
        Some(value) => normalize_where(value),
        None => None,
    }
    .unwrap_or_else(|| default_filter(&doc, default_profile));
    doc.insert("where".to_string(), filters);

    fold_constants(&mut doc);

    Value::Object(doc)
}

// ============================================================================
// definition
// ============================================================================

fn hoist_definition(doc: &mut Map<String, Value>) {
    let definition = match doc.remove("definition") {
        Some(Value::Object(definition)) => definition,
        Some(other) => {
            doc.insert("definition".to_string(), other);
            return;
        }
        None => return,
    };

    debug!("Hoisting `definition` sub-object to top level");
    for (key, value) in definition {
        let key = if key == "resourceType" {
            "resource".to_string()
        } else {
            key
        };
        doc.entry(key).or_insert(value);
    }
}

// ============================================================================
// select
// ============================================================================

/// Shape of a `select` value.
enum SelectShape {
    Missing,
    Blocks(Vec<Value>),
    /// `{"0": {...}, "1": {...}}`
    Indexed(Vec<(usize, Value)>),
    /// A single block object
    Block(Map<String, Value>),
    /// A single flat column object
    Column(Map<String, Value>),
    Unrecognized(Value),
}

impl SelectShape {
    fn classify(value: Option<Value>) -> Self {
        let object = match value {
            None | Some(Value::Null) => return SelectShape::Missing,
            Some(Value::Array(blocks)) => return SelectShape::Blocks(blocks),
            Some(Value::Object(object)) => object,
            Some(other) => return SelectShape::Unrecognized(other),
        };

        if is_flat_column(&object) {
            return SelectShape::Column(object);
        }
        if object.contains_key("column") {
            return SelectShape::Block(object);
        }

        let indexed: Option<Vec<(usize, Value)>> = object
            .iter()
            .map(|(key, value)| key.parse::<usize>().ok().map(|index| (index, value.clone())))
            .collect();
        match indexed {
            Some(entries) => SelectShape::Indexed(entries),
            None => SelectShape::Unrecognized(Value::Object(object)),
        }
    }
}

fn normalize_select(value: Option<Value>) -> Value {
    let entries = match SelectShape::classify(value) {
        SelectShape::Missing => {
            debug!("Missing `select`, using an empty array");
            Vec::new()
        }
        SelectShape::Blocks(entries) => entries,
        SelectShape::Indexed(mut entries) => {
            debug!(entries = entries.len(), "Converting index-keyed `select` to an array");
            entries.sort_by_key(|(index, _)| *index);
            entries.into_iter().map(|(_, entry)| entry).collect()
        }
        SelectShape::Block(block) => vec![Value::Object(block)],
        SelectShape::Column(column) => vec![Value::Object(column)],
        SelectShape::Unrecognized(other) => return other,
    };

    Value::Array(group_flat_columns(entries))
}

/// A `{name, path}` column sitting where a block belongs
fn is_flat_column(object: &Map<String, Value>) -> bool {
    (object.contains_key("path") || object.contains_key("name")) && !object.contains_key("column")
}

/// Gather each run of consecutive flat columns into one block
fn group_flat_columns(entries: Vec<Value>) -> Vec<Value> {
    let mut blocks = Vec::with_capacity(entries.len());
    let mut run: Vec<Value> = Vec::new();

    for entry in entries {
        match entry {
            Value::Object(object) if is_flat_column(&object) => run.push(Value::Object(object)),
            other => {
                flush_run(&mut run, &mut blocks);
                blocks.push(other);
            }
        }
    }
    flush_run(&mut run, &mut blocks);

    blocks
}

fn flush_run(run: &mut Vec<Value>, blocks: &mut Vec<Value>) {
    if run.is_empty() {
        return;
    }
    debug!(columns = run.len(), "Grouping flat select entries into a block");
    let mut block = Map::new();
    block.insert("column".to_string(), Value::Array(std::mem::take(run)));
    blocks.push(Value::Object(block));
}

// ============================================================================
// where
// ============================================================================

/// Shape of a `where` value.
enum WhereShape {
    Missing,
    Entries(Vec<Value>),
    Single(Map<String, Value>),
    Text(String),
    Unrecognized(Value),
}

impl WhereShape {
    fn classify(value: Value) -> Self {
        match value {
            Value::Null => WhereShape::Missing,
            Value::Array(entries) => WhereShape::Entries(entries),
            Value::Object(object) => WhereShape::Single(object),
            Value::String(text) => WhereShape::Text(text),
            other => WhereShape::Unrecognized(other),
        }
    }
}

/// Canonical `where`, or `None` when a default filter should be used
fn normalize_where(value: Value) -> Option<Value> {
    let entries = match WhereShape::classify(value) {
        WhereShape::Missing => return None,
        WhereShape::Entries(entries) => entries,
        WhereShape::Single(object) => vec![Value::Object(object)],
        WhereShape::Text(text) => vec![Value::String(text)],
        WhereShape::Unrecognized(other) => return Some(other),
    };

    Some(Value::Array(
        entries.into_iter().map(normalize_filter).collect(),
    ))
}

fn normalize_filter(entry: Value) -> Value {
    match entry {
        Value::String(expression) => {
            let mut filter = Map::new();
            filter.insert("expression".to_string(), Value::String(expression));
            Value::Object(filter)
        }
        Value::Object(mut filter) if !filter.contains_key("expression") => {
            if let Some(path) = filter.remove("path") {
                filter.insert("expression".to_string(), path);
            }
            Value::Object(filter)
        }
        other => other,
    }
}

/// `meta.profile.contains('<profile>')` tied to the caller's profile or the
/// document's own url; empty when neither is known
fn default_filter(doc: &Map<String, Value>, default_profile: Option<&str>) -> Value {
    let profile = default_profile
        .filter(|profile| !profile.trim().is_empty())
        .or_else(|| doc.get("url").and_then(Value::as_str))
        .filter(|profile| !profile.trim().is_empty());

    match profile {
        Some(profile) => {
            debug!(profile, "Missing `where`, synthesizing profile filter");
            let mut filter = Map::new();
            filter.insert(
                "expression".to_string(),
                Value::String(profile_filter(profile)),
            );
            Value::Array(vec![Value::Object(filter)])
        }
        // no filter on the resource type alone: the FROM clause already has it
        None => {
            debug!("Missing `where` and no profile, using no filter");
            Value::Array(Vec::new())
        }
    }
}

/// Filter expression selecting entities that declare `profile`
pub fn profile_filter(profile: &str) -> String {
    format!(
        "meta.profile.contains({})",
        Literal::String(profile.to_string())
    )
}

// ============================================================================
// constants
// ============================================================================

/// Fold `constant: [{name, valueX}]` into the `constants` map
fn fold_constants(doc: &mut Map<String, Value>) {
    if doc.get("constants").is_some_and(Value::is_null) {
        doc.remove("constants");
    }

    let entries = match doc.remove("constant") {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            doc.insert("constant".to_string(), other);
            return;
        }
        None => return,
    };

    if !matches!(doc.get("constants"), None | Some(Value::Object(_))) {
        // non-map `constants` is rejected on deserialization; keep the entries
        doc.insert("constant".to_string(), Value::Array(entries));
        return;
    }
    let constants = doc
        .entry("constants")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(constants) = constants else {
        return;
    };
    debug!(constants = entries.len(), "Folding `constant` array into `constants`");

    for entry in entries {
        let Value::Object(entry) = entry else {
            continue;
        };
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let value = entry
            .iter()
            .find(|(key, _)| key.starts_with("value"))
            .map(|(_, value)| value.clone());
        if let Some(value) = value {
            constants.entry(name.to_string()).or_insert(value);
        }
    }
}
