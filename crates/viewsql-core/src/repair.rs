//! Best-effort recovery of near-valid JSON text.
//!
//! Used for documents produced by an unreliable upstream generator. The
//! strategies run in order and the first one yielding parseable JSON wins:
//!
//! 1. parse as-is
//! 2. strip code fences, quote bare keys, drop trailing commas, close an
//!    unterminated string and append missing closers
//! 3. recover top-level `resource`/`name`/`status`/`select`/`where` values
//!    individually and assemble a minimal document
//! 4. synthesize a fallback document tied to the caller's profile
//!
//! Repair never fails.

use crate::normalize::profile_filter;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use viewsql_config::IngestionConfig;

/// Top-level keys recovered by fragment search
const FRAGMENT_KEYS: &[&str] = &[
    "resource",
    "name",
    "status",
    "select",
    "where",
    "definition",
];

/// Which strategy produced the repaired text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    AsIs,
    Balanced,
    Fragments,
    Fallback,
}

/// Parseable JSON recovered from raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repaired {
    pub text: String,
    #[serde(skip)]
    pub value: Value,
    pub strategy: RepairStrategy,
}

impl Repaired {
    fn new(text: String, value: Value, strategy: RepairStrategy) -> Self {
        Self {
            text,
            value,
            strategy,
        }
    }
}

/// Repair with default settings.
///
/// `profile` ties the fallback document's filter to the caller's profile.
pub fn repair(raw: &str, profile: Option<&str>) -> Repaired {
    Repairer::default().repair(raw, profile)
}

/// Configurable repair.
#[derive(Debug, Clone, Default)]
pub struct Repairer {
    config: IngestionConfig,
}

impl Repairer {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    pub fn repair(&self, raw: &str, profile: Option<&str>) -> Repaired {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Repaired::new(raw.to_string(), value, RepairStrategy::AsIs);
        }

        let balanced = balance(&strip_code_fences(raw));
        if let Ok(value) = serde_json::from_str::<Value>(&balanced) {
            debug!("Repaired document text by balancing");
            return Repaired::new(balanced, value, RepairStrategy::Balanced);
        }

        let fragments = recover_fragments(&balanced, self.config.max_fragment_bytes);
        if !fragments.is_empty() {
            debug!(
                fragments = fragments.len(),
                "Assembled document from recovered fragments"
            );
            let value = Value::Object(fragments);
            return Repaired::new(value.to_string(), value, RepairStrategy::Fragments);
        }

        let profile = profile.or(self.config.default_profile.as_deref());
        warn!(
            profile = profile.unwrap_or("<none>"),
            "Document text is unrecoverable, using fallback document"
        );
        let value = fallback_document(profile);
        Repaired::new(value.to_string(), value, RepairStrategy::Fallback)
    }
}

// ============================================================================
// Strategy 2: balancing
// ============================================================================

/// Content of the first fenced block, or the text from the first `{` on
fn strip_code_fences(raw: &str) -> String {
    let text = match raw.find("```") {
        Some(open) => {
            let after = &raw[open + 3..];
            // skip the info string (```json)
            let body = after.find('\n').map_or(after, |newline| &after[newline + 1..]);
            body.find("```").map_or(body, |close| &body[..close])
        }
        None => raw,
    };

    match text.find('{') {
        Some(start) => text[start..].trim_end().to_string(),
        None => text.trim().to_string(),
    }
}

/// Single pass fixing the common defects of truncated or sloppy JSON.
fn balance(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
            }
            '{' | '[' => {
                closers.push(if c == '{' { '}' } else { ']' });
                expect_key = c == '{';
                out.push(c);
            }
            '}' | ']' => {
                if !closers.contains(&c) {
                    // stray closer
                    continue;
                }
                while let Some(closer) = closers.pop() {
                    strip_trailing_comma(&mut out);
                    out.push(closer);
                    if closer == c {
                        break;
                    }
                }
                expect_key = false;
            }
            ',' => {
                expect_key = closers.last() == Some(&'}');
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            c if expect_key && (c.is_ascii_alphabetic() || c == '_' || c == '$') => {
                let start = i - 1;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&key);
                    out.push('"');
                } else {
                    out.push_str(&key);
                }
                expect_key = false;
            }
            c => {
                expect_key = false;
                out.push(c);
            }
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(':') {
        out.push_str(" null");
    }

    while let Some(closer) = closers.pop() {
        strip_trailing_comma(&mut out);
        out.push(closer);
    }
    strip_trailing_comma(&mut out);

    out
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed = out.trim_end().len();
    if out[..trimmed].ends_with(',') {
        out.truncate(trimmed - 1);
    }
}

// ============================================================================
// Strategy 3: fragment recovery
// ============================================================================

/// Scan the top level of an object for known keys and parse each value on
/// its own. `limit` bounds the scan in bytes.
fn recover_fragments(text: &str, limit: usize) -> Map<String, Value> {
    let mut fragments = Map::new();
    let bytes = text.as_bytes();
    let mut end = bytes.len().min(limit);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut depth = 0usize;
    let mut i = 0;

    while i < end {
        match bytes[i] {
            b'{' | b'[' => {
                depth += 1;
                i += 1;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'"' => {
                let Some(close) = string_end(bytes, i, end) else {
                    break;
                };
                let key = &text[i + 1..close - 1];
                let colon = skip_whitespace(bytes, close, end);
                let is_wanted = depth == 1
                    && colon < end
                    && bytes[colon] == b':'
                    && FRAGMENT_KEYS.contains(&key);

                if is_wanted {
                    let start = skip_whitespace(bytes, colon + 1, end);
                    let stop = value_end(bytes, start, end);
                    if let Some(value) = parse_fragment(&text[start..stop]) {
                        fragments.entry(key.to_string()).or_insert(value);
                    }
                    i = stop;
                } else {
                    i = close;
                }
            }
            _ => i += 1,
        }
    }

    fragments
}

/// Index just past the string starting at `start`, if it closes before `end`
fn string_end(bytes: &[u8], start: usize, end: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// End of the value starting at `start`: the end of a string, or the `,`
/// or closer that returns to the enclosing object's depth
fn value_end(bytes: &[u8], start: usize, end: usize) -> usize {
    if start < end && bytes[start] == b'"' {
        return string_end(bytes, start, end).unwrap_or(end);
    }

    let mut depth = 0usize;
    let mut i = start;
    while i < end {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i, end).unwrap_or(end);
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' if depth == 0 => return i,
            b'}' | b']' => depth -= 1,
            b',' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    end
}

fn parse_fragment(fragment: &str) -> Option<Value> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return None;
    }
    first_value(fragment).or_else(|| first_value(&balance(fragment)))
}

/// The first JSON value in `text`, ignoring whatever follows it
fn first_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()
}

// ============================================================================
// Strategy 4: fallback
// ============================================================================

/// Minimal document with the two standard columns
fn fallback_document(profile: Option<&str>) -> Value {
    let mut doc = json!({
        "resourceType": "ViewDefinition",
        "status": "draft",
        "select": [{
            "column": [
                {"name": "id", "path": "getResourceKey()"},
                {"name": "resourceType", "path": "resourceType"}
            ]
        }],
        "where": []
    });

    if let Some(profile) = profile.filter(|profile| !profile.trim().is_empty()) {
        doc["where"] = json!([{"expression": profile_filter(profile)}]);
        if let Some(resource) = resource_from_profile(profile) {
            doc["resource"] = Value::String(resource.to_string());
        }
    }

    doc
}

/// `http://.../StructureDefinition/Patient` -> `Patient`
fn resource_from_profile(profile: &str) -> Option<&str> {
    profile
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| segment.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
        .filter(|segment| segment.chars().all(|c| c.is_ascii_alphanumeric()))
}
