//! Dialect-independent extraction IR.
//!
//! Lowering turns parsed expressions into these types; dialect renderers
//! turn them into SQL text. Predicates stay structured here so dialect
//! rewrites never have to reparse generated SQL.

use serde_json::{Number, Value};
use std::fmt;

/// Scalar literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Decimal kept in its source spelling
    Decimal(String),
    Boolean(bool),
}

impl Literal {
    /// Literal for a scalar JSON value; `None` for null, arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Bool(b) => Some(Literal::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Literal::Integer(i)),
                None => Some(Literal::Decimal(n.to_string())),
            },
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Number((*i).into()),
            Literal::Decimal(d) => d
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(|| Value::String(d.clone()), Value::Number),
            Literal::Boolean(b) => Value::Bool(*b),
        }
    }

    /// The value as it reads when extracted from a document as text
    pub fn as_text(&self) -> String {
        match self {
            Literal::String(s) => s.clone(),
            Literal::Integer(i) => i.to_string(),
            Literal::Decimal(d) => d.clone(),
            Literal::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Decimal(d) => f.write_str(d),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// One navigation step into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nav {
    Field(String),
    Index(usize),
}

/// `where(field = value)` applied to a collection: first matching element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementFilter {
    pub field: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Nav(Nav),
    Filter(ElementFilter),
}

impl Segment {
    pub fn field(name: impl Into<String>) -> Self {
        Segment::Nav(Nav::Field(name.into()))
    }

    pub fn index(index: usize) -> Self {
        Segment::Nav(Nav::Index(index))
    }
}

/// What a column (or comparison operand) extracts.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The entity's own key field
    ResourceKey,
    /// A scalar, or the first element of a collection
    Value(Vec<Segment>),
    /// The collection itself, unjoined
    Collection(Vec<Segment>),
    /// Key of the entity a reference-shaped field points at
    ReferenceKey {
        segments: Vec<Segment>,
        resource_type: Option<String>,
    },
}

/// Structured filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        extraction: Extraction,
        value: Literal,
    },
    /// A collection holds a literal; rendered through the containment table
    Contains { collection: Vec<Nav>, value: Literal },
}
