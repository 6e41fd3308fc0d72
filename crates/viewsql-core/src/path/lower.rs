//! Lowering from the syntax tree to the extraction IR.
//!
//! This is where the supported subset is enforced: unknown functions,
//! non-equality predicates, misplaced steps and unknown type names are
//! rejected with the offending fragment instead of producing a guess.

use crate::error::{TranslationError, TranslationResult};
use crate::path::ir::{ElementFilter, Extraction, Literal, Nav, Predicate, Segment};
use crate::path::syntax::{Argument, CompareOp, Operand, Step, Term};
use serde_json::Value;
use std::collections::BTreeMap;
use viewsql_config::PathConfig;

/// Type names accepted by `ofType()`.
const KNOWN_TYPES: &[&str] = &[
    // primitives
    "base64Binary",
    "boolean",
    "canonical",
    "code",
    "date",
    "dateTime",
    "decimal",
    "id",
    "instant",
    "integer",
    "integer64",
    "markdown",
    "oid",
    "positiveInt",
    "string",
    "time",
    "unsignedInt",
    "uri",
    "url",
    "uuid",
    // complex types
    "Address",
    "Age",
    "Annotation",
    "Attachment",
    "CodeableConcept",
    "CodeableReference",
    "Coding",
    "ContactPoint",
    "Count",
    "Distance",
    "Dosage",
    "Duration",
    "Expression",
    "HumanName",
    "Identifier",
    "Meta",
    "Money",
    "Period",
    "Quantity",
    "Range",
    "Ratio",
    "RatioRange",
    "Reference",
    "SampledData",
    "Signature",
    "Timing",
];

/// Where the lowered path will be used; decides what the tail may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Usage {
    Column,
    Iteration,
    Filter,
}

/// How a lowered path ends.
#[derive(Debug, Clone, PartialEq)]
enum Tail {
    Value,
    Collection,
    ResourceKey,
    ReferenceKey(Option<String>),
    Contains(Literal),
}

#[derive(Debug)]
struct LoweredPath {
    segments: Vec<Segment>,
    tail: Tail,
}

pub(crate) struct Lowering<'a> {
    paths: &'a PathConfig,
    constants: &'a BTreeMap<String, Value>,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(paths: &'a PathConfig, constants: &'a BTreeMap<String, Value>) -> Self {
        Self { paths, constants }
    }

    /// Lower a column path (a single term without comparison)
    pub(crate) fn column(&self, term: &Term) -> TranslationResult<Extraction> {
        if term.comparison.is_some() {
            return Err(TranslationError::Misplaced {
                offending: term.to_string(),
                reason: "comparisons are only supported in filters",
            });
        }

        let lowered = self.path(&term.steps, Usage::Column)?;
        match lowered.tail {
            Tail::Contains(_) => Err(TranslationError::Misplaced {
                offending: term.to_string(),
                reason: "contains() is only supported in filters",
            }),
            tail => Ok(extraction(lowered.segments, tail)),
        }
    }

    /// Lower an iteration source to the navigation of the collection
    pub(crate) fn iteration(&self, term: &Term) -> TranslationResult<Vec<Nav>> {
        if term.comparison.is_some() {
            return Err(TranslationError::Misplaced {
                offending: term.to_string(),
                reason: "comparisons are not allowed in an iteration source",
            });
        }

        let lowered = self.path(&term.steps, Usage::Iteration)?;
        match lowered.tail {
            Tail::Value | Tail::Collection => plain_navigation(lowered.segments).ok_or_else(|| {
                TranslationError::Misplaced {
                    offending: term.to_string(),
                    reason: "where() is not supported in an iteration source",
                }
            }),
            _ => Err(TranslationError::Misplaced {
                offending: term.to_string(),
                reason: "an iteration source must be a collection path",
            }),
        }
    }

    /// Lower one conjunct of a filter expression
    pub(crate) fn predicate(&self, term: &Term) -> TranslationResult<Predicate> {
        let lowered = self.path(&term.steps, Usage::Filter)?;

        let value = match &term.comparison {
            Some((CompareOp::Eq, operand)) => Some(self.operand(operand)?),
            Some(_) => {
                return Err(TranslationError::UnsupportedPredicate {
                    offending: term.to_string(),
                })
            }
            None => None,
        };

        match (lowered.tail, value) {
            (Tail::Contains(contained), None) => {
                let collection =
                    plain_navigation(lowered.segments).ok_or_else(|| TranslationError::Misplaced {
                        offending: term.to_string(),
                        reason: "contains() over a where() filtered path is not supported",
                    })?;
                Ok(Predicate::Contains {
                    collection,
                    value: contained,
                })
            }
            (Tail::Contains(_), Some(_)) => Err(TranslationError::Misplaced {
                offending: term.to_string(),
                reason: "contains() cannot be compared",
            }),
            (tail, value) => Ok(Predicate::Equals {
                extraction: extraction(lowered.segments, tail),
                value: value.unwrap_or(Literal::Boolean(true)),
            }),
        }
    }

    fn path(&self, steps: &[Step], usage: Usage) -> TranslationResult<LoweredPath> {
        if let [Step::Call {
            name,
            argument: None,
        }] = steps
        {
            if name == "getResourceKey" {
                return Ok(LoweredPath {
                    segments: Vec::new(),
                    tail: Tail::ResourceKey,
                });
            }
        }

        let mut segments = Vec::new();
        // An implicit [0] owed to the last multi-valued field
        let mut pending_index = false;
        let mut tail = None;

        for (position, step) in steps.iter().enumerate() {
            let is_last = position + 1 == steps.len();

            let (name, argument) = match step {
                Step::Field { name, index } => {
                    settle(&mut segments, &mut pending_index);
                    segments.push(Segment::field(name.clone()));
                    match index {
                        Some(index) => segments.push(Segment::index(*index)),
                        None => pending_index = self.paths.is_multi_valued(name),
                    }
                    continue;
                }
                Step::Call { name, argument } => (name.as_str(), argument.as_ref()),
            };

            let misplaced = |reason| TranslationError::Misplaced {
                offending: step.to_string(),
                reason,
            };

            if segments.is_empty() && name != "getResourceKey" {
                return Err(misplaced("must follow a field"));
            }

            match name {
                "first" => {
                    if argument.is_some() {
                        return Err(misplaced("first() takes no arguments"));
                    }
                    settle(&mut segments, &mut pending_index);
                }
                "where" => {
                    if !matches!(segments.last(), Some(Segment::Nav(Nav::Field(_)))) {
                        return Err(misplaced("where() must directly follow a field"));
                    }
                    let filter = match argument {
                        Some(Argument::Comparison(comparison))
                            if comparison.op == CompareOp::Eq =>
                        {
                            ElementFilter {
                                field: comparison.field.clone(),
                                value: self.operand(&comparison.operand)?,
                            }
                        }
                        _ => {
                            return Err(TranslationError::UnsupportedPredicate {
                                offending: step.to_string(),
                            })
                        }
                    };
                    pending_index = false;
                    segments.push(Segment::Filter(filter));
                }
                "ofType" => match argument {
                    Some(Argument::Name(type_name))
                        if KNOWN_TYPES.contains(&type_name.as_str()) => {}
                    Some(Argument::Name(type_name)) => {
                        return Err(TranslationError::UnknownType {
                            name: type_name.clone(),
                            offending: step.to_string(),
                        })
                    }
                    _ => return Err(misplaced("ofType() takes a type name")),
                },
                "getResourceKey" => {
                    return Err(misplaced("getResourceKey() must be the whole path"));
                }
                "getReferenceKey" => {
                    if !is_last {
                        return Err(misplaced("getReferenceKey() must be the last step"));
                    }
                    let resource_type = match argument {
                        None => None,
                        Some(Argument::Name(type_name)) if is_type_name(type_name) => {
                            Some(type_name.clone())
                        }
                        Some(_) => return Err(misplaced("getReferenceKey() takes a resource type")),
                    };
                    settle(&mut segments, &mut pending_index);
                    segments.push(Segment::field("reference"));
                    tail = Some(Tail::ReferenceKey(resource_type));
                }
                "join" => {
                    if !is_last {
                        return Err(misplaced("join() must be the last step"));
                    }
                    match argument {
                        None | Some(Argument::Operand(Operand::Literal(Literal::String(_)))) => {}
                        Some(_) => return Err(misplaced("join() takes a string separator")),
                    }
                    tail = Some(Tail::Collection);
                }
                "contains" => {
                    if usage != Usage::Filter {
                        return Err(misplaced("contains() is only supported in filters"));
                    }
                    if !is_last {
                        return Err(misplaced("contains() must be the last step"));
                    }
                    let value = match argument {
                        Some(Argument::Operand(operand)) => self.operand(operand)?,
                        _ => return Err(misplaced("contains() takes a literal")),
                    };
                    tail = Some(Tail::Contains(value));
                }
                _ => {
                    return Err(TranslationError::UnknownFunction {
                        offending: step.to_string(),
                    })
                }
            }
        }

        let tail = match tail {
            Some(tail) => tail,
            None if usage == Usage::Iteration => Tail::Collection,
            None => {
                settle(&mut segments, &mut pending_index);
                Tail::Value
            }
        };

        Ok(LoweredPath { segments, tail })
    }

    fn operand(&self, operand: &Operand) -> TranslationResult<Literal> {
        match operand {
            Operand::Literal(literal) => Ok(literal.clone()),
            Operand::Constant(name) => {
                let value =
                    self.constants
                        .get(name)
                        .ok_or_else(|| TranslationError::UndefinedConstant {
                            name: name.clone(),
                        })?;
                Literal::from_json(value).ok_or_else(|| TranslationError::NonScalarConstant {
                    name: name.clone(),
                })
            }
        }
    }
}

/// Pay the implicit index owed to the previous multi-valued field
fn settle(segments: &mut Vec<Segment>, pending_index: &mut bool) {
    if std::mem::take(pending_index) {
        segments.push(Segment::index(0));
    }
}

fn is_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn extraction(segments: Vec<Segment>, tail: Tail) -> Extraction {
    match tail {
        Tail::ResourceKey => Extraction::ResourceKey,
        Tail::Collection => Extraction::Collection(segments),
        Tail::ReferenceKey(resource_type) => Extraction::ReferenceKey {
            segments,
            resource_type,
        },
        Tail::Value | Tail::Contains(_) => Extraction::Value(segments),
    }
}

/// Navigation without element filters, or `None` if a filter is present
fn plain_navigation(segments: Vec<Segment>) -> Option<Vec<Nav>> {
    segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Nav(nav) => Some(nav),
            Segment::Filter(_) => None,
        })
        .collect()
}
