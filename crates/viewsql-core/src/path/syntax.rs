//! Path expression parser using chumsky.
//!
//! Parses the restricted expression grammar used by columns, iteration
//! sources and filters:
//! - `name.family`, `name[0].family`
//! - `telecom.where(system = 'phone').value`
//! - `value.ofType(Quantity).unit`
//! - `subject.getReferenceKey(Patient)`
//! - `active = true and gender = %g`
//!
//! The parser is purely syntactic; which functions and operators are
//! accepted is decided by the lowering pass.

use crate::error::TranslationError;
use crate::path::ir::Literal;
use chumsky::extra;
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;
use std::fmt;

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

// ============================================================================
// Syntax tree
// ============================================================================

/// Literal or constant reference on the right of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    /// `%name`, substituted from the document's constants
    Constant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Equivalent,
}

/// `field op operand`, as found inside `where(...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

/// Single argument of a function call
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Comparison(Comparison),
    Operand(Operand),
    Name(String),
}

/// One `.`-separated step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Field { name: String, index: Option<usize> },
    Call { name: String, argument: Option<Argument> },
}

/// A path with an optional trailing comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub steps: Vec<Step>,
    pub comparison: Option<(CompareOp, Operand)>,
}

/// Terms joined with `and`
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub terms: Vec<Term>,
}

// ============================================================================
// Display (used to quote offending fragments back to the caller)
// ============================================================================

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(literal) => write!(f, "{}", literal),
            Operand::Constant(name) => write!(f, "%{}", name),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Equivalent => "~",
        };
        f.write_str(op)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.operand)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Comparison(comparison) => write!(f, "{}", comparison),
            Argument::Operand(operand) => write!(f, "{}", operand),
            Argument::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Field { name, index: None } => f.write_str(name),
            Step::Field {
                name,
                index: Some(index),
            } => write!(f, "{}[{}]", name, index),
            Step::Call {
                name,
                argument: None,
            } => write!(f, "{}()", name),
            Step::Call {
                name,
                argument: Some(argument),
            } => write!(f, "{}({})", name, argument),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .steps
            .iter()
            .map(|step| step.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&path)?;
        if let Some((op, operand)) = &self.comparison {
            write!(f, " {} {}", op, operand)?;
        }
        Ok(())
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse a path or filter expression
pub fn parse_expression(input: &str) -> Result<Expression, TranslationError> {
    if input.trim().is_empty() {
        return Err(TranslationError::Empty);
    }

    expression_parser()
        .parse(input)
        .into_result()
        .map_err(|errs| syntax_error(&errs, input))
}

fn syntax_error(errs: &[Rich<'_, char>], input: &str) -> TranslationError {
    let position = errs
        .first()
        .map_or(input.len(), |e| e.span().start)
        .min(input.len());

    TranslationError::Syntax {
        offending: offending_fragment(input, position).to_string(),
        details: format_errors(errs, input),
    }
}

/// The step of `input` that surrounds `position`.
fn offending_fragment(input: &str, position: usize) -> &str {
    let is_boundary = |c: char| c == '.' || c.is_whitespace();
    let start = input[..position]
        .char_indices()
        .rev()
        .find(|&(_, c)| is_boundary(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let end = input[position..]
        .find(is_boundary)
        .map_or(input.len(), |i| position + i);

    let fragment = input[start..end.max(start)].trim();
    if fragment.is_empty() {
        input.trim()
    } else {
        fragment
    }
}

fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let start = e.span().start.min(input.len());
            let column = input[..start].chars().count() + 1;

            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));

            format!("column {}: {} (found {})", column, e.reason(), found)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Primitive parsers
// ============================================================================

/// Identifier: letter or underscore, then alphanumerics or underscores
fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("identifier")
}

/// Keyword parser
fn kw<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    text::keyword::<&str, _, Extra<'src>>(keyword).ignored()
}

/// Single-quoted string with backslash escapes: 'it\'s'
fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escaped = just('\\').ignore_then(any());
    let plain = none_of("\\'");

    just('\'')
        .ignore_then(plain.or(escaped).repeated().collect::<String>())
        .then_ignore(just('\''))
        .labelled("string literal like 'value'")
}

/// Integer or decimal literal
fn number_literal<'src>() -> impl Parser<'src, &'src str, Literal, Extra<'src>> + Clone {
    let digits = any()
        .filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1);

    just('-')
        .or_not()
        .then(digits.clone())
        .then(just('.').then(digits).or_not())
        .to_slice()
        .try_map(|s: &str, span: SimpleSpan| {
            if s.contains('.') {
                s.parse::<f64>()
                    .map(|_| Literal::Decimal(s.to_string()))
                    .map_err(|_| Rich::custom(span, "invalid decimal literal"))
            } else {
                s.parse::<i64>()
                    .map(Literal::Integer)
                    .map_err(|_| Rich::custom(span, "integer overflow"))
            }
        })
        .labelled("number")
}

/// Literal or `%constant`
fn operand<'src>() -> impl Parser<'src, &'src str, Operand, Extra<'src>> + Clone {
    let boolean = choice((
        kw("true").to(Literal::Boolean(true)),
        kw("false").to(Literal::Boolean(false)),
    ));

    let literal = choice((
        string_literal().map(Literal::String),
        number_literal(),
        boolean,
    ))
    .map(Operand::Literal);

    let constant = just('%').ignore_then(ident()).map(Operand::Constant);

    choice((literal, constant)).labelled("literal")
}

/// Comparison operators; only `=` survives lowering
fn compare_op<'src>() -> impl Parser<'src, &'src str, CompareOp, Extra<'src>> + Clone {
    choice((
        just("!=").to(CompareOp::NotEq),
        just("<=").to(CompareOp::LtEq),
        just(">=").to(CompareOp::GtEq),
        just('=').to(CompareOp::Eq),
        just('<').to(CompareOp::Lt),
        just('>').to(CompareOp::Gt),
        just('~').to(CompareOp::Equivalent),
    ))
    .padded()
    .labelled("comparison operator")
}

/// Array index: [0]
fn index<'src>() -> impl Parser<'src, &'src str, usize, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span: SimpleSpan| {
            s.parse::<usize>()
                .map_err(|_| Rich::custom(span, "index overflow"))
        })
        .delimited_by(just('['), just(']'))
        .labelled("index like [0]")
}

// ============================================================================
// Steps and expressions
// ============================================================================

fn argument<'src>() -> impl Parser<'src, &'src str, Argument, Extra<'src>> + Clone {
    let comparison = ident()
        .then(compare_op())
        .then(operand())
        .map(|((field, op), operand)| Comparison { field, op, operand });

    choice((
        comparison.map(Argument::Comparison),
        operand().map(Argument::Operand),
        ident().map(Argument::Name),
    ))
}

fn step<'src>() -> impl Parser<'src, &'src str, Step, Extra<'src>> + Clone {
    let call = ident()
        .then(
            argument()
                .or_not()
                .padded()
                .delimited_by(just('('), just(')')),
        )
        .map(|(name, argument)| Step::Call { name, argument })
        .labelled("function call like where(system = 'phone')");

    let field = ident()
        .then(index().or_not())
        .map(|(name, index)| Step::Field { name, index })
        .labelled("field like name or name[0]");

    choice((call, field))
}

fn path<'src>() -> impl Parser<'src, &'src str, Vec<Step>, Extra<'src>> + Clone {
    step().separated_by(just('.')).at_least(1).collect::<Vec<_>>()
}

fn term<'src>() -> impl Parser<'src, &'src str, Term, Extra<'src>> + Clone {
    path()
        .padded()
        .then(compare_op().then(operand().padded()).or_not())
        .map(|(steps, comparison)| Term { steps, comparison })
}

fn expression_parser<'src>() -> impl Parser<'src, &'src str, Expression, Extra<'src>> {
    term()
        .separated_by(kw("and").padded())
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map(|terms| Expression { terms })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_term(input: &str) -> Term {
        let mut expression = parse_expression(input).unwrap();
        assert_eq!(expression.terms.len(), 1);
        expression.terms.remove(0)
    }

    // =========================================================================
    // Primitive parser tests
    // =========================================================================

    #[test]
    fn test_ident_simple() {
        let result = ident().parse("family").into_result();
        assert_eq!(result.unwrap(), "family");
    }

    #[test]
    fn test_ident_rejects_leading_digit() {
        assert!(ident().parse("1abc").into_result().is_err());
    }

    #[test]
    fn test_string_literal_with_escape() {
        let result = string_literal().parse(r"'it\'s'").into_result();
        assert_eq!(result.unwrap(), "it's");
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(
            number_literal().parse("42").into_result().unwrap(),
            Literal::Integer(42)
        );
        assert_eq!(
            number_literal().parse("-1.5").into_result().unwrap(),
            Literal::Decimal("-1.5".to_string())
        );
    }

    #[test]
    fn test_index() {
        assert_eq!(index().parse("[3]").into_result().unwrap(), 3);
    }

    // =========================================================================
    // Path tests
    // =========================================================================

    #[test]
    fn test_parse_dotted_path() {
        let term = single_term("name.family");
        assert_eq!(
            term.steps,
            vec![
                Step::Field {
                    name: "name".to_string(),
                    index: None
                },
                Step::Field {
                    name: "family".to_string(),
                    index: None
                },
            ]
        );
        assert!(term.comparison.is_none());
    }

    #[test]
    fn test_parse_indexed_step() {
        let term = single_term("name[1].given");
        assert_eq!(
            term.steps[0],
            Step::Field {
                name: "name".to_string(),
                index: Some(1)
            }
        );
    }

    #[test]
    fn test_parse_where_call() {
        let term = single_term("telecom.where(system = 'phone').value");
        assert_eq!(term.steps.len(), 3);
        assert_eq!(
            term.steps[1],
            Step::Call {
                name: "where".to_string(),
                argument: Some(Argument::Comparison(Comparison {
                    field: "system".to_string(),
                    op: CompareOp::Eq,
                    operand: Operand::Literal(Literal::String("phone".to_string())),
                })),
            }
        );
    }

    #[test]
    fn test_parse_name_argument() {
        let term = single_term("value.ofType(Quantity)");
        assert_eq!(
            term.steps[1],
            Step::Call {
                name: "ofType".to_string(),
                argument: Some(Argument::Name("Quantity".to_string())),
            }
        );
    }

    #[test]
    fn test_parse_empty_call() {
        let term = single_term("getResourceKey()");
        assert_eq!(
            term.steps,
            vec![Step::Call {
                name: "getResourceKey".to_string(),
                argument: None
            }]
        );
    }

    #[test]
    fn test_parse_constant_operand() {
        let term = single_term("code.coding.where(system = %sys).code");
        match &term.steps[2] {
            Step::Call {
                argument: Some(Argument::Comparison(comparison)),
                ..
            } => assert_eq!(comparison.operand, Operand::Constant("sys".to_string())),
            other => panic!("Expected where call, got {:?}", other),
        }
    }

    // =========================================================================
    // Filter expression tests
    // =========================================================================

    #[test]
    fn test_parse_comparison_term() {
        let term = single_term("active = true");
        assert_eq!(
            term.comparison,
            Some((CompareOp::Eq, Operand::Literal(Literal::Boolean(true))))
        );
    }

    #[test]
    fn test_parse_not_equal_is_syntactically_valid() {
        let term = single_term("gender != 'male'");
        assert_eq!(term.comparison.map(|(op, _)| op), Some(CompareOp::NotEq));
    }

    #[test]
    fn test_parse_conjunction() {
        let expression = parse_expression("active = true and gender = 'female'").unwrap();
        assert_eq!(expression.terms.len(), 2);
    }

    #[test]
    fn test_display_round_trip() {
        let input = "telecom.where(system = 'phone').value";
        assert_eq!(single_term(input).to_string(), input);
        assert_eq!(single_term("name[0].family").to_string(), "name[0].family");
    }

    // =========================================================================
    // Error tests
    // =========================================================================

    #[test]
    fn test_unbalanced_paren_is_error() {
        let err = parse_expression("foo.bar(").unwrap_err();
        match err {
            TranslationError::Syntax { offending, .. } => assert_eq!(offending, "bar("),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let result = parse_expression("telecom.where(system = 'phone).value");
        assert!(matches!(result, Err(TranslationError::Syntax { .. })));
    }

    #[test]
    fn test_trailing_dot_is_error() {
        let result = parse_expression("name.");
        assert!(matches!(result, Err(TranslationError::Syntax { .. })));
    }

    #[test]
    fn test_empty_is_error() {
        assert_eq!(parse_expression("  "), Err(TranslationError::Empty));
    }

    #[test]
    fn test_offending_fragment() {
        assert_eq!(offending_fragment("foo.bar(", 8), "bar(");
        assert_eq!(offending_fragment("a.b#c.d", 3), "b#c");
        assert_eq!(offending_fragment("x.", 2), "x.");
        assert_eq!(offending_fragment("a\u{3000}b", 4), "b");
    }

    #[test]
    fn test_multibyte_whitespace_is_syntax_error() {
        for input in ["a\u{3000}b", "name\u{00A0}family"] {
            match parse_expression(input) {
                Err(TranslationError::Syntax { offending, .. }) => {
                    assert!(input.contains(offending.as_str()), "{:?}", offending)
                }
                other => panic!("Expected syntax error for {:?}, got {:?}", input, other),
            }
        }
    }
}
