//! Condition DSL parsing and evaluation.
//!
//! Grammar:
//!
//! ```text
//! condition := clause
//!            | clause " AND " clause [" AND " clause ...]
//!            | clause " OR "  clause [" OR "  clause ...]
//! clause    := field " " op " " value
//! op        := == | != | > | < | >= | <= | in | contains | startswith
//! value     := true | false | number | text
//! ```
//!
//! Mixed `AND`/`OR` in one condition string is unsupported and evaluates to
//! false. Operators are matched by token length descending so `>=` is never
//! misread as `>`. Field names are dot-separated paths into the context
//! map; an unresolved path yields `Absent`, which no operator matches.

use shared_types::{FeatureMap, FieldValue};

/// Comparison operator, in match order (longest token first).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    StartsWith,
    Contains,
    Ge,
    Le,
    Eq,
    Ne,
    In,
    Gt,
    Lt,
}

impl Operator {
    /// All operators, longest token first. Order is load-bearing: prefix
    /// operators (`>`, `<`) must come after their two-character forms.
    pub const MATCH_ORDER: [Operator; 9] = [
        Operator::StartsWith,
        Operator::Contains,
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::In,
        Operator::Gt,
        Operator::Lt,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Operator::StartsWith => "startswith",
            Operator::Contains => "contains",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::In => "in",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

/// Literal on the right-hand side of a clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Literal {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "true" => return Literal::Bool(true),
            "false" => return Literal::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<f64>() {
            return Literal::Number(n);
        }
        Literal::Text(raw.to_string())
    }
}

/// One parsed `field OP value` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: Operator,
    pub value: Literal,
}

impl Clause {
    /// Parses a single clause; `None` if no operator token is present.
    fn parse(raw: &str) -> Option<Self> {
        for op in Operator::MATCH_ORDER {
            let needle = format!(" {} ", op.token());
            if let Some((field, value)) = raw.split_once(&needle) {
                let field = field.trim();
                let value = value.trim();
                if field.is_empty() || value.is_empty() {
                    return None;
                }
                return Some(Clause {
                    field: field.to_string(),
                    op,
                    value: Literal::parse(value),
                });
            }
        }
        None
    }

    /// Evaluates the clause against a context; `Absent` fields never match.
    pub fn eval(&self, ctx: &FeatureMap) -> bool {
        let field = ctx.get(&self.field);
        if field.is_absent() {
            return false;
        }
        match self.op {
            Operator::Eq => loose_eq(&field, &self.value),
            Operator::Ne => !loose_eq(&field, &self.value),
            Operator::Gt => numeric(&field, &self.value, |a, b| a > b),
            Operator::Lt => numeric(&field, &self.value, |a, b| a < b),
            Operator::Ge => numeric(&field, &self.value, |a, b| a >= b),
            Operator::Le => numeric(&field, &self.value, |a, b| a <= b),
            Operator::In => text(&field, &self.value, |a, b| b.contains(&a)),
            Operator::Contains => text(&field, &self.value, |a, b| a.contains(&b)),
            Operator::StartsWith => text(&field, &self.value, |a, b| a.starts_with(&b)),
        }
    }
}

/// Loose equality: numeric where both sides are numeric (booleans count as
/// 0/1), case-sensitive string comparison where both are text.
fn loose_eq(field: &FieldValue, literal: &Literal) -> bool {
    let literal_num = match literal {
        Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Literal::Number(n) => Some(*n),
        Literal::Text(_) => None,
    };
    if let (Some(a), Some(b)) = (field.as_number(), literal_num) {
        return a == b;
    }
    match (field, literal) {
        (FieldValue::Text(a), Literal::Text(b)) => a == b,
        _ => false,
    }
}

fn numeric(field: &FieldValue, literal: &Literal, cmp: impl Fn(f64, f64) -> bool) -> bool {
    let b = match literal {
        Literal::Number(n) => *n,
        Literal::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        Literal::Text(t) => match t.parse() {
            Ok(n) => n,
            Err(_) => return false,
        },
    };
    match field.as_number() {
        Some(a) => cmp(a, b),
        None => false,
    }
}

/// Case-insensitive text comparison; non-text fields never match.
fn text(field: &FieldValue, literal: &Literal, cmp: impl Fn(String, String) -> bool) -> bool {
    let b = match literal {
        Literal::Text(t) => t.to_ascii_lowercase(),
        Literal::Number(n) => n.to_string(),
        Literal::Bool(v) => v.to_string(),
    };
    match field.as_text() {
        Some(a) => cmp(a.to_ascii_lowercase(), b),
        None => false,
    }
}

/// A term is a clause or a parse failure that always evaluates false.
#[derive(Clone, Debug, PartialEq)]
enum Term {
    Clause(Clause),
    Invalid,
}

impl Term {
    fn parse(raw: &str) -> Self {
        match Clause::parse(raw.trim()) {
            Some(c) => Term::Clause(c),
            None => Term::Invalid,
        }
    }

    fn eval(&self, ctx: &FeatureMap) -> bool {
        match self {
            Term::Clause(c) => c.eval(ctx),
            Term::Invalid => false,
        }
    }
}

/// A parsed condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Single(Term),
    /// All clauses must hold (`AND`).
    All(Vec<Term>),
    /// Any clause may hold (`OR`).
    Any(Vec<Term>),
    /// Mixed `AND`/`OR` — unsupported grammar, always false.
    Unsupported,
}

impl Condition {
    pub fn parse(raw: &str) -> Self {
        let has_and = raw.contains(" AND ");
        let has_or = raw.contains(" OR ");
        match (has_and, has_or) {
            (true, true) => Condition::Unsupported,
            (true, false) => Condition::All(raw.split(" AND ").map(Term::parse).collect()),
            (false, true) => Condition::Any(raw.split(" OR ").map(Term::parse).collect()),
            (false, false) => Condition::Single(Term::parse(raw)),
        }
    }

    /// Returns true when the parsed form can never match.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Condition::Unsupported)
    }

    pub fn eval(&self, ctx: &FeatureMap) -> bool {
        match self {
            Condition::Single(term) => term.eval(ctx),
            Condition::All(terms) => terms.iter().all(|t| t.eval(ctx)),
            Condition::Any(terms) => terms.iter().any(|t| t.eval(ctx)),
            Condition::Unsupported => false,
        }
    }
}
