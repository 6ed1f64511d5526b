//! Covenant Constraint Language (CCL) parser, evaluator, and algebra.
//!
//! CCL is a domain-specific language for expressing access control policies
//! in Pactum covenants. It supports four statement types:
//!
//! - `permit <action> on <resource>` -- allow access
//! - `deny <action> on <resource>` -- deny access
//! - `require <action> on <resource>` -- obligation
//! - `limit <action> <count> per <period> <unit>` -- rate limit
//!
//! Permit/deny/require statements accept an optional `when <condition>`
//! clause (comparisons combined with `and`/`or`/`not` and parentheses) and
//! an optional `severity <level>` suffix.
//!
//! Evaluation semantics: default deny, deny wins at equal specificity,
//! most specific matching rule takes precedence.

mod algebra;
mod eval;
mod lexer;
mod matcher;
mod parser;

pub use algebra::{merge, serialize, validate_narrowing, NarrowingResult, NarrowingViolation};
pub use eval::{check_rate_limit, evaluate, EvaluationResult, RateLimitResult};
pub use matcher::{match_action, match_resource, specificity};

use crate::PactumError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Statement severity, used for breach reporting and rule metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    #[default]
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Severity> {
        match s {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators usable in `when` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
    In,
    NotIn,
    Matches,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Contains => "contains",
            CompareOp::NotContains => "not_contains",
            CompareOp::In => "in",
            CompareOp::NotIn => "not_in",
            CompareOp::Matches => "matches",
            CompareOp::StartsWith => "starts_with",
            CompareOp::EndsWith => "ends_with",
        }
    }

    pub fn from_str(s: &str) -> Option<CompareOp> {
        match s {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "contains" => Some(CompareOp::Contains),
            "not_contains" => Some(CompareOp::NotContains),
            "in" => Some(CompareOp::In),
            "not_in" => Some(CompareOp::NotIn),
            "matches" => Some(CompareOp::Matches),
            "starts_with" => Some(CompareOp::StartsWith),
            "ends_with" => Some(CompareOp::EndsWith),
            _ => None,
        }
    }
}

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CondValue {
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<String>),
}

/// A condition tree attached to a permit/deny/require statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        value: CondValue,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

/// A permit, deny, or require rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub action: String,
    pub resource: String,
    pub condition: Option<Condition>,
    pub severity: Severity,
}

/// A rate limit: at most `count` occurrences of `action` per `period_seconds`.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitRule {
    pub action: String,
    pub count: u32,
    pub period_seconds: u32,
    pub severity: Severity,
}

/// A CCL statement, discriminated by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Permit(Rule),
    Deny(Rule),
    Require(Rule),
    Limit(LimitRule),
}

impl Statement {
    /// The statement keyword as written in CCL source.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Permit(_) => "permit",
            Statement::Deny(_) => "deny",
            Statement::Require(_) => "require",
            Statement::Limit(_) => "limit",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Statement::Permit(r) | Statement::Deny(r) | Statement::Require(r) => r.severity,
            Statement::Limit(l) => l.severity,
        }
    }
}

/// A parsed CCL document with per-kind projections of its statements.
///
/// The projections hold exactly the statements of the matching kind, in
/// original order.
#[derive(Debug, Clone, Default)]
pub struct CclDocument {
    pub statements: Vec<Statement>,
    pub permits: Vec<Rule>,
    pub denies: Vec<Rule>,
    pub obligations: Vec<Rule>,
    pub limits: Vec<LimitRule>,
}

pub(crate) fn build_document(statements: Vec<Statement>) -> CclDocument {
    let mut permits = Vec::new();
    let mut denies = Vec::new();
    let mut obligations = Vec::new();
    let mut limits = Vec::new();

    for stmt in &statements {
        match stmt {
            Statement::Permit(r) => permits.push(r.clone()),
            Statement::Deny(r) => denies.push(r.clone()),
            Statement::Require(r) => obligations.push(r.clone()),
            Statement::Limit(l) => limits.push(l.clone()),
        }
    }

    CclDocument {
        statements,
        permits,
        denies,
        obligations,
        limits,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse CCL source text into a `CclDocument`.
///
/// Empty or whitespace/comment-only input is a syntax error.
///
/// # Errors
/// Returns `PactumError::CclSyntax` with line/column on any lexer or parser
/// failure, and `PactumError::CclValidation` for semantic issues such as a
/// zero-length limit period.
///
/// # Example
/// ```
/// use pactum::ccl::parse;
/// let doc = parse("permit read on '/data/**'").unwrap();
/// assert_eq!(doc.permits.len(), 1);
/// ```
pub fn parse(source: &str) -> Result<CclDocument, PactumError> {
    let tokens = lexer::tokenize(source)?;
    let statements = parser::Parser::new(tokens).parse()?;
    if statements.is_empty() {
        return Err(PactumError::CclSyntax {
            line: 1,
            col: 1,
            message: "Document contains no statements".to_string(),
        });
    }
    Ok(build_document(statements))
}
