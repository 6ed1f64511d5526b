//! CCL document evaluation against (action, resource, context) requests.
//!
//! Resolution order:
//! 1. Find all matching permit/deny statements (patterns match, condition passes)
//! 2. Sort by specificity (most specific first)
//! 3. At equal specificity, deny wins over permit
//! 4. If no rules match, default is deny
//!
//! Condition evaluation never fails at runtime: a missing context field,
//! a type mismatch, or an invalid regex all evaluate to `false`.

use super::matcher::{match_action, match_resource, specificity};
use super::{CclDocument, CompareOp, CondValue, Condition, LimitRule, Rule, Severity, Statement};
use serde_json::Value;

/// Result of evaluating a CCL document against an action/resource pair.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub permitted: bool,
    pub matched_rule: Option<Statement>,
    pub all_matches: Vec<Statement>,
    pub reason: String,
    pub severity: Option<Severity>,
}

/// Result of checking a rate limit.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub exceeded: bool,
    pub limit: Option<u32>,
    pub remaining: u32,
}

/// Look up a dotted path in a nested JSON context.
///
/// Returns `None` on any miss or on traversal through a non-object.
fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn values_equal(field: &Value, expected: &CondValue) -> bool {
    match expected {
        CondValue::Str(s) => field.as_str() == Some(s.as_str()),
        CondValue::Num(n) => field.as_f64() == Some(*n),
        CondValue::Bool(b) => field.as_bool() == Some(*b),
        CondValue::List(items) => match field {
            Value::Array(arr) => {
                arr.len() == items.len()
                    && arr
                        .iter()
                        .zip(items.iter())
                        .all(|(v, s)| v.as_str() == Some(s.as_str()))
            }
            _ => false,
        },
    }
}

fn numeric_compare(field: &Value, expected: &CondValue, cmp: fn(f64, f64) -> bool) -> bool {
    match (field.as_f64(), expected) {
        (Some(a), CondValue::Num(b)) => cmp(a, *b),
        _ => false,
    }
}

fn contains(field: &Value, expected: &CondValue) -> bool {
    match field {
        Value::String(s) => match expected {
            CondValue::Str(needle) => s.contains(needle.as_str()),
            CondValue::Num(n) => s.contains(&n.to_string()),
            CondValue::Bool(b) => s.contains(&b.to_string()),
            CondValue::List(_) => false,
        },
        Value::Array(arr) => {
            let needle = match expected {
                CondValue::Str(s) => s.clone(),
                CondValue::Num(n) => n.to_string(),
                CondValue::Bool(b) => b.to_string(),
                CondValue::List(_) => return false,
            };
            arr.iter()
                .any(|v| value_as_string(v).is_some_and(|s| s == needle))
        }
        _ => false,
    }
}

/// Evaluate a single condition tree against a context object.
pub(super) fn evaluate_condition(condition: &Condition, context: &Value) -> bool {
    match condition {
        Condition::And(children) => children.iter().all(|c| evaluate_condition(c, context)),
        Condition::Or(children) => children.iter().any(|c| evaluate_condition(c, context)),
        Condition::Not(child) => !evaluate_condition(child, context),
        Condition::Compare { field, op, value } => {
            let field_value = match lookup_path(context, field) {
                Some(v) => v,
                None => return false,
            };
            compare(field_value, *op, value)
        }
    }
}

fn compare(field_value: &Value, op: CompareOp, expected: &CondValue) -> bool {
    match op {
        CompareOp::Eq => values_equal(field_value, expected),
        CompareOp::Ne => !values_equal(field_value, expected),
        CompareOp::Lt => numeric_compare(field_value, expected, |a, b| a < b),
        CompareOp::Le => numeric_compare(field_value, expected, |a, b| a <= b),
        CompareOp::Gt => numeric_compare(field_value, expected, |a, b| a > b),
        CompareOp::Ge => numeric_compare(field_value, expected, |a, b| a >= b),
        CompareOp::Contains => contains(field_value, expected),
        CompareOp::NotContains => !contains(field_value, expected),
        CompareOp::In | CompareOp::NotIn => {
            let items = match expected {
                CondValue::List(items) => items,
                _ => return false,
            };
            let field_str = match value_as_string(field_value) {
                Some(s) => s,
                None => return false,
            };
            let found = items.iter().any(|i| *i == field_str);
            if op == CompareOp::In {
                found
            } else {
                !found
            }
        }
        CompareOp::Matches => {
            let pattern = match expected {
                CondValue::Str(s) => s,
                _ => return false,
            };
            let field_str = match field_value.as_str() {
                Some(s) => s,
                None => return false,
            };
            // Invalid regex evaluates to false rather than failing the request
            match regex::Regex::new(pattern) {
                Ok(re) => re.is_match(field_str),
                Err(_) => false,
            }
        }
        CompareOp::StartsWith => match (field_value.as_str(), expected) {
            (Some(s), CondValue::Str(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        CompareOp::EndsWith => match (field_value.as_str(), expected) {
            (Some(s), CondValue::Str(suffix)) => s.ends_with(suffix.as_str()),
            _ => false,
        },
    }
}

fn rule_applies(rule: &Rule, action: &str, resource: &str, context: &Value) -> bool {
    match_action(&rule.action, action)
        && match_resource(&rule.resource, resource)
        && rule
            .condition
            .as_ref()
            .is_none_or(|c| evaluate_condition(c, context))
}

/// Evaluate a CCL document against an action/resource pair.
///
/// `context` defaults to an empty object when absent. Obligations that match
/// are reported in `all_matches` but do not affect the decision.
pub fn evaluate(
    doc: &CclDocument,
    action: &str,
    resource: &str,
    context: Option<&Value>,
) -> EvaluationResult {
    let empty = Value::Object(serde_json::Map::new());
    let ctx = context.unwrap_or(&empty);

    let mut all_matches: Vec<Statement> = Vec::new();
    let mut candidates: Vec<Statement> = Vec::new();

    for rule in &doc.permits {
        if rule_applies(rule, action, resource, ctx) {
            candidates.push(Statement::Permit(rule.clone()));
            all_matches.push(Statement::Permit(rule.clone()));
        }
    }
    for rule in &doc.denies {
        if rule_applies(rule, action, resource, ctx) {
            candidates.push(Statement::Deny(rule.clone()));
            all_matches.push(Statement::Deny(rule.clone()));
        }
    }
    for rule in &doc.obligations {
        if rule_applies(rule, action, resource, ctx) {
            all_matches.push(Statement::Require(rule.clone()));
        }
    }

    if candidates.is_empty() {
        return EvaluationResult {
            permitted: false,
            matched_rule: None,
            all_matches,
            reason: "No matching rules found; default deny".to_string(),
            severity: None,
        };
    }

    // Sort by specificity descending; stable sort keeps insertion order at
    // full ties, deny sorts before permit at equal specificity
    candidates.sort_by(|a, b| {
        let (ra, rb) = (stmt_rule(a), stmt_rule(b));
        let spec_a = specificity(&ra.action, &ra.resource);
        let spec_b = specificity(&rb.action, &rb.resource);
        match spec_b.cmp(&spec_a) {
            std::cmp::Ordering::Equal => {
                let a_is_deny = matches!(a, Statement::Deny(_));
                let b_is_deny = matches!(b, Statement::Deny(_));
                match (a_is_deny, b_is_deny) {
                    (true, false) => std::cmp::Ordering::Less,
                    (false, true) => std::cmp::Ordering::Greater,
                    _ => std::cmp::Ordering::Equal,
                }
            }
            other => other,
        }
    });

    let winner = candidates[0].clone();
    let winner_rule = stmt_rule(&winner);
    let permitted = matches!(winner, Statement::Permit(_));

    EvaluationResult {
        permitted,
        reason: format!(
            "Matched {} rule for {} on {}",
            winner.kind(),
            winner_rule.action,
            winner_rule.resource
        ),
        severity: Some(winner_rule.severity),
        matched_rule: Some(winner),
        all_matches,
    }
}

fn stmt_rule(stmt: &Statement) -> &Rule {
    match stmt {
        Statement::Permit(r) | Statement::Deny(r) | Statement::Require(r) => r,
        Statement::Limit(_) => unreachable!("limits are never evaluation candidates"),
    }
}

/// Check whether an action has exceeded its rate limit.
///
/// Picks the most specific matching limit statement. If the window starting
/// at `window_start_ms` has expired by `now_ms`, the count resets and the
/// full limit is available again.
pub fn check_rate_limit(
    doc: &CclDocument,
    action: &str,
    current_count: u32,
    window_start_ms: i64,
    now_ms: i64,
) -> RateLimitResult {
    let mut matched: Option<&LimitRule> = None;
    let mut best_specificity = -1i32;

    for limit in &doc.limits {
        if match_action(&limit.action, action) {
            let spec = specificity(&limit.action, "");
            if spec > best_specificity {
                best_specificity = spec;
                matched = Some(limit);
            }
        }
    }

    let limit = match matched {
        Some(l) => l,
        None => {
            return RateLimitResult {
                exceeded: false,
                limit: None,
                remaining: u32::MAX,
            }
        }
    };

    let period_ms = i64::from(limit.period_seconds) * 1000;
    if now_ms - window_start_ms > period_ms {
        // Window expired; the count resets
        return RateLimitResult {
            exceeded: false,
            limit: Some(limit.count),
            remaining: limit.count,
        };
    }

    RateLimitResult {
        exceeded: current_count >= limit.count,
        limit: Some(limit.count),
        remaining: limit.count.saturating_sub(current_count),
    }
}
