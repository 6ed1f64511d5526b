//! CCL document algebra: merge, narrowing validation, and serialization.
//!
//! Merge implements deny-wins composition of a parent and child document;
//! narrowing validation enforces that a child policy never grants anything
//! broader than its parent.

use super::matcher::{match_action, match_resource};
use super::{build_document, CclDocument, CondValue, Condition, LimitRule, Severity, Statement};
use std::collections::HashMap;

/// A violation found during narrowing validation.
#[derive(Debug, Clone)]
pub struct NarrowingViolation {
    pub message: String,
}

/// Result of validating that a child CCL document only narrows the parent.
#[derive(Debug, Clone)]
pub struct NarrowingResult {
    pub valid: bool,
    pub violations: Vec<NarrowingViolation>,
}

/// Merge a parent and child CCL document with deny-wins semantics.
///
/// - All denies from both (parent first, then child).
/// - All permits from both (child first, then parent).
/// - All obligations from both (parent, then child).
/// - Limits keyed by action: the smaller count wins; at equal count the
///   child's entry replaces the parent's.
pub fn merge(parent: &CclDocument, child: &CclDocument) -> CclDocument {
    let mut statements: Vec<Statement> = Vec::new();

    statements.extend(parent.denies.iter().cloned().map(Statement::Deny));
    statements.extend(child.denies.iter().cloned().map(Statement::Deny));

    statements.extend(child.permits.iter().cloned().map(Statement::Permit));
    statements.extend(parent.permits.iter().cloned().map(Statement::Permit));

    statements.extend(parent.obligations.iter().cloned().map(Statement::Require));
    statements.extend(child.obligations.iter().cloned().map(Statement::Require));

    // Limits: insertion-ordered, parent sweep then child sweep
    let mut merged_limits: Vec<LimitRule> = Vec::new();
    let mut index_by_action: HashMap<String, usize> = HashMap::new();
    for limit in &parent.limits {
        upsert_limit(&mut merged_limits, &mut index_by_action, limit, false);
    }
    for limit in &child.limits {
        upsert_limit(&mut merged_limits, &mut index_by_action, limit, true);
    }
    statements.extend(merged_limits.into_iter().map(Statement::Limit));

    build_document(statements)
}

fn upsert_limit(
    limits: &mut Vec<LimitRule>,
    index_by_action: &mut HashMap<String, usize>,
    limit: &LimitRule,
    replace_on_tie: bool,
) {
    match index_by_action.get(&limit.action) {
        Some(&i) => {
            let existing = &limits[i];
            let wins = limit.count < existing.count
                || (replace_on_tie && limit.count == existing.count);
            if wins {
                limits[i] = limit.clone();
            }
        }
        None => {
            index_by_action.insert(limit.action.clone(), limits.len());
            limits.push(limit.clone());
        }
    }
}

/// Validate that a child CCL document only narrows (restricts) the parent.
///
/// Violations occur when:
/// - a child permits something the parent explicitly denies
/// - the parent has permits and a child permit is not a subset of any of them
pub fn validate_narrowing(parent: &CclDocument, child: &CclDocument) -> NarrowingResult {
    let mut violations = Vec::new();

    for child_permit in &child.permits {
        for parent_deny in &parent.denies {
            if patterns_overlap(&child_permit.action, &parent_deny.action)
                && patterns_overlap(&child_permit.resource, &parent_deny.resource)
            {
                violations.push(NarrowingViolation {
                    message: format!(
                        "Child permits '{}' on '{}' which parent denies",
                        child_permit.action, child_permit.resource
                    ),
                });
            }
        }

        if !parent.permits.is_empty() {
            let has_covering_parent = parent.permits.iter().any(|parent_permit| {
                is_subset_pattern(&child_permit.action, &parent_permit.action, ".")
                    && is_subset_pattern(&child_permit.resource, &parent_permit.resource, "/")
            });

            if !has_covering_parent {
                violations.push(NarrowingViolation {
                    message: format!(
                        "Child permit '{}' on '{}' is not a subset of any parent permit",
                        child_permit.action, child_permit.resource
                    ),
                });
            }
        }
    }

    NarrowingResult {
        valid: violations.is_empty(),
        violations,
    }
}

/// Check if two patterns can match any of the same strings.
///
/// Heuristic: wildcard-only patterns overlap everything; otherwise each
/// pattern's wildcards are substituted with a concrete segment and matched
/// against the other pattern, in either direction.
pub(crate) fn patterns_overlap(pattern1: &str, pattern2: &str) -> bool {
    if pattern1 == "**" || pattern2 == "**" {
        return true;
    }
    if pattern1 == "*" || pattern2 == "*" {
        return true;
    }
    if pattern1 == pattern2 {
        return true;
    }

    let concrete1 = pattern_to_concrete(pattern1);
    let concrete2 = pattern_to_concrete(pattern2);

    if pattern1.contains('/') || pattern2.contains('/') {
        match_resource(pattern1, &concrete2) || match_resource(pattern2, &concrete1)
    } else {
        match_action(pattern1, &concrete2) || match_action(pattern2, &concrete1)
    }
}

fn pattern_to_concrete(pattern: &str) -> String {
    pattern.replace("**", "x").replace('*', "x")
}

/// Check if `child_pattern` is at most as broad as `parent_pattern`.
pub(crate) fn is_subset_pattern(child_pattern: &str, parent_pattern: &str, separator: &str) -> bool {
    if parent_pattern == "**" {
        return true;
    }
    if child_pattern == "**" && parent_pattern != "**" {
        return false;
    }

    let child_parts: Vec<&str> = child_pattern
        .split(separator)
        .filter(|p| !p.is_empty())
        .collect();
    let parent_parts: Vec<&str> = parent_pattern
        .split(separator)
        .filter(|p| !p.is_empty())
        .collect();

    is_subset_segments(&child_parts, 0, &parent_parts, 0)
}

fn is_subset_segments(child: &[&str], ci: usize, parent: &[&str], pi: usize) -> bool {
    if ci == child.len() && pi == parent.len() {
        return true;
    }
    if pi == parent.len() {
        return false;
    }
    if ci == child.len() {
        // Only ok if remaining parent segments are all **
        return parent[pi..].iter().all(|p| *p == "**");
    }

    let p_seg = parent[pi];
    let c_seg = child[ci];

    if p_seg == "**" {
        // Parent ** may consume zero or more child segments
        if is_subset_segments(child, ci, parent, pi + 1) {
            return true;
        }
        return is_subset_segments(child, ci + 1, parent, pi);
    }

    if c_seg == "**" {
        // Child ** is broader than any parent non-**
        return false;
    }

    if p_seg == "*" {
        // Parent * covers any single non-** child segment
        return is_subset_segments(child, ci + 1, parent, pi + 1);
    }

    if c_seg == "*" {
        // Child * is broader than a literal parent segment
        return false;
    }

    // Both literals: must match exactly
    if c_seg != p_seg {
        return false;
    }
    is_subset_segments(child, ci + 1, parent, pi + 1)
}

/// Serialize a CCL document back to human-readable CCL source text.
///
/// Statements are emitted in stored order. The default `high` severity is
/// omitted; limit periods use the largest time unit that divides evenly.
pub fn serialize(doc: &CclDocument) -> String {
    doc.statements
        .iter()
        .map(serialize_statement)
        .collect::<Vec<_>>()
        .join("\n")
}

fn serialize_statement(stmt: &Statement) -> String {
    match stmt {
        Statement::Permit(r) | Statement::Deny(r) | Statement::Require(r) => {
            let mut line = format!("{} {} on '{}'", stmt.kind(), r.action, r.resource);
            if let Some(ref cond) = r.condition {
                line.push_str(" when ");
                line.push_str(&serialize_condition(cond));
            }
            if r.severity != Severity::High {
                line.push_str(&format!(" severity {}", r.severity));
            }
            line
        }
        Statement::Limit(l) => {
            let (period_val, unit) = best_time_unit(l.period_seconds);
            let mut line = format!("limit {} {} per {} {}", l.action, l.count, period_val, unit);
            if l.severity != Severity::High {
                line.push_str(&format!(" severity {}", l.severity));
            }
            line
        }
    }
}

fn serialize_condition(cond: &Condition) -> String {
    match cond {
        Condition::Compare { field, op, value } => {
            format!("{} {} {}", field, op.as_str(), serialize_value(value))
        }
        Condition::And(children) => children
            .iter()
            .map(|c| wrap_if(c, matches!(c, Condition::Or(_))))
            .collect::<Vec<_>>()
            .join(" and "),
        Condition::Or(children) => children
            .iter()
            .map(serialize_condition)
            .collect::<Vec<_>>()
            .join(" or "),
        Condition::Not(child) => {
            let needs_parens = matches!(**child, Condition::And(_) | Condition::Or(_));
            format!("not {}", wrap_if(child, needs_parens))
        }
    }
}

fn wrap_if(cond: &Condition, parens: bool) -> String {
    let s = serialize_condition(cond);
    if parens {
        format!("({})", s)
    } else {
        s
    }
}

fn serialize_value(value: &CondValue) -> String {
    match value {
        CondValue::Str(s) => format!("'{}'", s),
        CondValue::Num(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        CondValue::Bool(b) => b.to_string(),
        CondValue::List(items) => {
            let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}

fn best_time_unit(seconds: u32) -> (u32, &'static str) {
    if seconds > 0 && seconds % 86400 == 0 {
        (seconds / 86400, "days")
    } else if seconds > 0 && seconds % 3600 == 0 {
        (seconds / 3600, "hours")
    } else if seconds > 0 && seconds % 60 == 0 {
        (seconds / 60, "minutes")
    } else {
        (seconds, "seconds")
    }
}
