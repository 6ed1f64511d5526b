//! Constraint negotiation between two parties.
//!
//! Sessions are immutable values: every transition produces a new session.
//! A session moves `proposing -> countering -> agreed | failed`; `agreed`
//! and `failed` are terminal and any further transition is an error.
//!
//! Constraints are exchanged as short strings, optionally in `type:resource`
//! form (e.g. `deny:exfil`, `require:auth`). On agreement, deny constraints
//! from the last two proposals are unioned (deny wins) and the remaining
//! constraints are intersected.

use crate::crypto;
use crate::PactumError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle states. `Agreed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Proposing,
    Countering,
    Agreed,
    Failed,
}

/// One side's proposed constraint set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub from: String,
    pub constraints: Vec<String>,
    pub timestamp: String,
}

/// The negotiation preferences of one party.
#[derive(Debug, Clone, Default)]
pub struct NegotiationPolicy {
    /// Constraints that must be present for acceptance.
    pub required: Vec<String>,
    /// Constraints offered in the opening proposal beyond the required set.
    pub preferred: Vec<String>,
    /// Constraints whose presence forces rejection.
    pub dealbreakers: Vec<String>,
    pub max_rounds: usize,
    pub timeout_ms: i64,
}

/// Decision returned by [`evaluate_proposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalDecision {
    Accept,
    Reject,
    Counter,
}

/// An immutable negotiation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: String,
    pub initiator: String,
    pub responder: String,
    pub status: SessionStatus,
    pub proposals: Vec<Proposal>,
    #[serde(rename = "maxRounds")]
    pub max_rounds: usize,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "resultingConstraints", skip_serializing_if = "Option::is_none")]
    pub resulting_constraints: Option<Vec<String>>,
    #[serde(rename = "failureReason", skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

fn ensure_open(session: &NegotiationSession) -> Result<(), PactumError> {
    match session.status {
        SessionStatus::Agreed | SessionStatus::Failed => Err(PactumError::TerminalState(format!(
            "session {} is already {:?}",
            session.id, session.status
        ))),
        _ => Ok(()),
    }
}

/// Start a new session. The opening proposal carries the initiator's
/// required constraints followed by its preferred ones.
pub fn initiate(initiator: &str, responder: &str, policy: &NegotiationPolicy) -> NegotiationSession {
    let mut constraints: Vec<String> = Vec::new();
    for c in policy.required.iter().chain(policy.preferred.iter()) {
        if !constraints.contains(c) {
            constraints.push(c.clone());
        }
    }

    NegotiationSession {
        id: crypto::generate_default_id(),
        initiator: initiator.to_string(),
        responder: responder.to_string(),
        status: SessionStatus::Proposing,
        proposals: vec![Proposal {
            from: initiator.to_string(),
            constraints,
            timestamp: crypto::timestamp(),
        }],
        max_rounds: policy.max_rounds,
        timeout_ms: policy.timeout_ms,
        created_at: crypto::timestamp(),
        resulting_constraints: None,
        failure_reason: None,
    }
}

/// Append a proposal without changing the session status.
pub fn propose(
    session: &NegotiationSession,
    proposal: Proposal,
) -> Result<NegotiationSession, PactumError> {
    ensure_open(session)?;
    let mut next = session.clone();
    next.proposals.push(proposal);
    Ok(next)
}

/// Respond with a counter-proposal, moving the session to `countering`.
///
/// # Errors
/// `TerminalState` on a closed session; `Validation` once the round
/// budget is exhausted.
pub fn counter(
    session: &NegotiationSession,
    counter_proposal: Proposal,
) -> Result<NegotiationSession, PactumError> {
    ensure_open(session)?;
    if session.proposals.len() >= session.max_rounds {
        return Err(PactumError::Validation(format!(
            "negotiation reached the maximum of {} rounds",
            session.max_rounds
        )));
    }
    let mut next = session.clone();
    next.status = SessionStatus::Countering;
    next.proposals.push(counter_proposal);
    Ok(next)
}

/// Close the session as agreed and compute the resulting constraints.
///
/// The result is the union of `deny:`-prefixed constraints from the last two
/// proposals followed by the intersection of the remaining constraints. With
/// a single proposal its constraints are copied; with none, the result is
/// empty.
pub fn agree(session: &NegotiationSession) -> Result<NegotiationSession, PactumError> {
    ensure_open(session)?;
    let mut next = session.clone();
    next.status = SessionStatus::Agreed;
    next.resulting_constraints = Some(resulting_constraints(&session.proposals));
    Ok(next)
}

fn is_deny(constraint: &str) -> bool {
    constraint.starts_with("deny:")
}

fn resulting_constraints(proposals: &[Proposal]) -> Vec<String> {
    match proposals {
        [] => Vec::new(),
        [only] => only.constraints.clone(),
        [.., a, b] => {
            let mut result: Vec<String> = Vec::new();
            // Deny wins: union of denies from both sides
            for c in a.constraints.iter().chain(b.constraints.iter()) {
                if is_deny(c) && !result.contains(c) {
                    result.push(c.clone());
                }
            }
            // Everything else requires agreement from both sides
            for c in &a.constraints {
                if !is_deny(c) && b.constraints.contains(c) && !result.contains(c) {
                    result.push(c.clone());
                }
            }
            result
        }
    }
}

/// Close the session as failed.
pub fn fail(
    session: &NegotiationSession,
    reason: Option<&str>,
) -> Result<NegotiationSession, PactumError> {
    ensure_open(session)?;
    let mut next = session.clone();
    next.status = SessionStatus::Failed;
    next.failure_reason = reason.map(|r| r.to_string());
    Ok(next)
}

/// Whether the session's timeout has elapsed. `now` defaults to the current
/// clock.
pub fn is_expired(session: &NegotiationSession, now: Option<DateTime<Utc>>) -> bool {
    let created = match crypto::parse_timestamp(&session.created_at) {
        Some(t) => t,
        None => return false,
    };
    let now = now.unwrap_or_else(Utc::now);
    (now - created).num_milliseconds() > session.timeout_ms
}

/// Number of proposals exchanged so far.
pub fn round_count(session: &NegotiationSession) -> usize {
    session.proposals.len()
}

/// Decide how to respond to an incoming proposal under a policy.
///
/// Rejects if any dealbreaker matches a proposed constraint; accepts if all
/// required constraints are present; otherwise counters.
pub fn evaluate_proposal(proposal: &Proposal, policy: &NegotiationPolicy) -> ProposalDecision {
    for dealbreaker in &policy.dealbreakers {
        if proposal
            .constraints
            .iter()
            .any(|c| constraint_matches(dealbreaker, c))
        {
            return ProposalDecision::Reject;
        }
    }

    let all_required_present = policy.required.iter().all(|required| {
        proposal
            .constraints
            .iter()
            .any(|c| constraint_matches(required, c))
    });

    if all_required_present {
        ProposalDecision::Accept
    } else {
        ProposalDecision::Counter
    }
}

/// Constraint matching: exact equality, or type-aware matching on the
/// `type:resource` form where `*` on either resource side matches any.
fn constraint_matches(pattern: &str, constraint: &str) -> bool {
    if pattern == constraint {
        return true;
    }
    match (pattern.split_once(':'), constraint.split_once(':')) {
        (Some((p_type, p_res)), Some((c_type, c_res))) => {
            p_type == c_type && (p_res == c_res || p_res == "*" || c_res == "*")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NegotiationPolicy {
        NegotiationPolicy {
            required: vec!["deny:exfil".to_string(), "require:auth".to_string()],
            preferred: vec!["limit:api".to_string()],
            dealbreakers: vec!["permit:exfil".to_string()],
            max_rounds: 5,
            timeout_ms: 60_000,
        }
    }

    fn proposal(from: &str, constraints: &[&str]) -> Proposal {
        Proposal {
            from: from.to_string(),
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
            timestamp: crypto::timestamp(),
        }
    }

    #[test]
    fn test_initiate_opening_proposal() {
        let session = initiate("alice", "bob", &policy());
        assert_eq!(session.status, SessionStatus::Proposing);
        assert_eq!(round_count(&session), 1);
        assert_eq!(
            session.proposals[0].constraints,
            vec!["deny:exfil", "require:auth", "limit:api"]
        );
        assert_eq!(session.proposals[0].from, "alice");
    }

    #[test]
    fn test_counter_transitions_and_appends() {
        let session = initiate("alice", "bob", &policy());
        let countered = counter(
            &session,
            proposal("bob", &["deny:exfil", "require:auth", "deny:network"]),
        )
        .unwrap();
        assert_eq!(countered.status, SessionStatus::Countering);
        assert_eq!(round_count(&countered), 2);
        // Original session is untouched
        assert_eq!(session.status, SessionStatus::Proposing);
        assert_eq!(round_count(&session), 1);
    }

    #[test]
    fn test_counter_respects_max_rounds() {
        let mut session = initiate("alice", "bob", &policy());
        for i in 1..5 {
            session = counter(&session, proposal("bob", &["deny:exfil"])).unwrap();
            assert_eq!(round_count(&session), i + 1);
        }
        let err = counter(&session, proposal("alice", &["deny:exfil"])).unwrap_err();
        assert!(matches!(err, PactumError::Validation(_)));
    }

    #[test]
    fn test_agree_unions_denies_intersects_rest() {
        let session = initiate("alice", "bob", &policy());
        let countered = counter(
            &session,
            proposal("bob", &["deny:exfil", "require:auth", "deny:network"]),
        )
        .unwrap();
        let agreed = agree(&countered).unwrap();
        assert_eq!(agreed.status, SessionStatus::Agreed);

        let result = agreed.resulting_constraints.unwrap();
        assert!(result.contains(&"deny:exfil".to_string()));
        assert!(result.contains(&"deny:network".to_string()));
        assert!(result.contains(&"require:auth".to_string()));
        // limit:api was not in bob's proposal, so the intersection drops it
        assert!(!result.contains(&"limit:api".to_string()));
    }

    #[test]
    fn test_agree_single_proposal_copies() {
        let session = initiate("alice", "bob", &policy());
        let agreed = agree(&session).unwrap();
        assert_eq!(
            agreed.resulting_constraints.unwrap(),
            session.proposals[0].constraints
        );
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let session = initiate("alice", "bob", &policy());
        let agreed = agree(&session).unwrap();
        assert!(matches!(
            agree(&agreed).unwrap_err(),
            PactumError::TerminalState(_)
        ));
        assert!(matches!(
            counter(&agreed, proposal("bob", &["deny:x"])).unwrap_err(),
            PactumError::TerminalState(_)
        ));
        assert!(matches!(
            fail(&agreed, None).unwrap_err(),
            PactumError::TerminalState(_)
        ));

        let failed = fail(&session, Some("no overlap")).unwrap();
        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("no overlap"));
        assert!(matches!(
            propose(&failed, proposal("alice", &[])).unwrap_err(),
            PactumError::TerminalState(_)
        ));
    }

    #[test]
    fn test_propose_keeps_status() {
        let session = initiate("alice", "bob", &policy());
        let next = propose(&session, proposal("alice", &["deny:exfil"])).unwrap();
        assert_eq!(next.status, SessionStatus::Proposing);
        assert_eq!(round_count(&next), 2);
    }

    #[test]
    fn test_evaluate_proposal_reject_on_dealbreaker() {
        let decision = evaluate_proposal(
            &proposal("bob", &["permit:exfil", "require:auth"]),
            &policy(),
        );
        assert_eq!(decision, ProposalDecision::Reject);
    }

    #[test]
    fn test_evaluate_proposal_accept_when_required_present() {
        let decision = evaluate_proposal(
            &proposal("bob", &["deny:exfil", "require:auth", "deny:extra"]),
            &policy(),
        );
        assert_eq!(decision, ProposalDecision::Accept);
    }

    #[test]
    fn test_evaluate_proposal_counter_when_incomplete() {
        let decision = evaluate_proposal(&proposal("bob", &["deny:exfil"]), &policy());
        assert_eq!(decision, ProposalDecision::Counter);
    }

    #[test]
    fn test_constraint_type_aware_matching() {
        assert!(constraint_matches("deny:exfil", "deny:exfil"));
        assert!(constraint_matches("deny:*", "deny:exfil"));
        assert!(constraint_matches("deny:exfil", "deny:*"));
        assert!(!constraint_matches("deny:exfil", "permit:exfil"));
        assert!(!constraint_matches("deny:exfil", "deny:network"));
        assert!(!constraint_matches("plain", "other"));
    }

    #[test]
    fn test_is_expired() {
        let mut session = initiate("alice", "bob", &policy());
        session.created_at = "2020-01-01T00:00:00.000Z".to_string();
        let just_after = crypto::parse_timestamp("2020-01-01T00:00:30.000Z").unwrap();
        let long_after = crypto::parse_timestamp("2020-01-01T01:00:00.000Z").unwrap();
        assert!(!is_expired(&session, Some(just_after)));
        assert!(is_expired(&session, Some(long_after)));
    }
}
