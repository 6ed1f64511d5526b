//! Delegation chain resolution and validation.
//!
//! A covenant may reference a parent covenant through its `chain` field,
//! forming a delegation chain from a root covenant down to the leaf. The
//! resolver walks parent references through a [`Store`], enforces the depth
//! limit, validates that every child only narrows its parent, and computes
//! the effective merged policy for the whole chain.

use crate::ccl;
use crate::covenant::{self, CovenantDocument, VerificationResult, MAX_CHAIN_DEPTH};
use crate::store::Store;
use crate::PactumError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// A narrowing violation between two adjacent covenants in a chain.
#[derive(Debug, Clone)]
pub struct ChainNarrowingViolation {
    pub parent_id: String,
    pub child_id: String,
    pub message: String,
}

/// Result of validating narrowing along a resolved chain.
#[derive(Debug, Clone)]
pub struct ChainNarrowingResult {
    pub valid: bool,
    pub violations: Vec<ChainNarrowingViolation>,
}

/// Full verification result for a chained covenant: the document itself,
/// every ancestor, and narrowing along the chain.
#[derive(Debug)]
pub struct ChainVerification {
    pub valid: bool,
    /// Verification of the leaf document, paired with its id.
    pub document: (String, VerificationResult),
    /// Verification of each ancestor, root first.
    pub ancestors: Vec<(String, VerificationResult)>,
    pub narrowing: ChainNarrowingResult,
}

/// Resolves covenant delegation chains out of a document store.
pub struct ChainResolver<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> ChainResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ChainResolver { store }
    }

    /// Resolve the full chain for a covenant, returned root-first.
    ///
    /// # Errors
    /// - `ChainMissingParent` if the start document or any ancestor cannot
    ///   be loaded
    /// - `ChainCycle` if a covenant id repeats along the walk
    /// - `ChainDepthExceeded` if the chain has more than
    ///   [`MAX_CHAIN_DEPTH`] ancestors
    pub fn resolve_chain(&self, start_id: &str) -> Result<Vec<CovenantDocument>, PactumError> {
        let mut chain: Vec<CovenantDocument> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        let mut current = self
            .store
            .get(start_id)?
            .cloned()
            .ok_or_else(|| PactumError::ChainMissingParent(start_id.to_string()))?;
        visited.insert(current.id.clone());

        loop {
            let parent_id = match &current.chain {
                Some(reference) => reference.parent_id.clone(),
                None => {
                    chain.push(current);
                    break;
                }
            };

            chain.push(current);
            if chain.len() > MAX_CHAIN_DEPTH {
                return Err(PactumError::ChainDepthExceeded {
                    id: parent_id,
                    max: MAX_CHAIN_DEPTH,
                });
            }
            if !visited.insert(parent_id.clone()) {
                return Err(PactumError::ChainCycle(parent_id));
            }

            current = self
                .store
                .get(&parent_id)?
                .cloned()
                .ok_or_else(|| PactumError::ChainMissingParent(parent_id))?;
        }

        chain.reverse();
        debug!(start = %start_id, length = chain.len(), "resolved covenant chain");
        Ok(chain)
    }

    /// Verify a chained covenant end to end: the document itself, the
    /// resolved chain's narrowing, and every ancestor individually.
    ///
    /// # Errors
    /// Propagates chain resolution failures; verification failures of the
    /// documents themselves are reported in the returned result.
    pub fn verify_chained(
        &self,
        start_id: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<ChainVerification, PactumError> {
        let chain = self.resolve_chain(start_id)?;
        let narrowing = validate_chain_narrowing(&chain)?;

        let (ancestors_docs, leaf) = chain.split_at(chain.len() - 1);
        let document = (
            leaf[0].id.clone(),
            covenant::verify_covenant(&leaf[0], now),
        );
        let ancestors: Vec<(String, VerificationResult)> = ancestors_docs
            .iter()
            .map(|doc| (doc.id.clone(), covenant::verify_covenant(doc, now)))
            .collect();

        let valid = narrowing.valid
            && document.1.valid
            && ancestors.iter().all(|(_, result)| result.valid);

        Ok(ChainVerification {
            valid,
            document,
            ancestors,
            narrowing,
        })
    }
}

/// Validate that each covenant in a resolved chain only narrows its parent.
///
/// The chain must be ordered root-first, as produced by
/// [`ChainResolver::resolve_chain`].
///
/// # Errors
/// Returns a CCL error if any covenant's constraints fail to parse.
pub fn validate_chain_narrowing(
    chain: &[CovenantDocument],
) -> Result<ChainNarrowingResult, PactumError> {
    let mut violations: Vec<ChainNarrowingViolation> = Vec::new();

    for pair in chain.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        let parent_ccl = ccl::parse(&parent.constraints)?;
        let child_ccl = ccl::parse(&child.constraints)?;
        let result = ccl::validate_narrowing(&parent_ccl, &child_ccl);
        for violation in result.violations {
            violations.push(ChainNarrowingViolation {
                parent_id: parent.id.clone(),
                child_id: child.id.clone(),
                message: violation.message,
            });
        }
    }

    Ok(ChainNarrowingResult {
        valid: violations.is_empty(),
        violations,
    })
}

/// Compute the effective policy of a resolved chain by merging every
/// covenant's constraints from the root down.
pub fn compute_effective_constraints(
    chain: &[CovenantDocument],
) -> Result<ccl::CclDocument, PactumError> {
    let mut docs = chain.iter();
    let root = match docs.next() {
        Some(doc) => doc,
        None => return Ok(ccl::CclDocument::default()),
    };

    let mut effective = ccl::parse(&root.constraints)?;
    for child in docs {
        let child_ccl = ccl::parse(&child.constraints)?;
        effective = ccl::merge(&effective, &child_ccl);
    }
    Ok(effective)
}
