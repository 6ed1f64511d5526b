//! Trust graph: breach attestations and deterministic trust propagation.
//!
//! The graph maps identity hashes to trust nodes connected by dependency
//! edges. Processing a verified breach attestation degrades the violator's
//! status and propagates weakened degradations breadth-first through its
//! dependents: revoked parents restrict their dependents, restricted parents
//! degrade theirs, and propagation halts once the applied status would fall
//! below `degraded`.
//!
//! The graph is the kernel's single mutable owner. All value types returned
//! from accessors are defensive copies. A propagation lock serializes
//! `process_breach` end to end; listeners are invoked after all node updates
//! are committed, in BFS event order. Listener callbacks may read the graph
//! but must not register or remove listeners.

use crate::ccl::Severity;
use crate::covenant::{VerificationCheck, VerificationResult};
use crate::crypto;
use crate::PactumError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Trust status
// ---------------------------------------------------------------------------

/// Trust standing of an identity, worst to best:
/// `revoked < restricted < degraded < trusted < unknown`.
///
/// `Unknown` denotes absence from the graph and is never assigned by
/// propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    Revoked,
    Restricted,
    Degraded,
    Trusted,
    Unknown,
}

impl TrustStatus {
    fn rank(self) -> u8 {
        match self {
            TrustStatus::Revoked => 0,
            TrustStatus::Restricted => 1,
            TrustStatus::Degraded => 2,
            TrustStatus::Trusted => 3,
            TrustStatus::Unknown => 4,
        }
    }

    /// The worse (lower-ranked) of two statuses.
    pub fn worse_of(a: TrustStatus, b: TrustStatus) -> TrustStatus {
        if a.rank() <= b.rank() {
            a
        } else {
            b
        }
    }

    /// The status a dependent inherits from a parent with this status.
    ///
    /// Returns `None` when propagation stops along the branch.
    pub fn degrade(self) -> Option<TrustStatus> {
        match self {
            TrustStatus::Revoked => Some(TrustStatus::Restricted),
            TrustStatus::Restricted => Some(TrustStatus::Degraded),
            _ => None,
        }
    }
}

/// Map a breach severity to the status applied to the violator.
///
/// `low` maps to `trusted`: the breach is recorded but does not degrade.
fn status_for_severity(severity: Severity) -> TrustStatus {
    match severity {
        Severity::Critical => TrustStatus::Revoked,
        Severity::High => TrustStatus::Restricted,
        Severity::Medium => TrustStatus::Degraded,
        Severity::Low => TrustStatus::Trusted,
    }
}

// ---------------------------------------------------------------------------
// Nodes, events, export
// ---------------------------------------------------------------------------

/// A node in the trust graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustNode {
    #[serde(rename = "identityHash")]
    pub identity_hash: String,
    pub status: TrustStatus,
    #[serde(rename = "breachCount")]
    pub breach_count: u32,
    #[serde(rename = "lastBreachAt", skip_serializing_if = "Option::is_none")]
    pub last_breach_at: Option<String>,
    pub dependents: Vec<String>,
    pub dependencies: Vec<String>,
}

impl TrustNode {
    fn new(identity_hash: &str) -> Self {
        TrustNode {
            identity_hash: identity_hash.to_string(),
            status: TrustStatus::Trusted,
            breach_count: 0,
            last_breach_at: None,
            dependents: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

/// A status change recorded during breach propagation.
#[derive(Debug, Clone)]
pub struct BreachEvent {
    pub identity_hash: String,
    pub previous_status: TrustStatus,
    pub new_status: TrustStatus,
    pub depth: usize,
    pub attestation_id: String,
}

/// A directed dependency edge (`from` depends on nothing here; `to` depends
/// on `from`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Snapshot of the graph's nodes and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<TrustNode>,
    pub edges: Vec<GraphEdge>,
}

/// Handle returned by `on_breach`, used to unsubscribe.
pub type ListenerId = u64;

type BreachListener = Box<dyn Fn(&BreachEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// Breach attestations
// ---------------------------------------------------------------------------

/// A signed report that a covenant constraint was violated.
///
/// Content-addressed and signed like a covenant document: the id is the
/// SHA-256 of the canonical form without `id`/`reporterSignature`, and the
/// reporter signs the canonical form with `id` included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachAttestation {
    pub id: String,
    pub covenant_id: String,
    pub violator_identity_hash: String,
    pub violated_constraint: String,
    pub severity: Severity,
    pub action: String,
    pub resource: String,
    pub evidence_hash: String,
    pub recommended_action: String,
    pub reporter_public_key: String,
    pub reporter_signature: String,
    pub reported_at: String,
    pub affected_covenants: Vec<String>,
}

/// Inputs for building a breach attestation.
pub struct BreachReport {
    pub covenant_id: String,
    pub violator_identity_hash: String,
    pub violated_constraint: String,
    pub severity: Severity,
    pub action: String,
    pub resource: String,
    /// Raw evidence; only its SHA-256 is embedded in the attestation.
    pub evidence: String,
    pub recommended_action: String,
    pub affected_covenants: Vec<String>,
}

fn attestation_form(att: &BreachAttestation, include_id: bool) -> Result<String, PactumError> {
    let val = serde_json::to_value(att).map_err(|e| {
        PactumError::Serialization(format!("Failed to convert to JSON value: {}", e))
    })?;
    let mut obj = match val {
        serde_json::Value::Object(m) => m,
        _ => return Err(PactumError::Serialization("Expected object".to_string())),
    };
    if !include_id {
        obj.remove("id");
    }
    obj.remove("reporterSignature");
    Ok(crypto::canonicalize_json(&serde_json::Value::Object(obj)))
}

/// Build and sign a breach attestation.
///
/// # Errors
/// `PactumError::Validation` on missing covenant/violator references.
pub fn build_breach_attestation(
    report: BreachReport,
    reporter: &crypto::KeyPair,
) -> Result<BreachAttestation, PactumError> {
    if report.covenant_id.is_empty() {
        return Err(PactumError::Validation("covenantId is required".to_string()));
    }
    if report.violator_identity_hash.is_empty() {
        return Err(PactumError::Validation(
            "violatorIdentityHash is required".to_string(),
        ));
    }
    if report.violated_constraint.is_empty() {
        return Err(PactumError::Validation(
            "violatedConstraint is required".to_string(),
        ));
    }

    let mut att = BreachAttestation {
        id: String::new(),
        covenant_id: report.covenant_id,
        violator_identity_hash: report.violator_identity_hash,
        violated_constraint: report.violated_constraint,
        severity: report.severity,
        action: report.action,
        resource: report.resource,
        evidence_hash: crypto::sha256_string(&report.evidence),
        recommended_action: report.recommended_action,
        reporter_public_key: reporter.public_key_hex.clone(),
        reporter_signature: String::new(),
        reported_at: crypto::timestamp(),
        affected_covenants: report.affected_covenants,
    };

    att.id = crypto::sha256_string(&attestation_form(&att, false)?);
    let message = attestation_form(&att, true)?;
    let sig = crypto::sign(message.as_bytes(), &reporter.signing_key)?;
    att.reporter_signature = hex::encode(&sig);

    Ok(att)
}

/// Verify a breach attestation's integrity and signature.
///
/// Never fails; malformed input surfaces as failed checks.
pub fn verify_breach_attestation(att: &BreachAttestation) -> VerificationResult {
    let mut checks: Vec<VerificationCheck> = Vec::new();

    let mut schema_problems: Vec<&str> = Vec::new();
    if att.covenant_id.is_empty() {
        schema_problems.push("covenantId is required");
    }
    if att.violator_identity_hash.is_empty() {
        schema_problems.push("violatorIdentityHash is required");
    }
    if att.reporter_public_key.len() != 64
        || !att.reporter_public_key.chars().all(|c| c.is_ascii_hexdigit())
    {
        schema_problems.push("reporterPublicKey must be a 64-char hex string");
    }
    if crypto::parse_timestamp(&att.reported_at).is_none() {
        schema_problems.push("reportedAt must be a valid timestamp");
    }
    checks.push(VerificationCheck {
        name: "schema".to_string(),
        passed: schema_problems.is_empty(),
        message: if schema_problems.is_empty() {
            "All required fields present".to_string()
        } else {
            schema_problems.join("; ")
        },
    });

    let id_ok = attestation_form(att, false)
        .map(|form| crypto::sha256_string(&form) == att.id)
        .unwrap_or(false);
    checks.push(VerificationCheck {
        name: "id_match".to_string(),
        passed: id_ok,
        message: if id_ok {
            "Attestation ID matches canonical hash".to_string()
        } else {
            "Attestation ID does not match canonical hash".to_string()
        },
    });

    let sig_ok = attestation_form(att, true)
        .map(|message| {
            crypto::verify_hex(
                message.as_bytes(),
                &att.reporter_signature,
                &att.reporter_public_key,
            )
        })
        .unwrap_or(false);
    checks.push(VerificationCheck {
        name: "signature".to_string(),
        passed: sig_ok,
        message: if sig_ok {
            "Reporter signature is valid".to_string()
        } else {
            "Reporter signature verification failed".to_string()
        },
    });

    let valid = checks.iter().all(|c| c.passed);
    VerificationResult { valid, checks }
}

// ---------------------------------------------------------------------------
// Trust graph
// ---------------------------------------------------------------------------

struct Listeners {
    entries: Vec<(ListenerId, BreachListener)>,
    next_id: ListenerId,
}

/// The trust graph: identity nodes, dependency edges, and breach fanout.
pub struct TrustGraph {
    // Serializes whole propagations (node updates + listener dispatch)
    propagation: Mutex<()>,
    nodes: Mutex<HashMap<String, TrustNode>>,
    listeners: Mutex<Listeners>,
}

impl Default for TrustGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustGraph {
    pub fn new() -> Self {
        TrustGraph {
            propagation: Mutex::new(()),
            nodes: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Listeners {
                entries: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Record that `child` depends on `parent`.
    ///
    /// Both nodes are created as `trusted` if absent. Duplicate edges are
    /// ignored.
    pub fn register_dependency(&self, parent: &str, child: &str) {
        let _guard = self.propagation.lock();
        let mut nodes = self.nodes.lock();
        nodes
            .entry(parent.to_string())
            .or_insert_with(|| TrustNode::new(parent));
        nodes
            .entry(child.to_string())
            .or_insert_with(|| TrustNode::new(child));

        let parent_node = nodes.get_mut(parent).expect("parent node just ensured");
        if !parent_node.dependents.iter().any(|d| d == child) {
            parent_node.dependents.push(child.to_string());
        }
        let child_node = nodes.get_mut(child).expect("child node just ensured");
        if !child_node.dependencies.iter().any(|d| d == parent) {
            child_node.dependencies.push(parent.to_string());
        }
    }

    /// Current status of an identity; `Unknown` if absent from the graph.
    pub fn get_status(&self, identity_hash: &str) -> TrustStatus {
        self.nodes
            .lock()
            .get(identity_hash)
            .map(|n| n.status)
            .unwrap_or(TrustStatus::Unknown)
    }

    pub fn is_trusted(&self, identity_hash: &str) -> bool {
        self.get_status(identity_hash) == TrustStatus::Trusted
    }

    /// All transitive dependents of an identity, in BFS order.
    pub fn get_dependents(&self, identity_hash: &str) -> Vec<String> {
        let nodes = self.nodes.lock();
        let mut result: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(identity_hash.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();

        if let Some(node) = nodes.get(identity_hash) {
            for dep in &node.dependents {
                queue.push_back(dep.clone());
            }
        }
        while let Some(hash) = queue.pop_front() {
            if !visited.insert(hash.clone()) {
                continue;
            }
            if let Some(node) = nodes.get(&hash) {
                for dep in &node.dependents {
                    queue.push_back(dep.clone());
                }
            }
            result.push(hash);
        }
        result
    }

    /// Direct dependencies of an identity.
    pub fn get_dependencies(&self, identity_hash: &str) -> Vec<String> {
        self.nodes
            .lock()
            .get(identity_hash)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default()
    }

    /// Defensive copy of a node, if present.
    pub fn get_node(&self, identity_hash: &str) -> Option<TrustNode> {
        self.nodes.lock().get(identity_hash).cloned()
    }

    /// Force an identity's status (administrative override). Creates the
    /// node if absent.
    pub fn reset_status(&self, identity_hash: &str, status: TrustStatus) {
        let _guard = self.propagation.lock();
        let mut nodes = self.nodes.lock();
        let node = nodes
            .entry(identity_hash.to_string())
            .or_insert_with(|| TrustNode::new(identity_hash));
        node.status = status;
    }

    /// Subscribe to breach events; returns a handle for `off_breach`.
    pub fn on_breach(&self, listener: BreachListener) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    }

    /// Unsubscribe a breach listener. Returns `true` if it was registered.
    pub fn off_breach(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(lid, _)| *lid != id);
        listeners.entries.len() != before
    }

    /// Snapshot all nodes and dependency edges.
    pub fn export(&self) -> GraphExport {
        let nodes_guard = self.nodes.lock();
        let mut nodes: Vec<TrustNode> = nodes_guard.values().cloned().collect();
        nodes.sort_by(|a, b| a.identity_hash.cmp(&b.identity_hash));
        let mut edges: Vec<GraphEdge> = Vec::new();
        for node in &nodes {
            for dependent in &node.dependents {
                edges.push(GraphEdge {
                    from: node.identity_hash.clone(),
                    to: dependent.clone(),
                });
            }
        }
        GraphExport { nodes, edges }
    }

    /// Process a breach attestation: degrade the violator and propagate
    /// weakened degradations through its dependents, breadth-first.
    ///
    /// Returns the emitted events in BFS order (depth-0 first). Listeners
    /// are notified after all node updates are committed.
    ///
    /// # Errors
    /// `PactumError::InvalidBreachAttestation` if the attestation fails
    /// verification; the graph is not mutated in that case.
    pub fn process_breach(
        &self,
        att: &BreachAttestation,
    ) -> Result<Vec<BreachEvent>, PactumError> {
        let verification = verify_breach_attestation(att);
        if !verification.valid {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.name.as_str())
                .collect();
            return Err(PactumError::InvalidBreachAttestation(format!(
                "failed checks: {}",
                failed.join(", ")
            )));
        }

        let _guard = self.propagation.lock();
        let mut events: Vec<BreachEvent> = Vec::new();

        {
            let mut nodes = self.nodes.lock();

            // Depth 0: the violator itself
            let violator = nodes
                .entry(att.violator_identity_hash.clone())
                .or_insert_with(|| TrustNode::new(&att.violator_identity_hash));
            let applied = status_for_severity(att.severity);
            let previous = violator.status;
            violator.status = TrustStatus::worse_of(previous, applied);
            violator.breach_count += 1;
            violator.last_breach_at = Some(att.reported_at.clone());
            let violator_status = violator.status;
            events.push(BreachEvent {
                identity_hash: att.violator_identity_hash.clone(),
                previous_status: previous,
                new_status: violator_status,
                depth: 0,
                attestation_id: att.id.clone(),
            });

            warn!(
                violator = %att.violator_identity_hash,
                severity = %att.severity.as_str(),
                status = ?violator_status,
                "processing breach attestation"
            );

            // BFS over dependents; a branch halts once the inherited status
            // would fall below degraded
            let mut visited: HashSet<String> = HashSet::new();
            visited.insert(att.violator_identity_hash.clone());
            let mut queue: VecDeque<(String, TrustStatus, usize)> = VecDeque::new();
            let initial_dependents = nodes
                .get(&att.violator_identity_hash)
                .map(|n| n.dependents.clone())
                .unwrap_or_default();
            for dep in initial_dependents {
                queue.push_back((dep, violator_status, 1));
            }

            while let Some((hash, parent_applied, depth)) = queue.pop_front() {
                if !visited.insert(hash.clone()) {
                    continue;
                }
                let degraded = match parent_applied.degrade() {
                    Some(s) => s,
                    None => continue,
                };
                let node = nodes
                    .entry(hash.clone())
                    .or_insert_with(|| TrustNode::new(&hash));
                let previous = node.status;
                node.status = TrustStatus::worse_of(previous, degraded);
                let new_status = node.status;
                events.push(BreachEvent {
                    identity_hash: hash.clone(),
                    previous_status: previous,
                    new_status,
                    depth,
                    attestation_id: att.id.clone(),
                });
                let dependents = node.dependents.clone();
                for dep in dependents {
                    queue.push_back((dep, new_status, depth + 1));
                }
            }
        }

        debug!(events = events.len(), "breach propagation complete");

        // Node updates are committed; fan events out in BFS order
        let listeners = self.listeners.lock();
        for event in &events {
            for (_, listener) in listeners.entries.iter() {
                listener(event);
            }
        }

        Ok(events)
    }
}
