//! Agent identity creation, evolution, and verification.
//!
//! An agent identity is a content-addressed, signed document describing an AI
//! agent's operator, model, capabilities, and deployment context. Identities
//! evolve through a hash-linked lineage chain, where each evolution is signed
//! and records the type of change made.
//!
//! Operator transfer is a two-step handoff: the evolution that changes the
//! operator key is signed by the *previous* operator while recording the new
//! public key, so signature verification against the recorded key fails
//! until the new operator signs the next evolution. The lineage entry is the
//! durable record of the transfer; it is never silently re-signed.

use crate::crypto;
use crate::PactumError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Attestation about the AI model powering an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    #[serde(rename = "modelId")]
    pub model_id: String,
}

/// Describes where and how an agent is deployed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub runtime: String,
}

/// The kind of change an evolution applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    ModelChange,
    CapabilityChange,
    DeploymentChange,
    OperatorTransfer,
}

/// A single entry in an agent's lineage chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEntry {
    #[serde(rename = "identityHash")]
    pub identity_hash: String,
    #[serde(rename = "parentHash")]
    pub parent_hash: Option<String>,
    #[serde(rename = "changeType")]
    pub change_type: ChangeType,
    pub description: String,
    pub timestamp: String,
}

/// A complete, signed AI agent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    #[serde(rename = "operatorPublicKey")]
    pub operator_public_key: String,
    pub model: ModelInfo,
    pub capabilities: Vec<String>,
    pub deployment: DeploymentInfo,
    pub version: u32,
    pub lineage: Vec<LineageEntry>,
    pub signature: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Options for creating a new agent identity.
pub struct CreateIdentityOptions {
    pub signing_key: ed25519_dalek::SigningKey,
    pub public_key_hex: String,
    pub model: ModelInfo,
    pub capabilities: Vec<String>,
    pub deployment: DeploymentInfo,
}

/// Options for evolving an existing identity.
pub struct EvolveIdentityOptions {
    /// The current operator's signing key. For `OperatorTransfer` this is
    /// still the old operator's key; see the module docs.
    pub signing_key: ed25519_dalek::SigningKey,
    pub change_type: ChangeType,
    pub description: String,
    pub model: Option<ModelInfo>,
    pub capabilities: Option<Vec<String>>,
    pub deployment: Option<DeploymentInfo>,
    /// New operator public key; only valid with `ChangeType::OperatorTransfer`.
    pub operator_public_key: Option<String>,
}

/// A single verification check for identity verification.
#[derive(Debug)]
pub struct IdentityCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Result of verifying an agent identity.
#[derive(Debug)]
pub struct IdentityVerificationResult {
    pub valid: bool,
    pub checks: Vec<IdentityCheck>,
}

impl IdentityVerificationResult {
    pub fn check(&self, name: &str) -> Option<&IdentityCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

// ---------------------------------------------------------------------------
// Hash computation
// ---------------------------------------------------------------------------

/// Compute the composite identity hash from all identity-defining fields.
pub fn compute_identity_hash(body: &serde_json::Value) -> String {
    crypto::sha256_string(&crypto::canonicalize_json(body))
}

/// Build the JSON body used for hashing/signing (excludes `id` and `signature`).
fn identity_body(identity: &AgentIdentity) -> Result<serde_json::Value, PactumError> {
    let val = serde_json::to_value(identity).map_err(|e| {
        PactumError::Serialization(format!("Failed to serialize identity: {}", e))
    })?;

    let mut obj = match val {
        serde_json::Value::Object(m) => m,
        _ => return Err(PactumError::Serialization("Expected object".to_string())),
    };

    obj.remove("id");
    obj.remove("signature");

    Ok(serde_json::Value::Object(obj))
}

// ---------------------------------------------------------------------------
// Create identity
// ---------------------------------------------------------------------------

/// Create a brand-new agent identity.
///
/// Computes the composite identity hash, initializes a single lineage entry
/// of type `created` with no parent, and signs the whole identity with the
/// operator key. Capabilities are stored sorted.
///
/// # Errors
/// Returns `PactumError::Validation` for missing fields.
pub fn create_identity(opts: CreateIdentityOptions) -> Result<AgentIdentity, PactumError> {
    if opts.public_key_hex.is_empty() {
        return Err(PactumError::Validation(
            "operatorPublicKey is required".to_string(),
        ));
    }
    if opts.model.provider.is_empty() || opts.model.model_id.is_empty() {
        return Err(PactumError::Validation(
            "model.provider and model.modelId are required".to_string(),
        ));
    }
    if opts.capabilities.is_empty() {
        return Err(PactumError::Validation(
            "capabilities array must not be empty".to_string(),
        ));
    }
    if opts.deployment.runtime.is_empty() {
        return Err(PactumError::Validation(
            "deployment.runtime is required".to_string(),
        ));
    }

    let now = crypto::timestamp();
    let mut capabilities = opts.capabilities.clone();
    capabilities.sort();

    let mut identity = AgentIdentity {
        id: String::new(),
        operator_public_key: opts.public_key_hex.clone(),
        model: opts.model,
        capabilities,
        deployment: opts.deployment,
        version: 1,
        lineage: Vec::new(),
        signature: String::new(),
        created_at: now.clone(),
    };

    // Hash the pre-lineage body for the first lineage entry
    let identity_hash = compute_identity_hash(&identity_body(&identity)?);

    identity.lineage = vec![LineageEntry {
        identity_hash,
        parent_hash: None,
        change_type: ChangeType::Created,
        description: "Identity created".to_string(),
        timestamp: now,
    }];

    // The document id covers the lineage as well
    identity.id = compute_identity_hash(&identity_body(&identity)?);

    let signing_payload = crypto::canonicalize_json(&identity_body(&identity)?);
    let sig_bytes = crypto::sign(signing_payload.as_bytes(), &opts.signing_key)?;
    identity.signature = hex::encode(&sig_bytes);

    Ok(identity)
}

// ---------------------------------------------------------------------------
// Evolve identity
// ---------------------------------------------------------------------------

/// Evolve an existing agent identity by applying updates.
///
/// Creates the next version of the identity with the specified changes,
/// appends a lineage entry whose `parentHash` links to the previous entry,
/// and re-signs everything with the supplied key.
///
/// # Errors
/// Returns `PactumError::Validation` for an empty description or for an
/// operator key change outside an `OperatorTransfer` evolution.
pub fn evolve_identity(
    identity: &AgentIdentity,
    opts: EvolveIdentityOptions,
) -> Result<AgentIdentity, PactumError> {
    if opts.description.is_empty() {
        return Err(PactumError::Validation(
            "description is required for evolution".to_string(),
        ));
    }
    if opts.operator_public_key.is_some() && opts.change_type != ChangeType::OperatorTransfer {
        return Err(PactumError::Validation(
            "operatorPublicKey may only change in an operator_transfer evolution".to_string(),
        ));
    }

    let now = crypto::timestamp();

    let model = opts.model.unwrap_or_else(|| identity.model.clone());
    let mut capabilities = opts
        .capabilities
        .unwrap_or_else(|| identity.capabilities.clone());
    capabilities.sort();
    let deployment = opts
        .deployment
        .unwrap_or_else(|| identity.deployment.clone());
    let operator_public_key = opts
        .operator_public_key
        .unwrap_or_else(|| identity.operator_public_key.clone());

    let mut evolved = AgentIdentity {
        id: String::new(),
        operator_public_key,
        model,
        capabilities,
        deployment,
        version: identity.version + 1,
        lineage: identity.lineage.clone(),
        signature: String::new(),
        created_at: identity.created_at.clone(),
    };

    let new_hash = compute_identity_hash(&identity_body(&evolved)?);
    let parent_hash = identity.lineage.last().map(|e| e.identity_hash.clone());

    evolved.lineage.push(LineageEntry {
        identity_hash: new_hash,
        parent_hash,
        change_type: opts.change_type,
        description: opts.description,
        timestamp: now,
    });

    evolved.id = compute_identity_hash(&identity_body(&evolved)?);

    let signing_payload = crypto::canonicalize_json(&identity_body(&evolved)?);
    let sig_bytes = crypto::sign(signing_payload.as_bytes(), &opts.signing_key)?;
    evolved.signature = hex::encode(&sig_bytes);

    Ok(evolved)
}

// ---------------------------------------------------------------------------
// Verify identity
// ---------------------------------------------------------------------------

/// Verify an agent identity's integrity and signature.
///
/// Checks:
/// 1. `id_match` -- ID matches the hash of the identity body
/// 2. `signature_valid` -- signature verifies against the recorded operator key
/// 3. `lineage_chain` -- first entry has no parent; later entries link by hash
/// 4. `version_match` -- version equals lineage length
/// 5. `capabilities_sorted` -- capabilities are in lexicographic order
///
/// Never fails; malformed input surfaces as failed checks.
pub fn verify_identity(identity: &AgentIdentity) -> IdentityVerificationResult {
    let mut checks: Vec<IdentityCheck> = Vec::new();

    // 1. ID match
    let body = identity_body(identity).ok();
    let expected_id = body.as_ref().map(compute_identity_hash);
    let id_ok = expected_id.as_deref() == Some(identity.id.as_str());
    checks.push(IdentityCheck {
        name: "id_match".to_string(),
        passed: id_ok,
        message: if id_ok {
            "Identity ID matches hash".to_string()
        } else {
            format!(
                "ID mismatch: expected {}, got {}",
                expected_id.unwrap_or_default(),
                identity.id
            )
        },
    });

    // 2. Signature valid
    let sig_valid = body
        .as_ref()
        .map(|b| {
            let payload = crypto::canonicalize_json(b);
            crypto::verify_hex(
                payload.as_bytes(),
                &identity.signature,
                &identity.operator_public_key,
            )
        })
        .unwrap_or(false);
    checks.push(IdentityCheck {
        name: "signature_valid".to_string(),
        passed: sig_valid,
        message: if sig_valid {
            "Operator signature is valid".to_string()
        } else {
            "Operator signature verification failed".to_string()
        },
    });

    // 3. Lineage chain
    let mut lineage_valid = true;
    let mut lineage_msg = "Lineage chain is valid".to_string();
    if identity.lineage.is_empty() {
        lineage_valid = false;
        lineage_msg = "Lineage must contain at least one entry".to_string();
    } else if identity.lineage[0].parent_hash.is_some() {
        lineage_valid = false;
        lineage_msg = "First lineage entry must have no parent hash".to_string();
    } else {
        for i in 1..identity.lineage.len() {
            let expected_parent = &identity.lineage[i - 1].identity_hash;
            match &identity.lineage[i].parent_hash {
                Some(parent) if parent == expected_parent => {}
                Some(parent) => {
                    lineage_valid = false;
                    lineage_msg = format!(
                        "Lineage break at entry {}: expected parent {}, got {}",
                        i, expected_parent, parent
                    );
                    break;
                }
                None => {
                    lineage_valid = false;
                    lineage_msg = format!("Lineage entry {} has no parent hash", i);
                    break;
                }
            }
        }
    }
    checks.push(IdentityCheck {
        name: "lineage_chain".to_string(),
        passed: lineage_valid,
        message: lineage_msg,
    });

    // 4. Version match
    let version_match = identity.version as usize == identity.lineage.len();
    checks.push(IdentityCheck {
        name: "version_match".to_string(),
        passed: version_match,
        message: if version_match {
            format!("Version {} matches lineage length", identity.version)
        } else {
            format!(
                "Version {} does not match lineage length {}",
                identity.version,
                identity.lineage.len()
            )
        },
    });

    // 5. Capabilities sorted
    let sorted = identity.capabilities.windows(2).all(|w| w[0] <= w[1]);
    checks.push(IdentityCheck {
        name: "capabilities_sorted".to_string(),
        passed: sorted,
        message: if sorted {
            "Capabilities are sorted".to_string()
        } else {
            "Capabilities must be sorted lexicographically".to_string()
        },
    });

    let valid = checks.iter().all(|c| c.passed);
    IdentityVerificationResult { valid, checks }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize an AgentIdentity to a JSON string.
pub fn serialize_identity(identity: &AgentIdentity) -> Result<String, PactumError> {
    serde_json::to_string_pretty(identity)
        .map_err(|e| PactumError::Serialization(format!("Failed to serialize identity: {}", e)))
}

/// Deserialize a JSON string into an AgentIdentity.
pub fn deserialize_identity(json: &str) -> Result<AgentIdentity, PactumError> {
    serde_json::from_str(json)
        .map_err(|e| PactumError::Serialization(format!("Failed to deserialize identity: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_identity(kp: &crypto::KeyPair) -> AgentIdentity {
        create_identity(CreateIdentityOptions {
            signing_key: kp.signing_key.clone(),
            public_key_hex: kp.public_key_hex.clone(),
            model: ModelInfo {
                provider: "anthropic".to_string(),
                model_id: "claude-3".to_string(),
            },
            capabilities: vec!["write".to_string(), "read".to_string()],
            deployment: DeploymentInfo {
                runtime: "container".to_string(),
            },
        })
        .unwrap()
    }

    #[test]
    fn test_create_identity() {
        let kp = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&kp);

        assert!(!identity.id.is_empty());
        assert_eq!(identity.version, 1);
        assert_eq!(identity.lineage.len(), 1);
        assert_eq!(identity.lineage[0].change_type, ChangeType::Created);
        assert!(identity.lineage[0].parent_hash.is_none());
        // Capabilities are stored sorted
        assert_eq!(identity.capabilities, vec!["read", "write"]);
        assert!(verify_identity(&identity).valid);
    }

    #[test]
    fn test_evolve_identity_links_lineage() {
        let kp = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&kp);

        let evolved = evolve_identity(
            &identity,
            EvolveIdentityOptions {
                signing_key: kp.signing_key.clone(),
                change_type: ChangeType::CapabilityChange,
                description: "Added exec capability".to_string(),
                model: None,
                capabilities: Some(vec![
                    "read".to_string(),
                    "write".to_string(),
                    "exec".to_string(),
                ]),
                deployment: None,
                operator_public_key: None,
            },
        )
        .unwrap();

        assert_eq!(evolved.version, 2);
        assert_eq!(evolved.lineage.len(), 2);
        assert_ne!(identity.id, evolved.id);
        assert_eq!(
            evolved.lineage[1].parent_hash.as_deref(),
            Some(identity.lineage[0].identity_hash.as_str())
        );
        assert_eq!(evolved.capabilities, vec!["exec", "read", "write"]);
        assert!(verify_identity(&evolved).valid);
    }

    #[test]
    fn test_operator_transfer_two_step_handoff() {
        let old_kp = crypto::generate_key_pair().unwrap();
        let new_kp = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&old_kp);

        // Step 1: old operator signs the transfer recording the new key
        let transferred = evolve_identity(
            &identity,
            EvolveIdentityOptions {
                signing_key: old_kp.signing_key.clone(),
                change_type: ChangeType::OperatorTransfer,
                description: "Handed over to new operator".to_string(),
                model: None,
                capabilities: None,
                deployment: None,
                operator_public_key: Some(new_kp.public_key_hex.clone()),
            },
        )
        .unwrap();

        assert_eq!(transferred.operator_public_key, new_kp.public_key_hex);
        assert_eq!(
            transferred.lineage.last().unwrap().change_type,
            ChangeType::OperatorTransfer
        );
        // Signed by the old key but recording the new one: the signature
        // check fails until the new operator signs the next evolution
        let result = verify_identity(&transferred);
        assert!(!result.check("signature_valid").unwrap().passed);
        assert!(result.check("lineage_chain").unwrap().passed);

        // Step 2: the new operator signs a follow-up evolution
        let settled = evolve_identity(
            &transferred,
            EvolveIdentityOptions {
                signing_key: new_kp.signing_key.clone(),
                change_type: ChangeType::DeploymentChange,
                description: "New operator deployment".to_string(),
                model: None,
                capabilities: None,
                deployment: Some(DeploymentInfo {
                    runtime: "serverless".to_string(),
                }),
                operator_public_key: None,
            },
        )
        .unwrap();
        assert!(verify_identity(&settled).valid);
    }

    #[test]
    fn test_operator_key_change_requires_transfer_type() {
        let kp = crypto::generate_key_pair().unwrap();
        let other = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&kp);
        let err = evolve_identity(
            &identity,
            EvolveIdentityOptions {
                signing_key: kp.signing_key.clone(),
                change_type: ChangeType::ModelChange,
                description: "sneaky key swap".to_string(),
                model: None,
                capabilities: None,
                deployment: None,
                operator_public_key: Some(other.public_key_hex.clone()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PactumError::Validation(_)));
    }

    #[test]
    fn test_verify_detects_broken_lineage() {
        let kp = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&kp);
        let mut evolved = evolve_identity(
            &identity,
            EvolveIdentityOptions {
                signing_key: kp.signing_key.clone(),
                change_type: ChangeType::ModelChange,
                description: "model bump".to_string(),
                model: Some(ModelInfo {
                    provider: "anthropic".to_string(),
                    model_id: "claude-4".to_string(),
                }),
                capabilities: None,
                deployment: None,
                operator_public_key: None,
            },
        )
        .unwrap();

        evolved.lineage[1].parent_hash = Some("f".repeat(64));
        let result = verify_identity(&evolved);
        assert!(!result.check("lineage_chain").unwrap().passed);
    }

    #[test]
    fn test_verify_detects_unsorted_capabilities() {
        let kp = crypto::generate_key_pair().unwrap();
        let mut identity = create_test_identity(&kp);
        identity.capabilities = vec!["write".to_string(), "read".to_string()];
        let result = verify_identity(&identity);
        assert!(!result.check("capabilities_sorted").unwrap().passed);
    }

    #[test]
    fn test_verify_detects_version_mismatch() {
        let kp = crypto::generate_key_pair().unwrap();
        let mut identity = create_test_identity(&kp);
        identity.version = 3;
        let result = verify_identity(&identity);
        assert!(!result.check("version_match").unwrap().passed);
    }

    #[test]
    fn test_serialize_deserialize_identity() {
        let kp = crypto::generate_key_pair().unwrap();
        let identity = create_test_identity(&kp);
        let json = serialize_identity(&identity).unwrap();
        let restored = deserialize_identity(&json).unwrap();
        assert_eq!(identity.id, restored.id);
        assert_eq!(identity.signature, restored.signature);
        assert!(verify_identity(&restored).valid);
    }
}
