//! Covenant document building, verification, countersigning, and re-signing.
//!
//! A covenant is a cryptographically signed agreement between an issuer and
//! a beneficiary, encoding CCL constraints that govern agent behavior.
//! Covenants can be chained (delegated) to form trust hierarchies where
//! child covenants can only narrow (restrict) their parent's constraints.
//!
//! The document `id` is the SHA-256 of the canonical form without
//! `id`/`signature`/`countersignatures`; the issuer's signature covers the
//! canonical form with `id` included (signature and countersignatures always
//! excluded). Countersignatures therefore never change the id.

use crate::ccl;
use crate::crypto;
use crate::PactumError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current Pactum Covenant protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Protocol versions this implementation accepts during verification.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Maximum number of CCL constraint statements in a single covenant.
pub const MAX_CONSTRAINTS: usize = 256;

/// Maximum depth of a covenant chain (number of ancestors).
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Maximum serialized document size in bytes (1 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 1_048_576;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A participant in a covenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub role: String,
}

/// How a child covenant relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainRelation {
    Delegates,
    Restricts,
    Extends,
}

/// Reference to a parent covenant in a delegation chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReference {
    #[serde(rename = "parentId")]
    pub parent_id: String,
    pub relation: ChainRelation,
    pub depth: usize,
}

/// A covenant-level obligation the beneficiary commits to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    #[serde(rename = "type")]
    pub obligation_type: String,
    pub description: String,
}

/// A countersignature added by a third party (auditor, regulator, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countersignature {
    #[serde(rename = "signerPublicKey")]
    pub signer_public_key: String,
    #[serde(rename = "signerRole")]
    pub signer_role: String,
    pub signature: String,
    pub timestamp: String,
}

/// A complete, signed Covenant document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantDocument {
    pub id: String,
    pub version: String,
    pub issuer: Party,
    pub beneficiary: Party,
    pub constraints: String,
    pub nonce: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligations: Option<Vec<Obligation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "expiresAt")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "activatesAt")]
    pub activates_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countersignatures: Option<Vec<Countersignature>>,
}

/// A single verification check and its result.
#[derive(Debug, Clone)]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Complete result of verifying a covenant document.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub valid: bool,
    pub checks: Vec<VerificationCheck>,
}

impl VerificationResult {
    /// Look up a check by name.
    pub fn check(&self, name: &str) -> Option<&VerificationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

// ---------------------------------------------------------------------------
// Canonical form and ID computation
// ---------------------------------------------------------------------------

fn projected_form(
    doc: &CovenantDocument,
    include_id: bool,
) -> Result<String, PactumError> {
    let val = serde_json::to_value(doc).map_err(|e| {
        PactumError::Serialization(format!("Failed to convert to JSON value: {}", e))
    })?;

    let mut obj = match val {
        serde_json::Value::Object(m) => m,
        _ => return Err(PactumError::Serialization("Expected object".to_string())),
    };

    if !include_id {
        obj.remove("id");
    }
    obj.remove("signature");
    obj.remove("countersignatures");

    Ok(crypto::canonicalize_json(&serde_json::Value::Object(obj)))
}

/// Compute the canonical form of a covenant document for hashing.
///
/// Strips `id`, `signature`, and `countersignatures`, then produces
/// deterministic JSON with sorted keys.
pub fn canonical_form(doc: &CovenantDocument) -> Result<String, PactumError> {
    projected_form(doc, false)
}

/// Compute the message the issuer (and any countersigner) signs: the
/// canonical form with `id` included and signatures excluded.
pub fn signing_form(doc: &CovenantDocument) -> Result<String, PactumError> {
    projected_form(doc, true)
}

/// Compute the SHA-256 document ID from its canonical form.
pub fn compute_id(doc: &CovenantDocument) -> Result<String, PactumError> {
    Ok(crypto::sha256_string(&canonical_form(doc)?))
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Builder for new covenant documents.
///
/// Collects the document content, validates every invariant, and produces a
/// signed, content-addressed document on [`CovenantBuilder::sign`].
///
/// # Example
/// ```no_run
/// use pactum::covenant::{CovenantBuilder, Party};
/// use pactum::crypto;
///
/// let kp = crypto::generate_key_pair().unwrap();
/// let bene = crypto::generate_key_pair().unwrap();
/// let doc = CovenantBuilder::new()
///     .issuer(Party { id: "org".into(), public_key: kp.public_key_hex.clone(), role: "issuer".into() })
///     .beneficiary(Party { id: "agent".into(), public_key: bene.public_key_hex.clone(), role: "beneficiary".into() })
///     .constraints("permit read on '/data/**'")
///     .sign(&kp.signing_key)
///     .unwrap();
/// ```
#[derive(Default)]
pub struct CovenantBuilder {
    issuer: Option<Party>,
    beneficiary: Option<Party>,
    constraints: String,
    obligations: Option<Vec<Obligation>>,
    chain: Option<ChainReference>,
    enforcement: Option<serde_json::Value>,
    proof: Option<serde_json::Value>,
    revocation: Option<serde_json::Value>,
    metadata: Option<serde_json::Value>,
    expires_at: Option<String>,
    activates_at: Option<String>,
    now: Option<DateTime<Utc>>,
}

impl CovenantBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issuer(mut self, party: Party) -> Self {
        self.issuer = Some(party);
        self
    }

    pub fn beneficiary(mut self, party: Party) -> Self {
        self.beneficiary = Some(party);
        self
    }

    pub fn constraints(mut self, ccl_source: &str) -> Self {
        self.constraints = ccl_source.to_string();
        self
    }

    pub fn obligations(mut self, obligations: Vec<Obligation>) -> Self {
        self.obligations = Some(obligations);
        self
    }

    pub fn chain(mut self, chain: ChainReference) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn enforcement(mut self, config: serde_json::Value) -> Self {
        self.enforcement = Some(config);
        self
    }

    pub fn proof(mut self, config: serde_json::Value) -> Self {
        self.proof = Some(config);
        self
    }

    pub fn revocation(mut self, config: serde_json::Value) -> Self {
        self.revocation = Some(config);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn expires_at(mut self, at: &str) -> Self {
        self.expires_at = Some(at.to_string());
        self
    }

    pub fn activates_at(mut self, at: &str) -> Self {
        self.activates_at = Some(at.to_string());
        self
    }

    /// Pin the clock used for `createdAt` (primarily for tests).
    pub fn created_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Validate all invariants, then sign and content-address the document.
    ///
    /// # Errors
    /// `PactumError::Validation` for malformed parties, keys, or empty
    /// constraints; `PactumError::CclSyntax` for unparseable constraints;
    /// `PactumError::CovenantBuild` for chain or size invariant failures.
    pub fn sign(
        self,
        signing_key: &ed25519_dalek::SigningKey,
    ) -> Result<CovenantDocument, PactumError> {
        let issuer = self
            .issuer
            .ok_or_else(|| PactumError::Validation("issuer is required".to_string()))?;
        let beneficiary = self
            .beneficiary
            .ok_or_else(|| PactumError::Validation("beneficiary is required".to_string()))?;

        validate_party(&issuer, "issuer")?;
        validate_party(&beneficiary, "beneficiary")?;

        if self.constraints.trim().is_empty() {
            return Err(PactumError::Validation(
                "constraints is required".to_string(),
            ));
        }

        // Parse CCL to verify syntax and check constraint count
        let parsed_ccl = ccl::parse(&self.constraints)?;
        if parsed_ccl.statements.len() > MAX_CONSTRAINTS {
            return Err(PactumError::CovenantBuild(format!(
                "Constraints exceed maximum of {} statements (got {})",
                MAX_CONSTRAINTS,
                parsed_ccl.statements.len()
            )));
        }

        if let Some(ref chain) = self.chain {
            if chain.parent_id.is_empty() {
                return Err(PactumError::Validation(
                    "chain.parentId is required".to_string(),
                ));
            }
            if chain.depth < 1 || chain.depth > MAX_CHAIN_DEPTH {
                return Err(PactumError::CovenantBuild(format!(
                    "chain.depth must be between 1 and {} (got {})",
                    MAX_CHAIN_DEPTH, chain.depth
                )));
            }
        }

        let created = self.now.unwrap_or_else(Utc::now);
        let created_at = crypto::format_timestamp(created);

        if let Some(ref expires_at) = self.expires_at {
            let expires = crypto::parse_timestamp(expires_at).ok_or_else(|| {
                PactumError::Validation(format!("expiresAt is not a valid timestamp: {}", expires_at))
            })?;
            if expires <= created {
                return Err(PactumError::CovenantBuild(
                    "expiresAt must be after createdAt".to_string(),
                ));
            }
        }
        if let Some(ref activates_at) = self.activates_at {
            crypto::parse_timestamp(activates_at).ok_or_else(|| {
                PactumError::Validation(format!(
                    "activatesAt is not a valid timestamp: {}",
                    activates_at
                ))
            })?;
        }

        let mut doc = CovenantDocument {
            id: String::new(),
            version: PROTOCOL_VERSION.to_string(),
            issuer,
            beneficiary,
            constraints: self.constraints,
            nonce: hex::encode(crypto::generate_nonce()),
            created_at,
            signature: String::new(),
            obligations: self.obligations,
            chain: self.chain,
            enforcement: self.enforcement,
            proof: self.proof,
            revocation: self.revocation,
            metadata: self.metadata,
            expires_at: self.expires_at,
            activates_at: self.activates_at,
            countersignatures: None,
        };

        // Content-address first, then sign the id-bearing form
        doc.id = compute_id(&doc)?;
        let message = signing_form(&doc)?;
        let sig_bytes = crypto::sign(message.as_bytes(), signing_key)?;
        doc.signature = hex::encode(&sig_bytes);

        let serialized = serde_json::to_string(&doc)
            .map_err(|e| PactumError::Serialization(format!("Failed to serialize: {}", e)))?;
        if serialized.len() > MAX_DOCUMENT_SIZE {
            return Err(PactumError::CovenantBuild(format!(
                "Serialized document exceeds maximum size of {} bytes",
                MAX_DOCUMENT_SIZE
            )));
        }

        Ok(doc)
    }
}

fn validate_party(party: &Party, expected_role: &str) -> Result<(), PactumError> {
    if party.id.is_empty() {
        return Err(PactumError::Validation(format!(
            "{}.id is required",
            expected_role
        )));
    }
    if party.role != expected_role {
        return Err(PactumError::Validation(format!(
            "{}.role must be \"{}\"",
            expected_role, expected_role
        )));
    }
    let key_bytes = crypto::from_hex(&party.public_key).map_err(|_| {
        PactumError::Validation(format!(
            "{}.publicKey must be a hex string",
            expected_role
        ))
    })?;
    if key_bytes.len() != 32 {
        return Err(PactumError::Validation(format!(
            "{}.publicKey must be 32 bytes (64 hex chars), got {} bytes",
            expected_role,
            key_bytes.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

fn check(name: &str, passed: bool, ok_msg: String, fail_msg: String) -> VerificationCheck {
    VerificationCheck {
        name: name.to_string(),
        passed,
        message: if passed { ok_msg } else { fail_msg },
    }
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Verify a covenant document by running the 11 protocol checks.
///
/// Checks, in order: `schema`, `id_match`, `signature`, `issuer_role`,
/// `beneficiary_role`, `constraints_syntax`, `version_supported`,
/// `not_expired`, `activated`, `chain_depth`, `countersignatures`.
///
/// Never fails: malformed input surfaces as failed checks. `now` defaults to
/// the current clock and is used for the expiry/activation checks.
pub fn verify_covenant(doc: &CovenantDocument, now: Option<DateTime<Utc>>) -> VerificationResult {
    let now = now.unwrap_or_else(Utc::now);
    let mut checks: Vec<VerificationCheck> = Vec::new();

    // 1. schema: required fields present and well-typed
    let mut schema_problems: Vec<&str> = Vec::new();
    if !is_hex_of_len(&doc.id, 64) {
        schema_problems.push("id must be a 64-char hex string");
    }
    {
        let mut parts = doc.version.split('.');
        let major_ok = parts.next().is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        let minor_ok = parts.next().is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !(major_ok && minor_ok && parts.next().is_none()) {
            schema_problems.push("version must be in X.Y form");
        }
    }
    if doc.issuer.id.is_empty() {
        schema_problems.push("issuer.id is required");
    }
    if !is_hex_of_len(&doc.issuer.public_key, 64) {
        schema_problems.push("issuer.publicKey must be a 64-char hex string");
    }
    if doc.beneficiary.id.is_empty() {
        schema_problems.push("beneficiary.id is required");
    }
    if !is_hex_of_len(&doc.beneficiary.public_key, 64) {
        schema_problems.push("beneficiary.publicKey must be a 64-char hex string");
    }
    if doc.constraints.trim().is_empty() {
        schema_problems.push("constraints is required");
    }
    if !is_hex_of_len(&doc.nonce, 64) {
        schema_problems.push("nonce must be a 64-char hex string");
    }
    if crypto::parse_timestamp(&doc.created_at).is_none() {
        schema_problems.push("createdAt must be a valid timestamp");
    }
    if !is_hex_of_len(&doc.signature, 128) {
        schema_problems.push("signature must be a 128-char hex string");
    }
    checks.push(check(
        "schema",
        schema_problems.is_empty(),
        "All required fields present and well-typed".to_string(),
        schema_problems.join("; "),
    ));

    // 2. id_match
    match compute_id(doc) {
        Ok(expected_id) => checks.push(check(
            "id_match",
            doc.id == expected_id,
            "Document ID matches canonical hash".to_string(),
            format!("ID mismatch: expected {}, got {}", expected_id, doc.id),
        )),
        Err(e) => checks.push(check(
            "id_match",
            false,
            String::new(),
            format!("Could not compute canonical form: {}", e),
        )),
    }

    // 3. signature
    let sig_valid = signing_form(doc)
        .map(|message| crypto::verify_hex(message.as_bytes(), &doc.signature, &doc.issuer.public_key))
        .unwrap_or(false);
    checks.push(check(
        "signature",
        sig_valid,
        "Issuer signature is valid".to_string(),
        "Issuer signature verification failed".to_string(),
    ));

    // 4–5. roles
    checks.push(check(
        "issuer_role",
        doc.issuer.role == "issuer",
        "Issuer role is \"issuer\"".to_string(),
        format!("Issuer role must be \"issuer\", got \"{}\"", doc.issuer.role),
    ));
    checks.push(check(
        "beneficiary_role",
        doc.beneficiary.role == "beneficiary",
        "Beneficiary role is \"beneficiary\"".to_string(),
        format!(
            "Beneficiary role must be \"beneficiary\", got \"{}\"",
            doc.beneficiary.role
        ),
    ));

    // 6. constraints_syntax
    match ccl::parse(&doc.constraints) {
        Ok(parsed) => {
            let count_ok = parsed.statements.len() <= MAX_CONSTRAINTS;
            checks.push(check(
                "constraints_syntax",
                count_ok,
                format!(
                    "CCL parsed successfully ({} statement(s))",
                    parsed.statements.len()
                ),
                format!("Constraints exceed maximum of {} statements", MAX_CONSTRAINTS),
            ));
        }
        Err(e) => checks.push(check(
            "constraints_syntax",
            false,
            String::new(),
            format!("CCL parse error: {}", e),
        )),
    }

    // 7. version_supported
    checks.push(check(
        "version_supported",
        SUPPORTED_VERSIONS.contains(&doc.version.as_str()),
        format!("Version {} is supported", doc.version),
        format!(
            "Version {} is not supported (supported: {})",
            doc.version,
            SUPPORTED_VERSIONS.join(", ")
        ),
    ));

    // 8. not_expired
    match &doc.expires_at {
        None => checks.push(check(
            "not_expired",
            true,
            "No expiry set".to_string(),
            String::new(),
        )),
        Some(expires_at) => match crypto::parse_timestamp(expires_at) {
            Some(expires) => checks.push(check(
                "not_expired",
                now <= expires,
                "Document has not expired".to_string(),
                format!("Document expired at {}", expires_at),
            )),
            None => checks.push(check(
                "not_expired",
                false,
                String::new(),
                format!("expiresAt is not a valid timestamp: {}", expires_at),
            )),
        },
    }

    // 9. activated
    match &doc.activates_at {
        None => checks.push(check(
            "activated",
            true,
            "No activation time set".to_string(),
            String::new(),
        )),
        Some(activates_at) => match crypto::parse_timestamp(activates_at) {
            Some(activates) => checks.push(check(
                "activated",
                now >= activates,
                "Document is active".to_string(),
                format!("Document activates at {}", activates_at),
            )),
            None => checks.push(check(
                "activated",
                false,
                String::new(),
                format!("activatesAt is not a valid timestamp: {}", activates_at),
            )),
        },
    }

    // 10. chain_depth
    match &doc.chain {
        None => checks.push(check(
            "chain_depth",
            true,
            "No chain reference present".to_string(),
            String::new(),
        )),
        Some(chain) => checks.push(check(
            "chain_depth",
            chain.depth >= 1 && chain.depth <= MAX_CHAIN_DEPTH,
            format!("Chain depth {} is within limit", chain.depth),
            format!(
                "Chain depth {} is outside the range 1..={}",
                chain.depth, MAX_CHAIN_DEPTH
            ),
        )),
    }

    // 11. countersignatures
    let cosigs = doc.countersignatures.as_deref().unwrap_or(&[]);
    if cosigs.is_empty() {
        checks.push(check(
            "countersignatures",
            true,
            "No countersignatures present".to_string(),
            String::new(),
        ));
    } else {
        let message = signing_form(doc).unwrap_or_default();
        let mut failed_signers: Vec<String> = Vec::new();
        for cs in cosigs {
            let cs_valid = !cs.signer_public_key.is_empty()
                && !cs.signature.is_empty()
                && crypto::verify_hex(message.as_bytes(), &cs.signature, &cs.signer_public_key);
            if !cs_valid {
                let truncated = if cs.signer_public_key.len() > 16 {
                    format!("{}...", &cs.signer_public_key[..16])
                } else {
                    cs.signer_public_key.clone()
                };
                failed_signers.push(truncated);
            }
        }
        checks.push(check(
            "countersignatures",
            failed_signers.is_empty(),
            format!("All {} countersignature(s) are valid", cosigs.len()),
            format!(
                "Invalid countersignature(s) from: {}",
                failed_signers.join(", ")
            ),
        ));
    }

    let valid = checks.iter().all(|c| c.passed);
    if !valid {
        let failed: Vec<&str> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();
        debug!(covenant = %doc.id, failed = ?failed, "covenant verification failed");
    }

    VerificationResult { valid, checks }
}

// ---------------------------------------------------------------------------
// Countersign / Re-sign
// ---------------------------------------------------------------------------

/// Add a countersignature to a covenant document.
///
/// The countersigner signs the same message the issuer signed (the canonical
/// form including `id`), so countersignatures are independent of each other
/// and the document id is unchanged. Returns a new document; the original is
/// not mutated.
pub fn countersign_covenant(
    doc: &CovenantDocument,
    kp: &crypto::KeyPair,
    role: &str,
) -> Result<CovenantDocument, PactumError> {
    let message = signing_form(doc)?;
    let sig_bytes = crypto::sign(message.as_bytes(), &kp.signing_key)?;

    let countersig = Countersignature {
        signer_public_key: kp.public_key_hex.clone(),
        signer_role: role.to_string(),
        signature: hex::encode(&sig_bytes),
        timestamp: crypto::timestamp(),
    };

    let mut new_doc = doc.clone();
    let mut existing = new_doc.countersignatures.unwrap_or_default();
    existing.push(countersig);
    new_doc.countersignatures = Some(existing);

    Ok(new_doc)
}

/// Re-sign a covenant with a (possibly rotated) issuer key.
///
/// Generates a fresh nonce, updates the recorded issuer key to match the new
/// signing key, recomputes the id, signs, and strips all countersignatures:
/// they covered the old content and key, so they no longer apply.
pub fn resign_covenant(
    doc: &CovenantDocument,
    signing_key: &ed25519_dalek::SigningKey,
) -> Result<CovenantDocument, PactumError> {
    let mut new_doc = doc.clone();
    new_doc.issuer.public_key = hex::encode(signing_key.verifying_key().as_bytes());
    new_doc.nonce = hex::encode(crypto::generate_nonce());
    new_doc.countersignatures = None;
    new_doc.signature = String::new();

    new_doc.id = compute_id(&new_doc)?;
    let message = signing_form(&new_doc)?;
    let sig_bytes = crypto::sign(message.as_bytes(), signing_key)?;
    new_doc.signature = hex::encode(&sig_bytes);

    Ok(new_doc)
}

// ---------------------------------------------------------------------------
// Access decision hook
// ---------------------------------------------------------------------------

/// Evaluate an (action, resource, context) request against a covenant.
///
/// This is the single hook framework adapters call. Never fails: a covenant
/// whose constraints do not parse yields a default-deny result.
pub fn evaluate_action(
    doc: &CovenantDocument,
    action: &str,
    resource: &str,
    context: Option<&serde_json::Value>,
) -> ccl::EvaluationResult {
    match ccl::parse(&doc.constraints) {
        Ok(parsed) => ccl::evaluate(&parsed, action, resource, context),
        Err(e) => ccl::EvaluationResult {
            permitted: false,
            matched_rule: None,
            all_matches: Vec::new(),
            reason: format!("Constraints failed to parse ({}); default deny", e),
            severity: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a CovenantDocument to a JSON string (transport form).
pub fn serialize_covenant(doc: &CovenantDocument) -> Result<String, PactumError> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| PactumError::Serialization(format!("Failed to serialize covenant: {}", e)))
}

/// Deserialize a JSON string into a CovenantDocument.
///
/// Parsers are field-order agnostic; only the canonical form sorts keys.
pub fn deserialize_covenant(json: &str) -> Result<CovenantDocument, PactumError> {
    serde_json::from_str(json)
        .map_err(|e| PactumError::Serialization(format!("Failed to deserialize covenant: {}", e)))
}
