//! Integration tests for the Pactum trust kernel.
//!
//! These tests exercise the core protocol flows end to end: key generation
//! and signing, CCL parsing/evaluation/algebra, covenant building,
//! verification, countersigning and re-signing, chain resolution and
//! narrowing, breach propagation through the trust graph, negotiation
//! sessions, identity lineage, and the covenant store.

use serde_json::json;

use pactum::ccl;
use pactum::chain::{self, ChainResolver};
use pactum::covenant::{
    self, ChainReference, ChainRelation, CovenantBuilder, CovenantDocument, Party,
    MAX_CHAIN_DEPTH, PROTOCOL_VERSION,
};
use pactum::crypto;
use pactum::graph::{
    build_breach_attestation, BreachReport, TrustGraph, TrustStatus,
};
use pactum::identity::{
    self, ChangeType, CreateIdentityOptions, DeploymentInfo, EvolveIdentityOptions, ModelInfo,
};
use pactum::negotiation::{self, NegotiationPolicy, Proposal, ProposalDecision, SessionStatus};
use pactum::store::{MemoryStore, Store};
use pactum::PactumError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_issuer(kp: &crypto::KeyPair) -> Party {
    Party {
        id: "issuer-1".to_string(),
        public_key: kp.public_key_hex.clone(),
        role: "issuer".to_string(),
    }
}

fn make_beneficiary(kp: &crypto::KeyPair) -> Party {
    Party {
        id: "beneficiary-1".to_string(),
        public_key: kp.public_key_hex.clone(),
        role: "beneficiary".to_string(),
    }
}

fn build_test_covenant(constraints: &str) -> (CovenantDocument, crypto::KeyPair) {
    let issuer_kp = crypto::generate_key_pair().unwrap();
    let beneficiary_kp = crypto::generate_key_pair().unwrap();
    let doc = CovenantBuilder::new()
        .issuer(make_issuer(&issuer_kp))
        .beneficiary(make_beneficiary(&beneficiary_kp))
        .constraints(constraints)
        .sign(&issuer_kp.signing_key)
        .unwrap();
    (doc, issuer_kp)
}

fn build_child_covenant(parent: &CovenantDocument, constraints: &str) -> CovenantDocument {
    let issuer_kp = crypto::generate_key_pair().unwrap();
    let beneficiary_kp = crypto::generate_key_pair().unwrap();
    CovenantBuilder::new()
        .issuer(make_issuer(&issuer_kp))
        .beneficiary(make_beneficiary(&beneficiary_kp))
        .constraints(constraints)
        .chain(ChainReference {
            parent_id: parent.id.clone(),
            relation: ChainRelation::Delegates,
            depth: parent.chain.as_ref().map(|c| c.depth + 1).unwrap_or(1),
        })
        .sign(&issuer_kp.signing_key)
        .unwrap()
}

// ===========================================================================
// Crypto
// ===========================================================================

#[test]
fn test_key_pair_generation() {
    let kp = crypto::generate_key_pair().unwrap();
    assert_eq!(kp.public_key_hex.len(), 64); // 32 bytes = 64 hex chars
    assert_eq!(kp.signing_key.to_bytes().len(), 32);
}

#[test]
fn test_sign_verify_roundtrip_and_tampering() {
    let kp = crypto::generate_key_pair().unwrap();
    let message = b"the trust kernel signs its own receipts";
    let signature = crypto::sign(message, &kp.signing_key).unwrap();
    assert_eq!(signature.len(), 64);

    assert!(crypto::verify(message, &signature, &kp.verifying_key));
    assert!(!crypto::verify(b"tampered", &signature, &kp.verifying_key));

    let mut bad_sig = signature.clone();
    bad_sig[0] ^= 0x01;
    assert!(!crypto::verify(message, &bad_sig, &kp.verifying_key));

    let other = crypto::generate_key_pair().unwrap();
    assert!(!crypto::verify(message, &signature, &other.verifying_key));
}

#[test]
fn test_signing_is_deterministic() {
    let kp = crypto::generate_key_pair().unwrap();
    let msg = b"same in, same out";
    assert_eq!(
        crypto::sign(msg, &kp.signing_key).unwrap(),
        crypto::sign(msg, &kp.signing_key).unwrap()
    );
}

#[test]
fn test_canonical_json_is_insertion_order_invariant() {
    let a = json!({"outer": {"b": 2, "a": 1}, "list": [1, 2, 3]});
    let b = json!({"list": [1, 2, 3], "outer": {"a": 1, "b": 2}});
    assert_eq!(crypto::canonicalize_json(&a), crypto::canonicalize_json(&b));
    assert_eq!(crypto::sha256_object(&a), crypto::sha256_object(&b));
}

#[test]
fn test_hex_and_base64url_roundtrips() {
    let data: Vec<u8> = (0u8..=255).collect();
    assert_eq!(crypto::from_hex(&crypto::to_hex(&data)).unwrap(), data);
    assert_eq!(
        crypto::base64url_decode(&crypto::base64url_encode(&data)).unwrap(),
        data
    );
}

// ===========================================================================
// CCL: scenarios S1 and S2
// ===========================================================================

#[test]
fn test_basic_permit_scenario() {
    let doc = ccl::parse("permit read on '/data/**'").unwrap();
    assert!(ccl::evaluate(&doc, "read", "/data/users/123", None).permitted);
    assert!(!ccl::evaluate(&doc, "write", "/data/users/123", None).permitted);
}

#[test]
fn test_deny_override_scenario() {
    let doc = ccl::parse("permit read on '/data/**'\ndeny read on '/data/secret'").unwrap();
    assert!(ccl::evaluate(&doc, "read", "/data/public", None).permitted);
    assert!(!ccl::evaluate(&doc, "read", "/data/secret", None).permitted);
}

#[test]
fn test_double_wildcard_matches_everything() {
    assert!(ccl::match_action("**", "any.action.at.all"));
    assert!(ccl::match_resource("**", "/any/resource/at/all"));
}

#[test]
fn test_default_deny_reason() {
    let doc = ccl::parse("permit read on '/a'").unwrap();
    let result = ccl::evaluate(&doc, "delete", "/b", None);
    assert!(!result.permitted);
    assert!(result.reason.contains("default deny"));
}

#[test]
fn test_conditioned_policy_against_context() {
    let doc = ccl::parse(
        "permit payments.initiate on '/accounts/**' when amount <= 1000 and currency in ['usd', 'eur']\n\
         deny payments.initiate on '/accounts/frozen/**' severity critical",
    )
    .unwrap();

    let ok_ctx = json!({"amount": 250, "currency": "eur"});
    assert!(ccl::evaluate(&doc, "payments.initiate", "/accounts/a1", Some(&ok_ctx)).permitted);

    let too_big = json!({"amount": 9000, "currency": "usd"});
    assert!(!ccl::evaluate(&doc, "payments.initiate", "/accounts/a1", Some(&too_big)).permitted);

    let frozen = ccl::evaluate(&doc, "payments.initiate", "/accounts/frozen/a9", Some(&ok_ctx));
    assert!(!frozen.permitted);
    assert_eq!(frozen.severity, Some(ccl::Severity::Critical));
}

#[test]
fn test_merge_is_deny_inclusive() {
    let parent = ccl::parse("deny exec on '**'\npermit read on '/data/**'").unwrap();
    let child = ccl::parse("deny net.send on '**'\npermit read on '/data/public/**'").unwrap();
    let merged = ccl::merge(&parent, &child);
    assert_eq!(merged.denies.len(), parent.denies.len() + child.denies.len());
}

// ===========================================================================
// Covenant: scenario S3
// ===========================================================================

#[test]
fn test_covenant_roundtrip_scenario() {
    let (doc, _) = build_test_covenant("permit read on '/data'");
    assert_eq!(doc.version, PROTOCOL_VERSION);

    let result = covenant::verify_covenant(&doc, None);
    assert!(result.valid);
    assert_eq!(result.checks.len(), 11);
    assert!(result.checks.iter().all(|c| c.passed));

    // Flip one character of the constraints: id_match must fail
    let mut tampered = doc.clone();
    tampered.constraints = "permit read on '/datA'".to_string();
    let result = covenant::verify_covenant(&tampered, None);
    assert!(!result.valid);
    assert!(!result.check("id_match").unwrap().passed);
}

#[test]
fn test_every_signed_field_is_tamper_evident() {
    let (doc, _) = build_test_covenant("permit read on '/data'");

    let mut nonce_tamper = doc.clone();
    nonce_tamper.nonce = "0".repeat(64);
    assert!(!covenant::verify_covenant(&nonce_tamper, None).check("id_match").unwrap().passed);

    let mut party_tamper = doc.clone();
    party_tamper.beneficiary.id = "someone-else".to_string();
    assert!(!covenant::verify_covenant(&party_tamper, None).check("id_match").unwrap().passed);

    let mut created_tamper = doc.clone();
    created_tamper.created_at = "2031-01-01T00:00:00.000Z".to_string();
    assert!(!covenant::verify_covenant(&created_tamper, None).check("id_match").unwrap().passed);
}

#[test]
fn test_countersign_then_resign_lifecycle() {
    let (doc, _) = build_test_covenant("permit read on '/data/**'");
    let auditor = crypto::generate_key_pair().unwrap();
    let regulator = crypto::generate_key_pair().unwrap();

    let cosigned = covenant::countersign_covenant(&doc, &auditor, "auditor").unwrap();
    let cosigned = covenant::countersign_covenant(&cosigned, &regulator, "regulator").unwrap();
    assert_eq!(cosigned.id, doc.id);
    assert_eq!(cosigned.countersignatures.as_ref().unwrap().len(), 2);
    assert!(covenant::verify_covenant(&cosigned, None).valid);

    let rotated = crypto::generate_key_pair().unwrap();
    let resigned = covenant::resign_covenant(&cosigned, &rotated.signing_key).unwrap();
    assert_ne!(resigned.id, doc.id);
    assert_ne!(resigned.nonce, doc.nonce);
    assert!(resigned.countersignatures.is_none());
    assert!(covenant::verify_covenant(&resigned, None).valid);
}

#[test]
fn test_covenant_access_decision_hook() {
    let (doc, _) = build_test_covenant(
        "permit file.read on '/workspace/**'\n\
         deny file.read on '/workspace/.env'\n\
         require audit.log on '/workspace/**'",
    );
    let allowed = covenant::evaluate_action(&doc, "file.read", "/workspace/src/main.rs", None);
    assert!(allowed.permitted);
    assert!(allowed
        .all_matches
        .iter()
        .any(|s| matches!(s, ccl::Statement::Require(_))));

    assert!(!covenant::evaluate_action(&doc, "file.read", "/workspace/.env", None).permitted);
    assert!(!covenant::evaluate_action(&doc, "file.write", "/workspace/src/main.rs", None).permitted);
}

// ===========================================================================
// Chains: scenario S4
// ===========================================================================

#[test]
fn test_chain_narrowing_scenario() {
    let (parent, _) = build_test_covenant("permit read on '**'");
    let child = build_child_covenant(&parent, "deny write on '/system'");
    let result = chain::validate_chain_narrowing(&[parent, child]).unwrap();
    assert!(result.valid, "{:?}", result.violations);
}

#[test]
fn test_chain_resolution_and_effective_policy() {
    let mut store = MemoryStore::new();
    let (root, _) = build_test_covenant("permit read on '/data/**'\ndeny read on '/data/secret'");
    let mid = build_child_covenant(&root, "deny read on '/data/internal/**'");
    let leaf = build_child_covenant(&mid, "deny read on '/data/reports'");

    store.put(root.clone()).unwrap();
    store.put(mid.clone()).unwrap();
    store.put(leaf.clone()).unwrap();

    let resolver = ChainResolver::new(&store);
    let resolved = resolver.resolve_chain(&leaf.id).unwrap();
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0].id, root.id);
    assert_eq!(resolved[2].id, leaf.id);

    let effective = chain::compute_effective_constraints(&resolved).unwrap();
    assert!(ccl::evaluate(&effective, "read", "/data/public", None).permitted);
    for denied in ["/data/secret", "/data/internal/x", "/data/reports"] {
        assert!(
            !ccl::evaluate(&effective, "read", denied, None).permitted,
            "{denied} should be denied"
        );
    }

    let verification = resolver.verify_chained(&leaf.id, None).unwrap();
    assert!(verification.valid);
    assert_eq!(verification.ancestors.len(), 2);
}

#[test]
fn test_chain_narrowing_violation_detected_through_resolver() {
    let mut store = MemoryStore::new();
    let (root, _) = build_test_covenant("deny exec on '/bin/**'\npermit read on '/data/**'");
    let rogue = build_child_covenant(&root, "permit exec on '/bin/sh'");
    store.put(root.clone()).unwrap();
    store.put(rogue.clone()).unwrap();

    let resolver = ChainResolver::new(&store);
    let verification = resolver.verify_chained(&rogue.id, None).unwrap();
    assert!(!verification.valid);
    assert!(!verification.narrowing.valid);
    assert_eq!(verification.narrowing.violations[0].child_id, rogue.id);
}

#[test]
fn test_chain_depth_constant_matches_limit() {
    assert_eq!(MAX_CHAIN_DEPTH, 16);
}

// ===========================================================================
// Trust graph: scenario S5
// ===========================================================================

#[test]
fn test_breach_propagation_scenario() {
    let graph = TrustGraph::new();
    let ids: Vec<String> = ["a", "b", "c", "d"]
        .iter()
        .map(|s| crypto::sha256_string(s))
        .collect();
    graph.register_dependency(&ids[0], &ids[1]);
    graph.register_dependency(&ids[1], &ids[2]);
    graph.register_dependency(&ids[2], &ids[3]);

    let reporter = crypto::generate_key_pair().unwrap();
    let attestation = build_breach_attestation(
        BreachReport {
            covenant_id: "c".repeat(64),
            violator_identity_hash: ids[0].clone(),
            violated_constraint: "deny exfil on '**'".to_string(),
            severity: ccl::Severity::Critical,
            action: "exfil".to_string(),
            resource: "/data/secret".to_string(),
            evidence: "egress capture".to_string(),
            recommended_action: "revoke".to_string(),
            affected_covenants: vec![],
        },
        &reporter,
    )
    .unwrap();

    let events = graph.process_breach(&attestation).unwrap();

    assert_eq!(graph.get_status(&ids[0]), TrustStatus::Revoked);
    assert_eq!(graph.get_status(&ids[1]), TrustStatus::Restricted);
    assert_eq!(graph.get_status(&ids[2]), TrustStatus::Degraded);
    // Propagation halts at degraded: D is untouched
    assert_eq!(graph.get_status(&ids[3]), TrustStatus::Trusted);

    let depths: Vec<usize> = events.iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);
}

#[test]
fn test_breach_propagation_never_improves_status() {
    let graph = TrustGraph::new();
    graph.register_dependency("root", "child");
    graph.reset_status("child", TrustStatus::Revoked);

    let reporter = crypto::generate_key_pair().unwrap();
    let attestation = build_breach_attestation(
        BreachReport {
            covenant_id: "c".repeat(64),
            violator_identity_hash: "root".to_string(),
            violated_constraint: "deny write on '/system'".to_string(),
            severity: ccl::Severity::High,
            action: "write".to_string(),
            resource: "/system".to_string(),
            evidence: "syscall trace".to_string(),
            recommended_action: "restrict".to_string(),
            affected_covenants: vec![],
        },
        &reporter,
    )
    .unwrap();

    let before: Vec<TrustStatus> = ["root", "child"]
        .iter()
        .map(|id| graph.get_status(id))
        .collect();
    graph.process_breach(&attestation).unwrap();

    // No node got better
    assert_eq!(
        TrustStatus::worse_of(before[0], graph.get_status("root")),
        graph.get_status("root")
    );
    assert_eq!(graph.get_status("child"), TrustStatus::Revoked);
}

// ===========================================================================
// Negotiation: scenario S6
// ===========================================================================

#[test]
fn test_negotiation_scenario() {
    let policy = NegotiationPolicy {
        required: vec!["deny:exfil".to_string(), "require:auth".to_string()],
        preferred: vec![],
        dealbreakers: vec![],
        max_rounds: 5,
        timeout_ms: 60_000,
    };
    let session = negotiation::initiate("alice", "bob", &policy);
    assert_eq!(session.proposals.len(), 1);

    let countered = negotiation::counter(
        &session,
        Proposal {
            from: "bob".to_string(),
            constraints: vec![
                "deny:exfil".to_string(),
                "require:auth".to_string(),
                "deny:network".to_string(),
            ],
            timestamp: crypto::timestamp(),
        },
    )
    .unwrap();
    assert_eq!(countered.status, SessionStatus::Countering);
    assert_eq!(countered.proposals.len(), 2);

    let agreed = negotiation::agree(&countered).unwrap();
    let result = agreed.resulting_constraints.unwrap();
    for expected in ["deny:exfil", "deny:network", "require:auth"] {
        assert!(result.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn test_negotiation_evaluation_drives_responses() {
    let bob_policy = NegotiationPolicy {
        required: vec!["deny:exfil".to_string()],
        preferred: vec![],
        dealbreakers: vec!["permit:secrets".to_string()],
        max_rounds: 3,
        timeout_ms: 1_000,
    };

    let acceptable = Proposal {
        from: "alice".to_string(),
        constraints: vec!["deny:exfil".to_string(), "require:auth".to_string()],
        timestamp: crypto::timestamp(),
    };
    assert_eq!(
        negotiation::evaluate_proposal(&acceptable, &bob_policy),
        ProposalDecision::Accept
    );

    let poison = Proposal {
        from: "alice".to_string(),
        constraints: vec!["deny:exfil".to_string(), "permit:secrets".to_string()],
        timestamp: crypto::timestamp(),
    };
    assert_eq!(
        negotiation::evaluate_proposal(&poison, &bob_policy),
        ProposalDecision::Reject
    );

    let incomplete = Proposal {
        from: "alice".to_string(),
        constraints: vec!["require:auth".to_string()],
        timestamp: crypto::timestamp(),
    };
    assert_eq!(
        negotiation::evaluate_proposal(&incomplete, &bob_policy),
        ProposalDecision::Counter
    );
}

// ===========================================================================
// Identity lineage
// ===========================================================================

#[test]
fn test_identity_lifecycle() {
    let kp = crypto::generate_key_pair().unwrap();
    let id0 = identity::create_identity(CreateIdentityOptions {
        signing_key: kp.signing_key.clone(),
        public_key_hex: kp.public_key_hex.clone(),
        model: ModelInfo {
            provider: "anthropic".to_string(),
            model_id: "claude-3".to_string(),
        },
        capabilities: vec!["read".to_string()],
        deployment: DeploymentInfo {
            runtime: "container".to_string(),
        },
    })
    .unwrap();
    assert!(identity::verify_identity(&id0).valid);

    let id1 = identity::evolve_identity(
        &id0,
        EvolveIdentityOptions {
            signing_key: kp.signing_key.clone(),
            change_type: ChangeType::CapabilityChange,
            description: "grant write".to_string(),
            model: None,
            capabilities: Some(vec!["read".to_string(), "write".to_string()]),
            deployment: None,
            operator_public_key: None,
        },
    )
    .unwrap();

    assert_eq!(id1.version, 2);
    assert_eq!(id1.lineage.len(), 2);
    assert_eq!(
        id1.lineage[1].parent_hash.as_deref(),
        Some(id0.lineage[0].identity_hash.as_str())
    );
    assert!(identity::verify_identity(&id1).valid);

    // Tampering with lineage is detected
    let mut forged = id1.clone();
    forged.lineage[1].parent_hash = Some("0".repeat(64));
    assert!(!identity::verify_identity(&forged).valid);
}

// ===========================================================================
// Store
// ===========================================================================

#[test]
fn test_store_holds_verified_covenants() {
    let mut store = MemoryStore::new();
    let (doc, _) = build_test_covenant("permit read on '/data/**'");
    let id = doc.id.clone();

    store.put(doc).unwrap();
    assert!(store.has(&id));
    assert_eq!(store.count(), 1);

    let loaded = store.get(&id).unwrap().unwrap();
    assert!(covenant::verify_covenant(loaded, None).valid);

    assert!(store.delete(&id).unwrap());
    assert!(!store.has(&id));
}

// ===========================================================================
// Error codes
// ===========================================================================

#[test]
fn test_error_code_prefixes() {
    let (doc, _) = build_test_covenant("permit read on '/x'");
    let store = MemoryStore::new();
    let resolver = ChainResolver::new(&store);
    let missing = resolver.resolve_chain(&doc.id).unwrap_err();
    assert!(missing.code().starts_with("CHAIN_"));

    let syntax = ccl::parse("permit").unwrap_err();
    assert_eq!(syntax.code(), "CCL_SYNTAX");

    let hexed = crypto::from_hex("zz").unwrap_err();
    assert_eq!(hexed.code(), "PROTOCOL_INVALID_INPUT");

    let terminal = {
        let policy = NegotiationPolicy {
            max_rounds: 2,
            timeout_ms: 1,
            ..Default::default()
        };
        let session = negotiation::initiate("a", "b", &policy);
        let agreed = negotiation::agree(&session).unwrap();
        negotiation::agree(&agreed).unwrap_err()
    };
    assert!(matches!(terminal, PactumError::TerminalState(_)));
}
