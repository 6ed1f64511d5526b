//! Pactum: the cryptographic trust kernel for signed agent covenants.
//!
//! This crate provides the core protocol primitives for building, signing,
//! verifying, chaining, and enforcing Covenant documents. It includes:
//!
//! - **crypto**: Ed25519 signing/verification, SHA-256 hashing, JCS canonicalization,
//!   hex and base64url codecs
//! - **ccl**: Covenant Constraint Language lexer, parser, evaluator, and algebra
//! - **covenant**: Covenant document building, verification, countersigning, re-signing
//! - **chain**: delegation chain resolution and narrowing validation
//! - **graph**: trust graph with breach attestation processing and propagation
//! - **negotiation**: immutable constraint negotiation sessions
//! - **identity**: agent identity creation, evolution, and lineage verification
//! - **store**: covenant storage interface with synchronous change events

pub mod ccl;
pub mod chain;
pub mod covenant;
pub mod crypto;
pub mod graph;
pub mod identity;
pub mod negotiation;
pub mod store;

/// Errors that can occur throughout the Pactum protocol.
#[derive(Debug, thiserror::Error)]
pub enum PactumError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("CCL syntax error at line {line} column {col}: {message}")]
    CclSyntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("CCL validation error: {0}")]
    CclValidation(String),

    #[error("Covenant build failed: {0}")]
    CovenantBuild(String),

    #[error("Covenant verification failed: {0}")]
    CovenantVerification(String),

    #[error("Chain cycle detected at covenant {0}")]
    ChainCycle(String),

    #[error("Chain depth exceeds maximum of {max} at covenant {id}")]
    ChainDepthExceeded { id: String, max: usize },

    #[error("Chain parent {0} could not be loaded")]
    ChainMissingParent(String),

    #[error("Chain narrowing violated: {0}")]
    ChainNarrowing(String),

    #[error("Invalid breach attestation: {0}")]
    InvalidBreachAttestation(String),

    #[error("Negotiation session is in a terminal state: {0}")]
    TerminalState(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PactumError {
    /// Stable machine-readable code for this error, grouped by subsystem prefix.
    pub fn code(&self) -> &'static str {
        match self {
            PactumError::Validation(_) => "PROTOCOL_INVALID_INPUT",
            PactumError::CclSyntax { .. } => "CCL_SYNTAX",
            PactumError::CclValidation(_) => "CCL_VALIDATION",
            PactumError::CovenantBuild(_) => "COVENANT_BUILD",
            PactumError::CovenantVerification(_) => "COVENANT_VERIFY",
            PactumError::ChainCycle(_) => "CHAIN_CYCLE",
            PactumError::ChainDepthExceeded { .. } => "CHAIN_DEPTH_EXCEEDED",
            PactumError::ChainMissingParent(_) => "CHAIN_MISSING_PARENT",
            PactumError::ChainNarrowing(_) => "CHAIN_NARROWING",
            PactumError::InvalidBreachAttestation(_) => "PROTOCOL_INVALID_INPUT",
            PactumError::TerminalState(_) => "PROTOCOL_INVALID_INPUT",
            PactumError::Crypto(_) => "CRYPTO_FAILURE",
            PactumError::Serialization(_) => "CRYPTO_ENCODING",
            PactumError::Storage(_) => "STORE_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PactumError::Validation("x".into()).code(), "PROTOCOL_INVALID_INPUT");
        assert_eq!(
            PactumError::CclSyntax {
                line: 1,
                col: 1,
                message: "x".into()
            }
            .code(),
            "CCL_SYNTAX"
        );
        assert_eq!(PactumError::ChainCycle("abc".into()).code(), "CHAIN_CYCLE");
        assert_eq!(PactumError::Storage("x".into()).code(), "STORE_FAILURE");
    }

    #[test]
    fn test_error_display_includes_position() {
        let err = PactumError::CclSyntax {
            line: 3,
            col: 7,
            message: "unexpected token".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("column 7"));
    }
}
