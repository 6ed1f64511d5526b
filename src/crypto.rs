//! Cryptographic primitives for the Pactum protocol.
//!
//! Provides Ed25519 signing/verification via `ed25519-dalek`, SHA-256 hashing
//! via `sha2`, JCS-style JSON canonicalization, hex and base64url codecs, and
//! utility functions for nonce/id generation, timestamps, and constant-time
//! comparison.

use crate::PactumError;
use base64::Engine;
use ed25519_dalek::{Signer, Verifier};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// An Ed25519 key pair containing the signing key, verifying key, and hex-encoded public key.
pub struct KeyPair {
    pub signing_key: ed25519_dalek::SigningKey,
    pub verifying_key: ed25519_dalek::VerifyingKey,
    pub public_key_hex: String,
}

/// Generate a new Ed25519 key pair from cryptographically secure randomness.
///
/// Returns a `KeyPair` with a fresh 32-byte private key, the derived public key,
/// and the hex-encoded public key string.
pub fn generate_key_pair() -> Result<KeyPair, PactumError> {
    let mut rng = rand::thread_rng();
    let mut secret = [0u8; 32];
    rng.fill_bytes(&mut secret);
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
    let verifying_key = signing_key.verifying_key();
    let public_key_hex = hex::encode(verifying_key.as_bytes());
    Ok(KeyPair {
        signing_key,
        verifying_key,
        public_key_hex,
    })
}

/// Reconstruct a `KeyPair` from a 32-byte private key.
///
/// # Errors
/// Returns `PactumError::Crypto` if the byte slice is not exactly 32 bytes.
pub fn key_pair_from_private_key(bytes: &[u8]) -> Result<KeyPair, PactumError> {
    let secret: [u8; 32] = bytes.try_into().map_err(|_| {
        PactumError::Crypto(format!("Private key must be 32 bytes, got {}", bytes.len()))
    })?;
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
    let verifying_key = signing_key.verifying_key();
    let public_key_hex = hex::encode(verifying_key.as_bytes());
    Ok(KeyPair {
        signing_key,
        verifying_key,
        public_key_hex,
    })
}

/// Parse a 64-char hex public key into a verifying key.
///
/// # Errors
/// Returns `PactumError::Crypto` on malformed hex, wrong length, or an
/// encoding that is not a valid curve point.
pub fn verifying_key_from_hex(public_key_hex: &str) -> Result<ed25519_dalek::VerifyingKey, PactumError> {
    let bytes = from_hex(public_key_hex)?;
    let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        PactumError::Crypto(format!("Public key must be 32 bytes, got {}", bytes.len()))
    })?;
    ed25519_dalek::VerifyingKey::from_bytes(&arr)
        .map_err(|_| PactumError::Crypto("Public key is not a valid Ed25519 point".to_string()))
}

/// Sign a message with an Ed25519 signing key.
///
/// Ed25519 signing is deterministic: the same message and key always produce
/// the same 64-byte signature.
pub fn sign(message: &[u8], signing_key: &ed25519_dalek::SigningKey) -> Result<Vec<u8>, PactumError> {
    let signature = signing_key.sign(message);
    Ok(signature.to_bytes().to_vec())
}

/// Verify an Ed25519 signature against a message and verifying key.
///
/// Returns `true` if the signature is valid, `false` otherwise. Never panics
/// on malformed inputs -- any error is treated as an invalid signature.
pub fn verify(
    message: &[u8],
    signature: &[u8],
    verifying_key: &ed25519_dalek::VerifyingKey,
) -> bool {
    if signature.len() != 64 {
        return false;
    }
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}

/// Verify a hex-encoded signature by a hex-encoded public key.
///
/// Returns `false` on any malformed input; never errors.
pub fn verify_hex(message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
    let sig = match from_hex(signature_hex) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let vk = match verifying_key_from_hex(public_key_hex) {
        Ok(k) => k,
        Err(_) => return false,
    };
    verify(message, &sig, &vk)
}

/// Compute the SHA-256 hash of raw bytes and return it as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Compute the SHA-256 hash of a UTF-8 string and return it as a lowercase hex string.
pub fn sha256_string(data: &str) -> String {
    sha256_hex(data.as_bytes())
}

/// Compute the SHA-256 hash of a JSON value after canonicalization.
///
/// Two structurally equal objects always produce the same hash regardless
/// of key insertion order.
pub fn sha256_object(obj: &serde_json::Value) -> String {
    sha256_string(&canonicalize_json(obj))
}

/// Deterministic JSON serialization (JCS-style, RFC 8785).
///
/// Recursively sorts all object keys by UTF-16 code units, preserves array
/// order and `null` values, and emits compact JSON with minimal escapes and
/// shortest round-trip numbers. Produces byte-identical output for
/// structurally equal values regardless of key insertion order.
pub fn canonicalize_json(obj: &serde_json::Value) -> String {
    let sorted = sort_keys(obj);
    // serde_json emits compact JSON with shortest-form numbers
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Recursively sort all object keys in a JSON value.
fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| cmp_utf16(a, b));
            let mut sorted_map = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted_map.insert(key.clone(), sort_keys(v));
                }
            }
            serde_json::Value::Object(sorted_map)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// Compare two strings by their UTF-16 code units, the JCS key ordering.
///
/// Differs from byte ordering only for keys containing supplementary-plane
/// characters, which sort as surrogate pairs.
fn cmp_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Encode bytes as a lowercase hex string.
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string into bytes.
///
/// # Errors
/// Returns `PactumError::Validation` on odd-length input or any
/// non-hexadecimal character. Both lowercase and uppercase digits are accepted.
pub fn from_hex(s: &str) -> Result<Vec<u8>, PactumError> {
    if s.len() % 2 != 0 {
        return Err(PactumError::Validation(format!(
            "Hex string must have even length, got {}",
            s.len()
        )));
    }
    if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(PactumError::Validation(format!(
            "Invalid hex character '{}'",
            bad
        )));
    }
    hex::decode(s).map_err(|e| PactumError::Validation(format!("Invalid hex string: {}", e)))
}

/// Encode bytes as base64url (RFC 4648 section 5) without padding.
pub fn base64url_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

/// Decode a base64url string into bytes.
///
/// Accepts input with or without trailing `=` padding.
///
/// # Errors
/// Returns `PactumError::Validation` on any character outside the
/// base64url alphabet.
pub fn base64url_decode(s: &str) -> Result<Vec<u8>, PactumError> {
    let trimmed = s.trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| PactumError::Validation(format!("Invalid base64url string: {}", e)))
}

/// Constant-time comparison of two byte slices.
///
/// Returns `true` only if both slices have the same length and identical
/// contents. A length mismatch returns early; otherwise the comparison time
/// depends only on the length, preventing timing side channels on content.
pub fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Generate 32 random bytes for use as a cryptographic nonce.
pub fn generate_nonce() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut nonce = vec![0u8; 32];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Generate a random identifier of `n` bytes, hex-encoded (`2n` chars).
pub fn generate_id(n: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; n];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Default-length (16-byte, 32-char) random identifier.
pub fn generate_default_id() -> String {
    generate_id(16)
}

/// Return the current UTC time as an ISO 8601 string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.sssZ`
pub fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format a specific instant in the protocol timestamp format.
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse an ISO 8601 timestamp string into a UTC instant.
///
/// Handles RFC 3339 as well as the protocol format with or without
/// fractional seconds.
pub fn parse_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.3fZ") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
        return Some(dt.and_utc());
    }
    None
}
