//! Preview-token generation, hashing, payload sealing, and password gating.
//!
//! A token's plaintext secret is returned to the caller exactly once; only
//! its SHA-256 hash is stored for lookup. The token's claims (tenant,
//! version, expiry, nonce) travel in a signed envelope that is encrypted at
//! rest with AES-256-GCM.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ChronicleError, ChronicleResult};
use crate::hashing;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the generated token secret (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

/// Number of leading characters stored as a human-visible prefix.
pub const TOKEN_PREFIX_LENGTH: usize = 8;

/// AES-GCM nonce length in bytes.
const NONCE_LENGTH: usize = 12;

/// HMAC-SHA256 signature length in bytes.
const SIG_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Token secret generation
// ---------------------------------------------------------------------------

/// The result of generating a new preview token secret.
pub struct GeneratedToken {
    /// The plaintext secret (shown to the caller exactly once, never stored).
    pub plaintext: String,
    /// The first [`TOKEN_PREFIX_LENGTH`] characters, kept for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext (stored for lookup).
    pub hash: String,
}

/// Generate a new random token secret.
pub fn generate_token() -> GeneratedToken {
    let secret: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();

    let prefix = secret[..TOKEN_PREFIX_LENGTH].to_string();
    let hash = hash_token(&secret);

    GeneratedToken {
        plaintext: secret,
        prefix,
        hash,
    }
}

/// Compute the SHA-256 hex digest of a token secret.
///
/// Used both at creation (to store the hash) and at validation (to look the
/// token up by hash).
pub fn hash_token(secret: &str) -> String {
    hashing::sha256_hex(secret.as_bytes())
}

// ---------------------------------------------------------------------------
// Signed, encrypted payload
// ---------------------------------------------------------------------------

/// The claims carried inside a sealed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub tenant_id: DbId,
    pub version_id: DbId,
    pub expires_at: Timestamp,
    /// Random unique id binding this payload to one issuance.
    pub nonce: Uuid,
}

type HmacSha256 = Hmac<Sha256>;

/// Seals and opens token payloads: HMAC-SHA256 signature over the claims,
/// then AES-256-GCM encryption at rest.
pub struct PayloadCipher {
    signing_key: [u8; 32],
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    /// Build a cipher from a 32-byte master key.
    ///
    /// The signing key is derived from the master key so the two concerns
    /// never share raw key material.
    pub fn new(master_key: &[u8; 32]) -> Self {
        let mut material = Vec::with_capacity(master_key.len() + 5);
        material.extend_from_slice(master_key);
        material.extend_from_slice(b"/sign");
        let mut signing_key = [0u8; 32];
        signing_key.copy_from_slice(&Sha256::digest(&material));

        Self {
            signing_key,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master_key)),
        }
    }

    /// Serialize, sign, and encrypt a payload. The output layout is
    /// `nonce(12) || ciphertext(sig(32) || claims-json)`.
    pub fn seal(&self, payload: &TokenPayload) -> ChronicleResult<Vec<u8>> {
        let claims = serde_json::to_vec(payload)
            .map_err(|e| ChronicleError::Internal(format!("payload serialization: {e}")))?;

        // Qualified: `Mac` and the AEAD `KeyInit` both provide new_from_slice.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .map_err(|e| ChronicleError::Internal(format!("hmac init: {e}")))?;
        mac.update(&claims);
        let sig = mac.finalize().into_bytes();

        let mut envelope = Vec::with_capacity(SIG_LENGTH + claims.len());
        envelope.extend_from_slice(&sig);
        envelope.extend_from_slice(&claims);

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, envelope.as_slice())
            .map_err(|_| ChronicleError::Internal("payload encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt and verify a sealed payload, returning the claims.
    ///
    /// Fails if the ciphertext or signature does not authenticate; a stored
    /// payload that fails here has been tampered with or corrupted.
    pub fn open(&self, sealed: &[u8]) -> ChronicleResult<TokenPayload> {
        if sealed.len() <= NONCE_LENGTH {
            return Err(ChronicleError::Internal("sealed payload too short".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_bytes);

        let envelope = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| ChronicleError::Internal("payload decryption failed".into()))?;

        if envelope.len() <= SIG_LENGTH {
            return Err(ChronicleError::Internal("payload envelope too short".into()));
        }
        let (sig, claims) = envelope.split_at(SIG_LENGTH);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .map_err(|e| ChronicleError::Internal(format!("hmac init: {e}")))?;
        mac.update(claims);
        mac.verify_slice(sig)
            .map_err(|_| ChronicleError::Internal("payload signature mismatch".into()))?;

        serde_json::from_slice(claims)
            .map_err(|e| ChronicleError::Internal(format!("payload deserialization: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Password gating
// ---------------------------------------------------------------------------

/// Hash a caller-supplied access password with argon2id.
pub fn hash_access_password(password: &str) -> ChronicleResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ChronicleError::Internal(format!("password hashing: {e}")))
}

/// Verify a presented password against a stored argon2 hash.
pub fn verify_access_password(password: &str, stored_hash: &str) -> ChronicleResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ChronicleError::Internal(format!("stored password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_cipher() -> PayloadCipher {
        PayloadCipher::new(&[7u8; 32])
    }

    fn test_payload() -> TokenPayload {
        TokenPayload {
            tenant_id: 1,
            version_id: 42,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            nonce: Uuid::new_v4(),
        }
    }

    // -- Secret generation ---------------------------------------------------

    #[test]
    fn generated_token_has_correct_length() {
        let token = generate_token();
        assert_eq!(token.plaintext.len(), TOKEN_LENGTH);
        assert!(token.plaintext.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_token_prefix_matches_start() {
        let token = generate_token();
        assert_eq!(&token.plaintext[..TOKEN_PREFIX_LENGTH], token.prefix);
    }

    #[test]
    fn hash_matches_regeneration() {
        let token = generate_token();
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.hash.len(), 64);
    }

    #[test]
    fn different_tokens_produce_different_hashes() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    // -- Payload sealing -----------------------------------------------------

    #[test]
    fn seal_open_roundtrip() {
        let cipher = test_cipher();
        let payload = test_payload();
        let sealed = cipher.seal(&payload).unwrap();
        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn sealing_is_randomized() {
        let cipher = test_cipher();
        let payload = test_payload();
        let a = cipher.seal(&payload).unwrap();
        let b = cipher.seal(&payload).unwrap();
        assert_ne!(a, b, "fresh nonce per seal");
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = test_cipher();
        let mut sealed = cipher.seal(&test_payload()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(cipher.open(&sealed).is_err());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sealed = test_cipher().seal(&test_payload()).unwrap();
        let other = PayloadCipher::new(&[9u8; 32]);
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let cipher = test_cipher();
        assert!(cipher.open(&[0u8; 4]).is_err());
    }

    // -- Password gating -----------------------------------------------------

    #[test]
    fn password_verifies_after_hashing() {
        let hash = hash_access_password("hunter2").unwrap();
        assert!(verify_access_password("hunter2", &hash).unwrap());
        assert!(!verify_access_password("wrong", &hash).unwrap());
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = hash_access_password("same").unwrap();
        let b = hash_access_password("same").unwrap();
        assert_ne!(a, b);
    }
}
