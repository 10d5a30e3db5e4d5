//! # Ed25519 Keys and Signature Handler
//!
//! Key types plus the `Ed25519` signature handler. The handler signs the
//! decoded descriptor digest bytes; key certificates sign `CanonicalBytes`.
//!
//! ## Security Invariant
//!
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does
//!   not implement `Serialize` or expose the private key bytes.
//!
//! ## Serde
//!
//! Public keys and signatures serialize as lowercase hex strings.

use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cvsign_core::{CanonicalBytes, SignatureSpec};

use crate::error::CryptoError;
use crate::handler::{decode_digest, Signer, Verifier};
use crate::keys::{PrivateKey, PublicKey};

/// Algorithm name of [`Ed25519SignatureHandler`].
pub const ED25519: &str = "Ed25519";

/// Media type of Ed25519 signature values.
pub const MEDIA_TYPE_ED25519: &str = "application/vnd.cvsign.signature.ed25519";

/// An Ed25519 public key (32 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing operations.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey impls
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a public key from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim())?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Key(format!("Ed25519 public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::Key(format!("invalid Ed25519 public key: {e}")))
    }

    /// Verify a signature over raw message bytes.
    pub fn verify_bytes(&self, msg: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.to_verifying_key()?
            .verify(msg, &sig)
            .map_err(|e| CryptoError::VerificationFailed(format!("Ed25519: {e}")))
    }

    /// Verify a signature over canonical bytes.
    pub fn verify(&self, data: &CanonicalBytes, signature: &Ed25519Signature) -> Result<(), CryptoError> {
        self.verify_bytes(data.as_bytes(), signature)
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature impls
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a signature from a 128-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim())?;
        let arr: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::VerificationFailed(format!(
                "Ed25519 signature must be 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", hex::encode(&self.0[..4]))
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair impls
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Parse a key pair from a 64-character hex seed.
    pub fn from_hex_seed(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim())?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Key(format!("Ed25519 seed must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        self.sign_bytes(data.as_bytes())
    }

    /// Sign a message that is already a hash output (a descriptor digest).
    pub fn sign_bytes(&self, msg: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(msg).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Signature handler
// ---------------------------------------------------------------------------

/// `Ed25519` signature handler. The signature covers the decoded digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519SignatureHandler;

impl Signer for Ed25519SignatureHandler {
    fn algorithm(&self) -> &str {
        ED25519
    }

    fn sign(
        &self,
        digest: &str,
        hash_algorithm: &str,
        issuer: Option<&str>,
        key: &PrivateKey,
    ) -> Result<SignatureSpec, CryptoError> {
        let PrivateKey::Ed25519(kp) = key else {
            return Err(CryptoError::Key(format!(
                "{ED25519} requires an Ed25519 private key, got {}",
                key.kind()
            )));
        };
        let bytes = decode_digest(digest, hash_algorithm)?;
        Ok(SignatureSpec {
            algorithm: ED25519.to_string(),
            value: kp.sign_bytes(&bytes).to_hex(),
            media_type: MEDIA_TYPE_ED25519.to_string(),
            issuer: issuer.map(str::to_string),
        })
    }
}

impl Verifier for Ed25519SignatureHandler {
    fn algorithm(&self) -> &str {
        ED25519
    }

    fn verify(
        &self,
        digest: &str,
        hash_algorithm: &str,
        signature: &SignatureSpec,
        key: &PublicKey,
    ) -> Result<(), CryptoError> {
        let PublicKey::Ed25519(pk) = key else {
            return Err(CryptoError::Key(format!(
                "{ED25519} requires an Ed25519 public key, got {}",
                key.kind()
            )));
        };
        let bytes = decode_digest(digest, hash_algorithm)?;
        let sig = Ed25519Signature::from_hex(&signature.value)?;
        pk.verify_bytes(&bytes, &sig)
    }
}
