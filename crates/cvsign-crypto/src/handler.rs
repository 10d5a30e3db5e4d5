//! # Signature Handler Traits
//!
//! A signature handler signs and verifies the hex digest of a descriptor.
//! The signature value and its metadata are carried as a
//! [`SignatureSpec`], the same shape stored on the descriptor.
//!
//! Implementations must be `Send + Sync`: handlers live in shared
//! registries and are used from independent walks on separate threads.

use cvsign_core::SignatureSpec;

use crate::error::CryptoError;
use crate::hasher::{SHA256, SHA512};
use crate::keys::{PrivateKey, PublicKey};

/// Produces signatures over descriptor digests.
pub trait Signer: Send + Sync {
    /// Registry name of the signature algorithm.
    fn algorithm(&self) -> &str;

    /// Sign the hex `digest` that was produced with `hash_algorithm`.
    fn sign(
        &self,
        digest: &str,
        hash_algorithm: &str,
        issuer: Option<&str>,
        key: &PrivateKey,
    ) -> Result<SignatureSpec, CryptoError>;
}

/// Verifies signatures over descriptor digests.
pub trait Verifier: Send + Sync {
    fn algorithm(&self) -> &str;

    fn verify(
        &self,
        digest: &str,
        hash_algorithm: &str,
        signature: &SignatureSpec,
        key: &PublicKey,
    ) -> Result<(), CryptoError>;
}

/// Output size in bytes of a known hash algorithm.
pub fn hash_output_size(hash_algorithm: &str) -> Option<usize> {
    match hash_algorithm {
        SHA256 => Some(32),
        SHA512 => Some(64),
        _ => None,
    }
}

/// Decode a hex digest and check its length against the hash algorithm.
pub fn decode_digest(digest: &str, hash_algorithm: &str) -> Result<Vec<u8>, CryptoError> {
    let expected = hash_output_size(hash_algorithm).ok_or_else(|| CryptoError::UnknownAlgorithm {
        kind: "hash algorithm",
        name: hash_algorithm.to_string(),
    })?;
    let bytes = hex::decode(digest)?;
    if bytes.len() != expected {
        return Err(CryptoError::DigestLength {
            algorithm: hash_algorithm.to_string(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}
