//! # Hashers
//!
//! Named hash algorithms. Descriptor digests are computed from
//! `&CanonicalBytes` only; blob digests stream raw content through an
//! incremental hasher obtained from [`Hasher::create()`].

use sha2::digest::DynDigest;
use sha2::{Digest, Sha256, Sha512};

use cvsign_core::CanonicalBytes;

/// Hash algorithm name of [`Sha256Hasher`].
pub const SHA256: &str = "SHA-256";

/// Hash algorithm name of [`Sha512Hasher`].
pub const SHA512: &str = "SHA-512";

/// A named hash algorithm.
pub trait Hasher: Send + Sync {
    /// Registry name, e.g. `SHA-256`.
    fn algorithm(&self) -> &str;

    /// Digest size in bytes.
    fn output_size(&self) -> usize;

    /// Fresh incremental hasher.
    fn create(&self) -> Box<dyn DynDigest + Send>;

    /// Lowercase hex digest of raw bytes.
    fn hex_digest(&self, data: &[u8]) -> String {
        let mut h = self.create();
        h.update(data);
        hex::encode(h.finalize())
    }

    /// Lowercase hex digest of canonical bytes.
    fn digest(&self, data: &CanonicalBytes) -> String {
        self.hex_digest(data.as_bytes())
    }
}

/// SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn algorithm(&self) -> &str {
        SHA256
    }

    fn output_size(&self) -> usize {
        <Sha256 as Digest>::output_size()
    }

    fn create(&self) -> Box<dyn DynDigest + Send> {
        Box::new(Sha256::new())
    }
}

/// SHA-512.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Hasher;

impl Hasher for Sha512Hasher {
    fn algorithm(&self) -> &str {
        SHA512
    }

    fn output_size(&self) -> usize {
        <Sha512 as Digest>::output_size()
    }

    fn create(&self) -> Box<dyn DynDigest + Send> {
        Box::new(Sha512::new())
    }
}
