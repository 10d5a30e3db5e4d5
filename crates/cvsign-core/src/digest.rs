//! # Digest Specs — Self-Describing Digests
//!
//! A `DigestSpec` names the hash algorithm and the normalization algorithm
//! that produced a hex digest value. Resource digests, reference digests and
//! descriptor digests all use this shape.
//!
//! ## Exclusion Sentinel
//!
//! [`DigestSpec::exclude_from_signature()`] is a reserved value stating that
//! the resource content is intentionally not covered by signatures (used for
//! access kinds that are mutable or must not be content-addressed).

use serde::{Deserialize, Serialize};

/// Normalization algorithm: entry-list encoding of the normalized descriptor.
pub const JSON_NORMALISATION_V1: &str = "jsonNormalisation/v1";

/// Normalization algorithm: JCS encoding with empty-collection filtering.
pub const JSON_NORMALISATION_V2: &str = "jsonNormalisation/v2";

/// Digest normalization used when hashing raw blob content.
pub const GENERIC_BLOB_DIGEST_V1: &str = "genericBlobDigest/v1";

/// Digest normalization used for OCI artifacts (digest of the manifest).
pub const OCI_ARTIFACT_DIGEST_V1: &str = "ociArtifactDigest/v1";

/// Placeholder hash algorithm / value of the exclusion sentinel.
pub const NO_DIGEST: &str = "NO-DIGEST";

/// Normalization algorithm of the exclusion sentinel.
pub const EXCLUDE_FROM_SIGNATURE: &str = "EXCLUDE-FROM-SIGNATURE";

/// A digest together with the algorithms that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSpec {
    /// Hash algorithm name, e.g. `SHA-256`.
    pub hash_algorithm: String,
    /// Normalization algorithm name, e.g. `jsonNormalisation/v1`.
    pub normalisation_algorithm: String,
    /// Lowercase hex digest value.
    pub value: String,
}

impl DigestSpec {
    /// Create a digest spec.
    pub fn new(
        hash_algorithm: impl Into<String>,
        normalisation_algorithm: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            hash_algorithm: hash_algorithm.into(),
            normalisation_algorithm: normalisation_algorithm.into(),
            value: value.into(),
        }
    }

    /// The reserved "excluded from signature" digest.
    pub fn exclude_from_signature() -> Self {
        Self::new(NO_DIGEST, EXCLUDE_FROM_SIGNATURE, NO_DIGEST)
    }

    /// Returns true if this is the exclusion sentinel.
    pub fn is_excluded(&self) -> bool {
        *self == Self::exclude_from_signature()
    }

    /// Returns true if all three fields are populated.
    pub fn is_complete(&self) -> bool {
        !self.hash_algorithm.is_empty()
            && !self.normalisation_algorithm.is_empty()
            && !self.value.is_empty()
    }

    /// The `(hash, normalization)` pair identifying the digester.
    pub fn digester_type(&self) -> (&str, &str) {
        (&self.hash_algorithm, &self.normalisation_algorithm)
    }
}

impl std::fmt::Display for DigestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}]:{}",
            self.hash_algorithm, self.normalisation_algorithm, self.value
        )
    }
}
