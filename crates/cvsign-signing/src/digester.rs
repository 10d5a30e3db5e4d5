//! # Blob Digesters
//!
//! A blob digester turns the content behind an access method into a
//! resource [`DigestSpec`]. Digesters are registered per resource type and
//! per media type. Candidates are tried in that order, followed by the
//! generic fallback list.
//!
//! A digester is identified by its [`DigesterType`]: the hash algorithm
//! and normalization it produces. When a resource already carries a
//! digest, its digester type is *requested* and only a digester producing
//! exactly that type may answer; otherwise the first digester that accepts
//! the content with the configured hasher wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use cvsign_core::descriptor::ACCESS_TYPE_OCI_ARTIFACT;
use cvsign_core::{DigestSpec, GENERIC_BLOB_DIGEST_V1, OCI_ARTIFACT_DIGEST_V1};
use cvsign_crypto::{Hasher, Registry, SHA256};

use crate::access::AccessMethod;
use crate::error::{AccessError, SigningError};

/// Resource type of OCI images.
pub const RESOURCE_TYPE_OCI_IMAGE: &str = "ociImage";

/// Resource type of generic OCI artifacts.
pub const RESOURCE_TYPE_OCI_ARTIFACT: &str = "ociArtifact";

/// `(hash algorithm, normalization algorithm)` of a resource digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DigesterType {
    pub hash_algorithm: String,
    pub normalisation_algorithm: String,
}

impl DigesterType {
    pub fn new(hash_algorithm: impl Into<String>, normalisation_algorithm: impl Into<String>) -> Self {
        Self {
            hash_algorithm: hash_algorithm.into(),
            normalisation_algorithm: normalisation_algorithm.into(),
        }
    }

    /// The type that produced `digest`.
    pub fn of(digest: &DigestSpec) -> Self {
        let (hash, norm) = digest.digester_type();
        Self::new(hash, norm)
    }
}

impl std::fmt::Display for DigesterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.hash_algorithm, self.normalisation_algorithm)
    }
}

/// Computes resource digests from blob content.
pub trait BlobDigester: Send + Sync {
    /// Normalization algorithm of the produced digests.
    fn normalisation_algorithm(&self) -> &str;

    /// The digester type produced with `hasher`, or `None` if this
    /// digester cannot work with that hash algorithm.
    fn digester_type(&self, hasher: &dyn Hasher) -> Option<DigesterType> {
        Some(DigesterType::new(hasher.algorithm(), self.normalisation_algorithm()))
    }

    /// Digest of the content behind `method`, or `None` if this digester
    /// does not apply to it.
    fn determine_digest(
        &self,
        resource_type: &str,
        method: &dyn AccessMethod,
        hasher: &dyn Hasher,
    ) -> Result<Option<DigestSpec>, AccessError>;
}

/// Hash of the full blob.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericBlobDigester;

impl BlobDigester for GenericBlobDigester {
    fn normalisation_algorithm(&self) -> &str {
        GENERIC_BLOB_DIGEST_V1
    }

    fn determine_digest(
        &self,
        _resource_type: &str,
        method: &dyn AccessMethod,
        hasher: &dyn Hasher,
    ) -> Result<Option<DigestSpec>, AccessError> {
        let content = method.content()?;
        let mut h = hasher.create();
        h.update(&content);
        let value = hex::encode(h.finalize());
        Ok(Some(DigestSpec::new(hasher.algorithm(), GENERIC_BLOB_DIGEST_V1, value)))
    }
}

/// SHA-256 of an OCI manifest.
///
/// Applies only to `ociArtifact` access methods; the method content is the
/// manifest bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OciArtifactDigester;

impl BlobDigester for OciArtifactDigester {
    fn normalisation_algorithm(&self) -> &str {
        OCI_ARTIFACT_DIGEST_V1
    }

    fn digester_type(&self, hasher: &dyn Hasher) -> Option<DigesterType> {
        (hasher.algorithm() == SHA256).then(|| DigesterType::new(SHA256, OCI_ARTIFACT_DIGEST_V1))
    }

    fn determine_digest(
        &self,
        _resource_type: &str,
        method: &dyn AccessMethod,
        hasher: &dyn Hasher,
    ) -> Result<Option<DigestSpec>, AccessError> {
        if hasher.algorithm() != SHA256 || method.kind() != ACCESS_TYPE_OCI_ARTIFACT {
            return Ok(None);
        }
        let manifest = method.content()?;
        Ok(Some(DigestSpec::new(SHA256, OCI_ARTIFACT_DIGEST_V1, hasher.hex_digest(&manifest))))
    }
}

/// Digesters by resource type and media type plus generic fallbacks.
#[derive(Default)]
pub struct BlobDigesterRegistry {
    by_type: RwLock<HashMap<String, Vec<Arc<dyn BlobDigester>>>>,
    by_mime_type: RwLock<HashMap<String, Vec<Arc<dyn BlobDigester>>>>,
    generic: RwLock<Vec<Arc<dyn BlobDigester>>>,
}

impl BlobDigesterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the OCI digester for OCI resource types and the
    /// generic blob digester as fallback.
    pub fn with_builtin_digesters() -> Self {
        let reg = Self::default();
        let oci: Arc<dyn BlobDigester> = Arc::new(OciArtifactDigester);
        reg.register_for_type(RESOURCE_TYPE_OCI_IMAGE, Arc::clone(&oci));
        reg.register_for_type(RESOURCE_TYPE_OCI_ARTIFACT, oci);
        reg.register_generic(Arc::new(GenericBlobDigester));
        reg
    }

    pub fn register_for_type(&self, resource_type: impl Into<String>, digester: Arc<dyn BlobDigester>) {
        self.by_type.write().entry(resource_type.into()).or_default().push(digester);
    }

    /// Register for a media type; parameters such as `; charset=...` are
    /// ignored when matching.
    pub fn register_for_mime_type(&self, mime_type: impl Into<String>, digester: Arc<dyn BlobDigester>) {
        self.by_mime_type
            .write()
            .entry(base_mime_type(&mime_type.into()).to_string())
            .or_default()
            .push(digester);
    }

    pub fn register_generic(&self, digester: Arc<dyn BlobDigester>) {
        self.generic.write().push(digester);
    }

    fn candidates(&self, resource_type: &str, mime_type: &str) -> Vec<Arc<dyn BlobDigester>> {
        let mut list: Vec<Arc<dyn BlobDigester>> =
            self.by_type.read().get(resource_type).cloned().unwrap_or_default();
        if let Some(by_mime) = self.by_mime_type.read().get(base_mime_type(mime_type)) {
            list.extend(by_mime.iter().cloned());
        }
        list.extend(self.generic.read().iter().cloned());
        list
    }

    /// Digests for the content behind `method`.
    ///
    /// With an empty `requested` list the first applicable digester is used
    /// with `hasher` and at most one digest is returned. Otherwise one
    /// digest per satisfiable requested type is returned; hashers for
    /// requested types are looked up in `registry`.
    pub fn determine_digests(
        &self,
        resource_type: &str,
        hasher: &dyn Hasher,
        registry: &Registry,
        method: &dyn AccessMethod,
        requested: &[DigesterType],
    ) -> Result<Vec<DigestSpec>, SigningError> {
        let candidates = self.candidates(resource_type, method.mime_type());
        if requested.is_empty() {
            for d in &candidates {
                if let Some(digest) = d.determine_digest(resource_type, method, hasher)? {
                    return Ok(vec![digest]);
                }
            }
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for dt in requested {
            let h = registry
                .get_hasher(&dt.hash_algorithm)
                .ok_or_else(|| SigningError::UnknownAlgorithm {
                    kind: "hash algorithm",
                    name: dt.hash_algorithm.clone(),
                })?;
            for d in &candidates {
                if d.digester_type(h.as_ref()).as_ref() != Some(dt) {
                    continue;
                }
                if let Some(digest) = d.determine_digest(resource_type, method, h.as_ref())? {
                    result.push(digest);
                    break;
                }
            }
        }
        Ok(result)
    }
}

fn base_mime_type(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

impl std::fmt::Debug for BlobDigesterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobDigesterRegistry")
            .field("types", &self.by_type.read().keys().collect::<Vec<_>>())
            .field("mime_types", &self.by_mime_type.read().keys().collect::<Vec<_>>())
            .field("generic", &self.generic.read().len())
            .finish()
    }
}
