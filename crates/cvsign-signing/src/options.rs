//! # Signing Options
//!
//! [`Options`] selects what a walk does: sign, verify signatures, verify or
//! fill in digests, recurse into references. A caller builds options with
//! the `with_*` methods; [`Options::complete`] then fills in defaults and
//! checks consistency once, before the walk starts.
//!
//! Options for referenced component versions are derived with
//! [`Options::for_reference`]: signature verification turns into digest
//! verification, signing and updating are kept only when walking
//! recursively, and the hasher and normalization follow the digest already
//! stored on the reference.

use std::collections::BTreeSet;
use std::sync::Arc;

use cvsign_core::normalize::is_supported_normalisation;
use cvsign_core::{DigestSpec, JSON_NORMALISATION_V1};
use cvsign_crypto::{
    default_registry, verify_chain, Hasher, KeyRegistry, PrivateKey, PublicKey, Registry, RootCertificates,
    Signer, SHA256,
};

use crate::access::Resolver;
use crate::digester::BlobDigesterRegistry;
use crate::error::SigningError;

#[derive(Clone, Default)]
pub struct Options {
    pub signer: Option<Arc<dyn Signer>>,
    pub registry: Option<Registry>,
    /// Keys consulted before the registry's key tables.
    pub keys: Option<Arc<KeyRegistry>>,
    pub resolver: Option<Arc<dyn Resolver>>,
    /// Walk into references even when they already carry a digest, with
    /// the same signing and update settings.
    pub recursively: bool,
    /// Recompute and compare digests of references that already have one.
    pub verify_digests: bool,
    pub verify_signature: bool,
    /// Write computed digests back into the descriptor.
    pub update: bool,
    /// Access types whose content is excluded from signatures.
    pub skip_access_types: BTreeSet<String>,
    pub signature_names: Vec<String>,
    pub normalization_algo: Option<String>,
    pub root_certs: Option<RootCertificates>,
    pub hasher: Option<Arc<dyn Hasher>>,
    pub issuer: Option<String>,
    pub digesters: Option<Arc<BlobDigesterRegistry>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign with `signer` under the signature `name`.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>, name: impl Into<String>) -> Self {
        self.signer = Some(signer);
        self.signature_names = vec![name.into()];
        self
    }

    pub fn with_signature_name(mut self, name: impl Into<String>) -> Self {
        self.signature_names.push(name.into());
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_keys(mut self, keys: Arc<KeyRegistry>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_recursively(mut self, on: bool) -> Self {
        self.recursively = on;
        self
    }

    pub fn with_verify_digests(mut self, on: bool) -> Self {
        self.verify_digests = on;
        self
    }

    pub fn with_verify_signature(mut self, on: bool) -> Self {
        self.verify_signature = on;
        self
    }

    pub fn with_update(mut self, on: bool) -> Self {
        self.update = on;
        self
    }

    pub fn with_skip_access_type(mut self, access_type: impl Into<String>) -> Self {
        self.skip_access_types.insert(access_type.into());
        self
    }

    pub fn with_normalization(mut self, algo: impl Into<String>) -> Self {
        self.normalization_algo = Some(algo.into());
        self
    }

    pub fn with_root_certs(mut self, roots: RootCertificates) -> Self {
        self.root_certs = Some(roots);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn Hasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_digesters(mut self, digesters: Arc<BlobDigesterRegistry>) -> Self {
        self.digesters = Some(digesters);
        self
    }

    /// Fill in defaults and check consistency.
    ///
    /// # Errors
    ///
    /// - [`SigningError::Configuration`] for an unknown normalization or a
    ///   signer without exactly one signature name.
    /// - [`SigningError::NotFound`] for a missing private key (signing) or
    ///   a missing public key of an explicitly named signature (verifying).
    pub fn complete(&mut self) -> Result<(), SigningError> {
        let registry = self.registry.get_or_insert_with(default_registry).clone();
        if self.hasher.is_none() {
            self.hasher = Some(registry.get_hasher(SHA256).ok_or_else(|| SigningError::UnknownAlgorithm {
                kind: "hash algorithm",
                name: SHA256.to_string(),
            })?);
        }
        let algo = self.normalization_algo.get_or_insert_with(|| JSON_NORMALISATION_V1.to_string());
        if !is_supported_normalisation(algo) {
            return Err(SigningError::Configuration(format!("unknown normalization algorithm {algo:?}")));
        }
        if self.digesters.is_none() {
            self.digesters = Some(Arc::new(BlobDigesterRegistry::with_builtin_digesters()));
        }

        if self.signer.is_some() {
            if self.signature_names.len() != 1 {
                return Err(SigningError::Configuration(format!(
                    "signing requires exactly one signature name, got {}",
                    self.signature_names.len()
                )));
            }
            let name = &self.signature_names[0];
            if self.private_key(name).is_none() {
                return Err(SigningError::NotFound {
                    kind: "private key",
                    name: name.clone(),
                });
            }
        }

        if self.verify_signature {
            for name in &self.signature_names {
                if self.public_key(name)?.is_none() {
                    return Err(SigningError::NotFound {
                        kind: "public key",
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Options for walking a reference that carries `digest`.
    pub fn for_reference(&self, digest: Option<&DigestSpec>) -> Result<Options, SigningError> {
        let mut opts = self.clone();
        if !self.recursively {
            opts.update = false;
            opts.signer = None;
        }
        if self.verify_signature {
            opts.verify_digests = true;
        }
        opts.verify_signature = false;
        if let Some(d) = digest {
            let registry = self.registry()?;
            opts.hasher = Some(registry.get_hasher(&d.hash_algorithm).ok_or_else(|| {
                SigningError::UnknownAlgorithm {
                    kind: "hash algorithm",
                    name: d.hash_algorithm.clone(),
                }
            })?);
            if !is_supported_normalisation(&d.normalisation_algorithm) {
                return Err(SigningError::UnknownAlgorithm {
                    kind: "normalization algorithm",
                    name: d.normalisation_algorithm.clone(),
                });
            }
            opts.normalization_algo = Some(d.normalisation_algorithm.clone());
        }
        Ok(opts)
    }

    pub fn do_sign(&self) -> bool {
        self.signer.is_some() && self.signature_name().is_some()
    }

    pub fn do_verify(&self) -> bool {
        self.verify_signature
    }

    pub fn do_update(&self) -> bool {
        self.update || self.do_sign()
    }

    /// Name of the signature to create.
    pub fn signature_name(&self) -> Option<&str> {
        self.signature_names.first().map(String::as_str)
    }

    /// Whether `name` was explicitly requested.
    pub fn signature_configured(&self, name: &str) -> bool {
        self.signature_names.iter().any(|n| n == name)
    }

    pub(crate) fn registry(&self) -> Result<&Registry, SigningError> {
        self.registry.as_ref().ok_or_else(incomplete)
    }

    pub(crate) fn hasher(&self) -> Result<&Arc<dyn Hasher>, SigningError> {
        self.hasher.as_ref().ok_or_else(incomplete)
    }

    pub(crate) fn normalization(&self) -> Result<&str, SigningError> {
        self.normalization_algo.as_deref().ok_or_else(incomplete)
    }

    pub(crate) fn blob_digesters(&self) -> Result<&Arc<BlobDigesterRegistry>, SigningError> {
        self.digesters.as_ref().ok_or_else(incomplete)
    }

    /// Public key for signature `name`.
    ///
    /// Looks in `keys`, then the registry. When signing under `name`
    /// without a registered public key, the key is derived from the
    /// private key. Certificate keys are validated against `root_certs`
    /// and the certified key is returned.
    pub fn public_key(&self, name: &str) -> Result<Option<Arc<PublicKey>>, SigningError> {
        let found = self
            .keys
            .as_ref()
            .and_then(|k| k.get_public_key(name))
            .or_else(|| self.registry.as_ref().and_then(|r| r.get_public_key(name)));
        let key = match found {
            Some(k) => k,
            None => {
                if self.signer.is_some() && self.signature_name() == Some(name) {
                    return Ok(self.private_key(name).map(|sk| Arc::new(sk.public_key())));
                }
                return Ok(None);
            }
        };
        match key.as_ref() {
            PublicKey::Certificate(chain) => {
                let roots = self.root_certs.clone().unwrap_or_default();
                let certified = verify_chain(chain, &roots)?;
                tracing::debug!(signature = %name, subject = %chain.certificate.subject, "using certified public key");
                Ok(Some(Arc::new(certified)))
            }
            _ => Ok(Some(key)),
        }
    }

    pub fn private_key(&self, name: &str) -> Option<Arc<PrivateKey>> {
        self.keys
            .as_ref()
            .and_then(|k| k.get_private_key(name))
            .or_else(|| self.registry.as_ref().and_then(|r| r.get_private_key(name)))
    }
}

fn incomplete() -> SigningError {
    SigningError::Configuration("options not completed".to_string())
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("signer", &self.signer.as_ref().map(|s| s.algorithm().to_string()))
            .field("recursively", &self.recursively)
            .field("verify_digests", &self.verify_digests)
            .field("verify_signature", &self.verify_signature)
            .field("update", &self.update)
            .field("skip_access_types", &self.skip_access_types)
            .field("signature_names", &self.signature_names)
            .field("normalization_algo", &self.normalization_algo)
            .field("hasher", &self.hasher.as_ref().map(|h| h.algorithm().to_string()))
            .field("issuer", &self.issuer)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
