//! # Key Certificates
//!
//! A [`KeyCertificate`] binds a subject name to a public key and is signed
//! by an issuer with Ed25519 over the JCS canonical bytes of its body
//! (subject, issuer, key). Trust is anchored in [`RootCertificates`]: a
//! map from issuer name to the issuer's Ed25519 public key.
//!
//! [`verify_chain()`] follows issuer links through intermediate
//! certificates until a trusted root is reached, and returns the certified
//! key. Chains are limited to [`MAX_CHAIN_DEPTH`] certificates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cvsign_core::CanonicalBytes;

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::{CertificateError, CryptoError};
use crate::keys::PublicKey;

/// Maximum number of certificates in a chain, leaf included.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Encoded key inside a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CertifiedKey {
    /// Hex Ed25519 public key.
    Ed25519(String),
    /// SPKI PEM RSA public key.
    #[serde(rename = "RSA")]
    Rsa(String),
}

impl CertifiedKey {
    /// Encode a plain public key.
    pub fn from_public_key(key: &PublicKey) -> Result<Self, CryptoError> {
        match key {
            PublicKey::Ed25519(k) => Ok(Self::Ed25519(k.to_hex())),
            PublicKey::Rsa(_) => Ok(Self::Rsa(key.to_text()?)),
            PublicKey::Certificate(_) => Err(CryptoError::Key(
                "a certificate cannot certify another certificate".to_string(),
            )),
        }
    }

    /// Decode into a usable public key.
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        match self {
            Self::Ed25519(data) => Ed25519PublicKey::from_hex(data).map(PublicKey::Ed25519),
            Self::Rsa(data) => match PublicKey::parse(data)? {
                k @ PublicKey::Rsa(_) => Ok(k),
                other => Err(CryptoError::Key(format!("expected RSA key, got {}", other.kind()))),
            },
        }
    }
}

#[derive(Serialize)]
struct CertificateBody<'a> {
    subject: &'a str,
    issuer: &'a str,
    key: &'a CertifiedKey,
}

/// A public key certified by an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCertificate {
    pub subject: String,
    pub issuer: String,
    pub key: CertifiedKey,
    /// Hex Ed25519 signature of the issuer over the canonical body.
    pub signature: String,
}

impl KeyCertificate {
    /// Issue a certificate for `key` signed by `issuer_key`.
    pub fn issue(
        subject: impl Into<String>,
        key: &PublicKey,
        issuer: impl Into<String>,
        issuer_key: &Ed25519KeyPair,
    ) -> Result<Self, CryptoError> {
        let mut cert = Self {
            subject: subject.into(),
            issuer: issuer.into(),
            key: CertifiedKey::from_public_key(key)?,
            signature: String::new(),
        };
        cert.signature = issuer_key.sign(&cert.body()?).to_hex();
        Ok(cert)
    }

    fn body(&self) -> Result<CanonicalBytes, CertificateError> {
        Ok(CanonicalBytes::new(&CertificateBody {
            subject: &self.subject,
            issuer: &self.issuer,
            key: &self.key,
        })?)
    }

    /// Check the issuer signature with `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &Ed25519PublicKey) -> Result<(), CertificateError> {
        let bad = || CertificateError::BadSignature {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
        };
        let sig = Ed25519Signature::from_hex(&self.signature).map_err(|_| bad())?;
        issuer_key.verify(&self.body()?, &sig).map_err(|_| bad())
    }

    fn issuer_public_key(&self) -> Result<Ed25519PublicKey, CertificateError> {
        match &self.key {
            CertifiedKey::Ed25519(data) => {
                Ed25519PublicKey::from_hex(data).map_err(|e| CertificateError::MalformedKey {
                    subject: self.subject.clone(),
                    reason: e.to_string(),
                })
            }
            CertifiedKey::Rsa(_) => Err(CertificateError::MalformedKey {
                subject: self.subject.clone(),
                reason: "only Ed25519 keys may issue certificates".to_string(),
            }),
        }
    }
}

/// A leaf certificate plus the intermediates needed to reach a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateChain {
    pub certificate: KeyCertificate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediates: Vec<KeyCertificate>,
}

impl CertificateChain {
    pub fn new(certificate: KeyCertificate) -> Self {
        Self {
            certificate,
            intermediates: Vec::new(),
        }
    }

    pub fn with_intermediate(mut self, cert: KeyCertificate) -> Self {
        self.intermediates.push(cert);
        self
    }
}

/// Trusted issuer keys by issuer name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootCertificates {
    roots: BTreeMap<String, Ed25519PublicKey>,
}

impl RootCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issuer: impl Into<String>, key: Ed25519PublicKey) {
        self.roots.insert(issuer.into(), key);
    }

    pub fn get(&self, issuer: &str) -> Option<&Ed25519PublicKey> {
        self.roots.get(issuer)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }
}

/// Validate `chain` against `roots` and return the certified key.
///
/// # Errors
///
/// [`CertificateError`] if an issuer is not trusted, a signature is
/// invalid, the chain is longer than [`MAX_CHAIN_DEPTH`], or a key is
/// malformed.
pub fn verify_chain(chain: &CertificateChain, roots: &RootCertificates) -> Result<PublicKey, CertificateError> {
    let mut current = &chain.certificate;
    for _ in 0..MAX_CHAIN_DEPTH {
        if let Some(root) = roots.get(&current.issuer) {
            current.verify_signature(root)?;
            tracing::debug!(subject = %chain.certificate.subject, root = %current.issuer, "certificate chain verified");
            return chain
                .certificate
                .key
                .to_public_key()
                .map_err(|e| CertificateError::MalformedKey {
                    subject: chain.certificate.subject.clone(),
                    reason: e.to_string(),
                });
        }
        let parent = chain
            .intermediates
            .iter()
            .find(|c| c.subject == current.issuer)
            .ok_or_else(|| CertificateError::UntrustedIssuer(current.issuer.clone()))?;
        current.verify_signature(&parent.issuer_public_key()?)?;
        current = parent;
    }
    Err(CertificateError::ChainTooLong(MAX_CHAIN_DEPTH))
}
