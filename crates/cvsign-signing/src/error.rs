//! # Signing Error Types
//!
//! [`SigningError`] covers everything that can go wrong while walking a
//! component version graph. Errors raised below a component reference or
//! a resource are wrapped in [`SigningError::Reference`] /
//! [`SigningError::Resource`], which carry the walk history
//! (`a:v1->b:v1`) at the point of failure. [`SigningError::kind()`] looks
//! through any number of wrappers and classifies the root cause.

use thiserror::Error;

use cvsign_core::{DigestSpec, IdentityError, NormalizationError};
use cvsign_crypto::{CertificateError, CryptoError};

/// Failure of a repository or blob access.
#[derive(Error, Debug)]
pub enum AccessError {
    /// The requested element does not exist.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    /// Reading or writing failed.
    #[error("access failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while loading key configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML key configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON key configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The `type` field names an unknown configuration format.
    #[error("unsupported key configuration type {0:?}")]
    UnsupportedType(String),

    #[error("invalid key {name:?}: {source}")]
    Key {
        name: String,
        #[source]
        source: CryptoError,
    },

    #[error("invalid root certificate {name:?}: {reason}")]
    InvalidRoot { name: String, reason: String },
}

/// Root-cause classification of a [`SigningError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    Integrity,
    NoSignature,
    Certificate,
    Cycle,
    Access,
    Crypto,
    Normalization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not found",
            Self::Integrity => "integrity",
            Self::NoSignature => "no signature",
            Self::Certificate => "certificate",
            Self::Cycle => "cycle",
            Self::Access => "access",
            Self::Crypto => "crypto",
            Self::Normalization => "normalization",
        };
        f.write_str(s)
    }
}

/// Errors from digest propagation, signing and verification.
#[derive(Error, Debug)]
pub enum SigningError {
    /// Options are inconsistent or incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A named key, component version or handler could not be found.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("unknown {kind} {name:?}")]
    UnknownAlgorithm { kind: &'static str, name: String },

    /// A reference has no digest and the walk may not fill it in.
    #[error("no digest given and update disabled")]
    MissingDigest,

    /// No digester produced a digest for a resource.
    #[error("no digester accepts resource type {resource_type:?} with access {access_type:?}")]
    NoDigester {
        resource_type: String,
        access_type: String,
    },

    /// A resource has content but no access method.
    #[error("no access method for access type {0:?}")]
    NoAccessMethod(String),

    /// A stored digest differs from the recomputed one.
    #[error("calculated digest {calculated} mismatches existing digest {existing}")]
    DigestMismatch {
        calculated: DigestSpec,
        existing: DigestSpec,
    },

    /// The digest recorded with a signature differs from the recomputed
    /// descriptor digest.
    #[error("signature {name:?} was made for digest {recorded}, but descriptor digest is {calculated}")]
    SignatureDigestMismatch {
        name: String,
        recorded: DigestSpec,
        calculated: DigestSpec,
    },

    /// Resource digests of a component version differ from a preset.
    #[error("digest set for {0} does not match")]
    DigestSetMismatch(String),

    /// A signature did not verify.
    #[error("signature {name:?} verification failed: {source}")]
    InvalidSignature {
        name: String,
        #[source]
        source: CryptoError,
    },

    /// Verification was requested but the descriptor has no signatures.
    #[error("no signature found in {0}")]
    NoSignature(String),

    /// None of the target signatures could be verified.
    #[error("no verifiable signature found in {0}")]
    NoVerifiableSignature(String),

    /// A component version references itself transitively.
    #[error("component version reference cycle: {0}")]
    Cycle(String),

    #[error("signer reported issuer {reported:?}, but {configured:?} is configured")]
    IssuerMismatch { reported: String, configured: String },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Failure below a component reference.
    #[error("component reference {reference:?} [{key}] in {history}: {source}")]
    Reference {
        reference: String,
        key: String,
        history: String,
        #[source]
        source: Box<SigningError>,
    },

    /// Failure while digesting a resource.
    #[error("resource {resource} in {history}: {source}")]
    Resource {
        resource: String,
        history: String,
        #[source]
        source: Box<SigningError>,
    },
}

impl SigningError {
    /// Classify the root cause, looking through wrapping variants.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Reference { source, .. } | Self::Resource { source, .. } => source.kind(),
            Self::Configuration(_)
            | Self::MissingDigest
            | Self::IssuerMismatch { .. }
            | Self::Config(_) => ErrorKind::Configuration,
            Self::NotFound { .. } | Self::UnknownAlgorithm { .. } | Self::NoDigester { .. } => {
                ErrorKind::NotFound
            }
            Self::DigestMismatch { .. }
            | Self::SignatureDigestMismatch { .. }
            | Self::DigestSetMismatch(_)
            | Self::InvalidSignature { .. } => ErrorKind::Integrity,
            Self::NoSignature(_) | Self::NoVerifiableSignature(_) => ErrorKind::NoSignature,
            Self::Cycle(_) => ErrorKind::Cycle,
            Self::Access(AccessError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Access(_) | Self::NoAccessMethod(_) => ErrorKind::Access,
            Self::Certificate(_) | Self::Crypto(CryptoError::Certificate(_)) => ErrorKind::Certificate,
            Self::Crypto(CryptoError::UnknownAlgorithm { .. }) => ErrorKind::NotFound,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Normalization(_) | Self::Identity(_) => ErrorKind::Normalization,
        }
    }

    /// The innermost error below any reference/resource wrappers.
    pub fn root_cause(&self) -> &SigningError {
        match self {
            Self::Reference { source, .. } | Self::Resource { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
