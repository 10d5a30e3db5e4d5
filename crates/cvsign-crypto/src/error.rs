//! # Cryptographic Error Types
//!
//! Structured errors for hashing, signing, verification, key parsing and
//! certificate chain validation.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// No handler is registered under the algorithm name.
    #[error("unknown {kind} {name:?}")]
    UnknownAlgorithm {
        /// `hash algorithm`, `signing algorithm`, ...
        kind: &'static str,
        name: String,
    },

    /// Key parsing failed or the key kind does not fit the handler.
    #[error("key error: {0}")]
    Key(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature did not verify.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// The digest has the wrong size for the hash algorithm.
    #[error("digest for {algorithm} must be {expected} bytes, got {actual}")]
    DigestLength {
        algorithm: String,
        expected: usize,
        actual: usize,
    },

    /// A public key presented as a certificate failed validation.
    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// Errors from key certificate validation.
#[derive(Error, Debug)]
pub enum CertificateError {
    /// No root certificate and no intermediate covers the issuer.
    #[error("issuer {0:?} is not trusted")]
    UntrustedIssuer(String),

    /// A certificate's signature does not verify with its issuer's key.
    #[error("invalid signature on certificate for {subject:?} issued by {issuer:?}")]
    BadSignature { subject: String, issuer: String },

    /// The chain exceeds the maximum depth.
    #[error("certificate chain longer than {0}")]
    ChainTooLong(usize),

    /// The certified key or the issuer key cannot be decoded.
    #[error("malformed key in certificate for {subject:?}: {reason}")]
    MalformedKey { subject: String, reason: String },

    /// Canonicalization of the signed certificate body failed.
    #[error("certificate canonicalization failed: {0}")]
    Canonicalization(#[from] cvsign_core::NormalizationError),
}
