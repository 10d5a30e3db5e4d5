//! # cvsign-crypto — Algorithm Handlers and Registries
//!
//! Provides the cryptographic building blocks for descriptor signing:
//!
//! - **Hashers**: `SHA-256` and `SHA-512`, one-shot over `CanonicalBytes`
//!   or incremental for blob content.
//! - **Signature handlers**: `RSASSA-PKCS1-V1_5` and `Ed25519`, both
//!   signing the decoded descriptor digest.
//! - **Keys**: public/private key enums, PEM and hex parsing, and key
//!   certificates validated against trusted roots.
//! - **Registries**: layered, parent-delegating tables of handlers and
//!   keys, plus process-wide defaults.
//!
//! ## Crate Policy
//!
//! - Depends only on `cvsign-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   SHA-2, real RSA and real Ed25519.
//! - Private keys are never serialized or logged.

pub mod certificate;
pub mod ed25519;
pub mod error;
pub mod handler;
pub mod hasher;
pub mod keys;
pub mod registry;
pub mod rsassa;

pub use certificate::{verify_chain, CertificateChain, KeyCertificate, RootCertificates};
pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, Ed25519SignatureHandler, ED25519};
pub use error::{CertificateError, CryptoError};
pub use handler::{Signer, Verifier};
pub use hasher::{Hasher, Sha256Hasher, Sha512Hasher, SHA256, SHA512};
pub use keys::{PrivateKey, PublicKey};
pub use registry::{
    default_handler_registry, default_key_registry, default_registry, HandlerRegistry, KeyRegistry,
    Registry,
};
pub use rsassa::{RsaSignatureHandler, RSASSA_PKCS1_V1_5};
