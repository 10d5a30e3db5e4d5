//! # cvsign-core — Descriptor Model and Normalization
//!
//! This crate is the leaf of the cvsign workspace. It defines the component
//! descriptor model and everything needed to turn a descriptor into the
//! deterministic byte sequence that is hashed and signed.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every byte sequence that is hashed or
//!    signed is a `CanonicalBytes`, produced either by JCS
//!    (`CanonicalBytes::new()`) or by the normalization engine. Hashers in
//!    `cvsign-crypto` only accept `&CanonicalBytes` for descriptor digests.
//!
//! 2. **Rule trees instead of ad-hoc field stripping.** What part of a
//!    descriptor is signed is declared once as an [`ExcludeRules`] tree
//!    ([`descriptor_exclude_rules()`]). A rule tree that does not fit the
//!    document is a typed error.
//!
//! 3. **Order-independent objects, order-preserving arrays.** Field order in
//!    the source document never changes a digest. Array order always does.
//!
//! 4. **Validated identities.** [`ComponentVersionKey`] cannot be built with
//!    an empty name and is totally ordered.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cvsign-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod rules;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use descriptor::{
    AccessSpec, ComponentDescriptor, ComponentReference, Label, NestedComponentDigests,
    NestedResourceDigest, Resource, Signature, SignatureSpec, Source,
};
pub use digest::{
    DigestSpec, EXCLUDE_FROM_SIGNATURE, GENERIC_BLOB_DIGEST_V1, JSON_NORMALISATION_V1,
    JSON_NORMALISATION_V2, NO_DIGEST, OCI_ARTIFACT_DIGEST_V1,
};
pub use error::{IdentityError, NormalizationError};
pub use identity::ComponentVersionKey;
pub use normalize::{normalize, prepare_normalization, Normalized};
pub use rules::{descriptor_exclude_rules, DynamicArrayExcludes, DynamicEntry, ExcludeRules};
