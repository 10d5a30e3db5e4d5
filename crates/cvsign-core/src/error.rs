//! # Error Types — Core Error Hierarchy
//!
//! Errors raised while building identities and while canonicalizing or
//! normalizing descriptor data. All errors use `thiserror` for derive-based
//! `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Rule-tree misuse (a map rule applied to an array or the reverse) is a
//!   configuration error carrying the offending value path. It is never
//!   silently ignored.
//! - Normalizeability violations name the resource or reference at fault.

use thiserror::Error;

/// Error during canonical serialization or descriptor normalization.
#[derive(Error, Debug)]
pub enum NormalizationError {
    /// A rule of one shape was applied to a value of another shape.
    #[error("invalid exclude structure at {path}: {rule} rules require {expected} but found {found}")]
    RuleShape {
        /// Name of the rule variant that was invoked.
        rule: &'static str,
        /// The value shape the rule supports.
        expected: &'static str,
        /// The value shape actually encountered.
        found: &'static str,
        /// Dotted path of the value inside the normalized document.
        path: String,
    },

    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {value} at {path}")]
    FloatRejected {
        /// The rejected value.
        value: f64,
        /// Dotted path of the value.
        path: String,
    },

    /// The descriptor lacks digests required for normalization.
    #[error("descriptor {component} is not normalizeable: {reason}")]
    NotNormalizeable {
        /// `name:version` of the descriptor.
        component: String,
        /// What is missing or inconsistent.
        reason: String,
    },

    /// The requested normalization algorithm is unknown.
    #[error("unsupported normalization algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error constructing a component identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Component names must not be empty.
    #[error("component name must not be empty")]
    EmptyName,

    /// A `name:version` string could not be split.
    #[error("invalid component version key {0:?}: expected <name>:<version>")]
    InvalidKey(String),
}
