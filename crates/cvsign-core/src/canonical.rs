//! # Canonical Bytes — The Only Input to Descriptor Hashing
//!
//! `CanonicalBytes` is the sole construction path for bytes that are hashed
//! or signed anywhere in the workspace.
//!
//! ## Security Invariant
//!
//! The inner field is private. Canonical bytes are produced either by
//! [`CanonicalBytes::new()`] (RFC 8785 / JCS over any serializable value,
//! used for certificates and other small records) or by the normalization
//! engine (`normalize::Normalized::to_canonical`). Any function that needs
//! digest input takes `&CanonicalBytes`, so the wrong serialization path
//! cannot be used by accident.
//!
//! ## Coercion Rules
//!
//! 1. **Reject floats** in records passed to [`CanonicalBytes::new()`]:
//!    certificates and other records carry integers only. Descriptor data
//!    goes through the normalization engine instead, which writes
//!    non-integer numbers in their JCS form.
//! 2. **Sorted keys, compact separators**: delegated to `serde_jcs`.

use serde::Serialize;
use serde_json::Value;

use crate::error::NormalizationError;

/// Bytes produced exclusively by a canonicalization pipeline.
///
/// # Invariants
///
/// - Object keys are sorted; separators are compact (JCS), or the bytes are
///   a normalized descriptor encoding.
/// - No non-integer numbers in bytes built by [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value with JCS.
    ///
    /// # Errors
    ///
    /// Returns `NormalizationError::FloatRejected` if the value contains a
    /// non-integer number and `NormalizationError::Serialization` if JSON
    /// conversion fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, NormalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value, "$")?;
        Ok(Self(serde_jcs::to_vec(&value)?))
    }

    /// Wrap bytes produced by the normalization engine.
    pub(crate) fn from_normalized(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk a JSON value and fail on the first non-integer number.
pub(crate) fn reject_floats(value: &Value, path: &str) -> Result<(), NormalizationError> {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    return Err(NormalizationError::FloatRejected {
                        value: f,
                        path: path.to_string(),
                    });
                }
            }
            Ok(())
        }
        Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| reject_floats(v, &format!("{path}.{k}"))),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .try_for_each(|(i, v)| reject_floats(v, &format!("{path}[{i}]"))),
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}
