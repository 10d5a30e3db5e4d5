//! # Normalization Engine
//!
//! Converts a structured value plus an [`ExcludeRules`] tree into a
//! [`Normalized`] tree, then serializes that tree into [`CanonicalBytes`].
//!
//! ## Determinism
//!
//! Object fields are held in a `BTreeMap`, so they always enumerate in
//! lexicographic order of their final (post-rename) names, independent of
//! the order the source document used. Arrays keep source order: the order
//! of resources and references is part of the signed identity.
//!
//! `null` field values are dropped, so an absent optional field and an
//! explicit `null` normalize identically.
//!
//! Non-integer numbers are rewritten into their RFC 8785 (ECMAScript)
//! form before encoding, so `1.50`, `1.5` and `15e-1` all normalize to
//! `1.5`, and `2.0` normalizes to the integer `2`.
//!
//! ## Encodings
//!
//! | Algorithm | Encoding |
//! |---|---|
//! | `jsonNormalisation/v1` | each object becomes an array of single-entry objects, sorted by key; compact JSON |
//! | `jsonNormalisation/v2` | empty containers removed, then RFC 8785 (JCS) |

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::canonical::CanonicalBytes;
use crate::digest::{JSON_NORMALISATION_V1, JSON_NORMALISATION_V2};
use crate::error::NormalizationError;
use crate::rules::ExcludeRules;

/// Normalization algorithms understood by [`Normalized::to_canonical()`].
pub const SUPPORTED_NORMALISATIONS: &[&str] = &[JSON_NORMALISATION_V1, JSON_NORMALISATION_V2];

/// Returns true if `algo` names a supported normalization algorithm.
pub fn is_supported_normalisation(algo: &str) -> bool {
    SUPPORTED_NORMALISATIONS.contains(&algo)
}

/// A value after rule application.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Object with fields in sorted order.
    Object(BTreeMap<String, Normalized>),
    /// Array in source order.
    Array(Vec<Normalized>),
    /// Scalar (string, number, bool).
    Value(Value),
}

/// Apply `rules` to the serialized form of `value`.
///
/// # Errors
///
/// [`NormalizationError::RuleShape`] if the rule tree does not fit the value.
pub fn prepare_normalization(
    value: &impl Serialize,
    rules: &ExcludeRules,
) -> Result<Normalized, NormalizationError> {
    let value = serde_json::to_value(value)?;
    prepare_value(&value, rules, "$")
}

/// Normalize and encode in one step.
pub fn normalize(
    value: &impl Serialize,
    rules: &ExcludeRules,
    algo: &str,
) -> Result<CanonicalBytes, NormalizationError> {
    prepare_normalization(value, rules)?.to_canonical(algo)
}

fn prepare_value(
    value: &Value,
    rules: &ExcludeRules,
    path: &str,
) -> Result<Normalized, NormalizationError> {
    match value {
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (name, field) in map {
                if field.is_null() {
                    continue;
                }
                let field_path = format!("{path}.{name}");
                if let Some(decision) = rules.field(name, field, &field_path)? {
                    if decision.value.is_null() {
                        continue;
                    }
                    let normalized = prepare_value(&decision.value, decision.rules, &field_path)?;
                    fields.insert(decision.name, normalized);
                }
            }
            Ok(Normalized::Object(fields))
        }
        Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                if let Some(decision) = rules.element(item, &item_path)? {
                    elements.push(prepare_value(&decision.value, decision.rules, &item_path)?);
                }
            }
            Ok(Normalized::Array(elements))
        }
        Value::Number(n) if n.is_f64() => Ok(Normalized::Value(canonical_number(n)?)),
        scalar => Ok(Normalized::Value(scalar.clone())),
    }
}

/// The number as JCS writes it, parsed back into a JSON value.
fn canonical_number(n: &serde_json::Number) -> Result<Value, NormalizationError> {
    let text = serde_jcs::to_string(n)?;
    Ok(serde_json::from_str(&text)?)
}

impl Normalized {
    /// Returns true for an empty object or array.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Self::Object(m) => m.is_empty(),
            Self::Array(a) => a.is_empty(),
            Self::Value(_) => false,
        }
    }

    /// Drop fields and elements whose normalized value is an empty
    /// container. The root itself is kept even if it becomes empty.
    pub fn exclude_empty(&self) -> Normalized {
        match self {
            Self::Object(m) => Self::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.exclude_empty()))
                    .filter(|(_, v)| !v.is_empty_container())
                    .collect(),
            ),
            Self::Array(a) => Self::Array(
                a.iter()
                    .map(Normalized::exclude_empty)
                    .filter(|v| !v.is_empty_container())
                    .collect(),
            ),
            Self::Value(v) => Self::Value(v.clone()),
        }
    }

    /// Plain JSON form with objects as maps.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(m) => Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_value())).collect()),
            Self::Array(a) => Value::Array(a.iter().map(Normalized::to_value).collect()),
            Self::Value(v) => v.clone(),
        }
    }

    /// JSON form with every object rewritten as a sorted list of
    /// single-entry objects.
    pub fn to_entry_value(&self) -> Value {
        match self {
            Self::Object(m) => Value::Array(
                m.iter()
                    .map(|(k, v)| {
                        let mut entry = serde_json::Map::with_capacity(1);
                        entry.insert(k.clone(), v.to_entry_value());
                        Value::Object(entry)
                    })
                    .collect(),
            ),
            Self::Array(a) => Value::Array(a.iter().map(Normalized::to_entry_value).collect()),
            Self::Value(v) => v.clone(),
        }
    }

    /// Encode with the named normalization algorithm.
    ///
    /// # Errors
    ///
    /// [`NormalizationError::UnsupportedAlgorithm`] for unknown names.
    pub fn to_canonical(&self, algo: &str) -> Result<CanonicalBytes, NormalizationError> {
        let bytes = match algo {
            JSON_NORMALISATION_V1 => serde_json::to_vec(&self.to_entry_value())?,
            JSON_NORMALISATION_V2 => serde_jcs::to_vec(&self.exclude_empty().to_value())?,
            other => return Err(NormalizationError::UnsupportedAlgorithm(other.to_string())),
        };
        Ok(CanonicalBytes::from_normalized(bytes))
    }

    /// Indented, human-readable rendering for diagnostics.
    ///
    /// Strings are printed unquoted; empty arrays render as `[]`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, "");
        out
    }

    fn write_text(&self, out: &mut String, indent: &str) {
        let inner = format!("{indent}  ");
        match self {
            Self::Object(m) if m.is_empty() => out.push_str("{}"),
            Self::Object(m) => {
                out.push_str("{\n");
                for (k, v) in m {
                    out.push_str(&inner);
                    out.push_str(k);
                    out.push_str(": ");
                    v.write_text(out, &inner);
                    out.push('\n');
                }
                out.push_str(indent);
                out.push('}');
            }
            Self::Array(a) if a.is_empty() => out.push_str("[]"),
            Self::Array(a) => {
                out.push_str("[\n");
                for v in a {
                    out.push_str(&inner);
                    v.write_text(out, &inner);
                    out.push('\n');
                }
                out.push_str(indent);
                out.push(']');
            }
            Self::Value(Value::String(s)) => out.push_str(s),
            Self::Value(v) => out.push_str(&v.to_string()),
        }
    }
}
