//! # Identity — Component Version Keys
//!
//! A component version is identified by its `(name, version)` pair. Keys
//! are totally ordered (name, then version) so they can index sorted maps,
//! which keeps every map-derived output (nested digest lists, error
//! messages) deterministic.

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Identity of one vertex in the component reference graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentVersionKey {
    name: String,
    version: String,
}

impl ComponentVersionKey {
    /// Create a key. The name must not be empty.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IdentityError::EmptyName);
        }
        Ok(Self {
            name,
            version: version.into(),
        })
    }

    /// Parse `name:version`, splitting at the last colon.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let (name, version) = s
            .rsplit_once(':')
            .ok_or_else(|| IdentityError::InvalidKey(s.to_string()))?;
        Self::new(name, version)
    }

    /// The component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component version.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl std::fmt::Display for ComponentVersionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}
