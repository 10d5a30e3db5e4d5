//! # Key Configuration
//!
//! Public keys, private keys and trusted root certificates can be supplied
//! as a YAML (or JSON) document:
//!
//! ```yaml
//! type: keys.config.cvsign/v1
//! publicKeys:
//!   acme:
//!     data: "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29"
//!   legacy:
//!     path: keys/legacy.pub.pem
//! privateKeys:
//!   acme:
//!     path: keys/acme.key
//! rootCertificates:
//!   root-ca:
//!     data: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c"
//! ```
//!
//! Hex values should be quoted; an all-digit hex string is otherwise read
//! as a YAML number. Relative `path` entries are resolved against the directory of the
//! configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cvsign_crypto::{CertificateChain, CryptoError, KeyRegistry, PrivateKey, PublicKey, RootCertificates};

use crate::error::ConfigError;

/// Value of the `type` field.
pub const KEY_CONFIG_TYPE: &str = "keys.config.cvsign/v1";

/// Where a key comes from. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySource {
    /// Inline PEM or hex text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// A certificate chain; public keys only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateChain>,
}

impl KeySource {
    pub fn data(text: impl Into<String>) -> Self {
        Self {
            data: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn certificate(chain: CertificateChain) -> Self {
        Self {
            certificate: Some(chain),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfig {
    #[serde(rename = "type")]
    pub config_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub public_keys: BTreeMap<String, KeySource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub private_keys: BTreeMap<String, KeySource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub root_certificates: BTreeMap<String, KeySource>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl KeyConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.checked()
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.checked()
    }

    /// Load a YAML file. Relative key paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read(path)?;
        let mut cfg = Self::from_yaml_str(&text)?;
        cfg.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(path = %path.display(), public = cfg.public_keys.len(), private = cfg.private_keys.len(), "key configuration loaded");
        Ok(cfg)
    }

    fn checked(self) -> Result<Self, ConfigError> {
        if self.config_type != KEY_CONFIG_TYPE {
            return Err(ConfigError::UnsupportedType(self.config_type));
        }
        Ok(self)
    }

    /// Key text of `source`; `None` for certificates.
    fn resolve(&self, name: &str, source: &KeySource) -> Result<Option<String>, ConfigError> {
        match (&source.data, &source.path, &source.certificate) {
            (Some(d), None, None) => Ok(Some(d.clone())),
            (None, Some(p), None) => {
                let full = match &self.base_dir {
                    Some(dir) if p.is_relative() => dir.join(p),
                    _ => p.clone(),
                };
                read(&full).map(Some)
            }
            (None, None, Some(_)) => Ok(None),
            _ => Err(ConfigError::Key {
                name: name.to_string(),
                source: CryptoError::Key("exactly one of data, path or certificate must be set".to_string()),
            }),
        }
    }

    /// Register all public and private keys in `registry`.
    pub fn apply_to_registry(&self, registry: &KeyRegistry) -> Result<(), ConfigError> {
        for (name, source) in &self.public_keys {
            let key = match (self.resolve(name, source)?, &source.certificate) {
                (Some(text), _) => PublicKey::parse(&text).map_err(|source| ConfigError::Key {
                    name: name.clone(),
                    source,
                })?,
                (None, Some(chain)) => PublicKey::Certificate(chain.clone()),
                (None, None) => continue,
            };
            registry.register_public_key(name.clone(), key);
        }
        for (name, source) in &self.private_keys {
            let Some(text) = self.resolve(name, source)? else {
                return Err(ConfigError::Key {
                    name: name.clone(),
                    source: CryptoError::Key("private keys cannot be certificates".to_string()),
                });
            };
            let key = PrivateKey::parse(&text).map_err(|source| ConfigError::Key {
                name: name.clone(),
                source,
            })?;
            registry.register_private_key(name.clone(), key);
        }
        Ok(())
    }

    /// Trusted issuer keys. Roots must be Ed25519 keys.
    pub fn root_certificates(&self) -> Result<RootCertificates, ConfigError> {
        let mut roots = RootCertificates::new();
        for (name, source) in &self.root_certificates {
            let invalid = |reason: String| ConfigError::InvalidRoot {
                name: name.clone(),
                reason,
            };
            let text = self
                .resolve(name, source)?
                .ok_or_else(|| invalid("a root must be a plain key".to_string()))?;
            match PublicKey::parse(&text).map_err(|e| invalid(e.to_string()))? {
                PublicKey::Ed25519(k) => roots.add(name.clone(), k),
                other => return Err(invalid(format!("expected Ed25519 key, got {}", other.kind()))),
            }
        }
        Ok(roots)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
