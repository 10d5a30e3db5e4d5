//! # Component Descriptor Model
//!
//! The signed record of one component version: provider metadata, labels,
//! ordered resources, sources and component references, the signatures
//! over its normalized digest, and an optional cache of digests of
//! transitively referenced versions (`nestedDigests`).
//!
//! Serialization uses the camelCase field names of the descriptor
//! document. Which fields participate in the descriptor digest is decided
//! by [`descriptor_exclude_rules()`], not by this model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CanonicalBytes;
use crate::digest::DigestSpec;
use crate::error::{IdentityError, NormalizationError};
use crate::identity::ComponentVersionKey;
use crate::normalize::prepare_normalization;
use crate::rules::descriptor_exclude_rules;

/// Access type of resources without content.
pub const ACCESS_TYPE_NONE: &str = "none";

/// Access type of blobs stored alongside the descriptor.
pub const ACCESS_TYPE_LOCAL_BLOB: &str = "localBlob";

/// Access type of OCI artifacts.
pub const ACCESS_TYPE_OCI_ARTIFACT: &str = "ociArtifact";

/// Default schema version written by [`ComponentDescriptor::new`].
pub const SCHEMA_VERSION_V2: &str = "v2";

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub meta: Metadata,
    pub component: ComponentSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Signature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_digests: Vec<NestedComponentDigests>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repository_contexts: Vec<Value>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub component_references: Vec<ComponentReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

/// A named, typed annotation. Only labels with `signing: true` are part of
/// the descriptor digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub signing: bool,
}

impl Label {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            version: None,
            signing: false,
        }
    }

    /// Mark the label as part of the signed digest.
    pub fn signed(mut self) -> Self {
        self.signing = true;
        self
    }
}

/// Typed access specification; attributes besides `type` are opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessSpec {
    #[serde(rename = "type")]
    pub access_type: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl AccessSpec {
    pub fn new(access_type: impl Into<String>) -> Self {
        Self {
            access_type: access_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// `localBlob` access referring to `local_reference`.
    pub fn local_blob(local_reference: impl Into<String>) -> Self {
        Self::new(ACCESS_TYPE_LOCAL_BLOB).with("localReference", local_reference.into())
    }

    pub fn none() -> Self {
        Self::new(ACCESS_TYPE_NONE)
    }

    pub fn is_none(&self) -> bool {
        self.access_type == ACCESS_TYPE_NONE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_refs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        resource_type: impl Into<String>,
        access: AccessSpec,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            extra_identity: BTreeMap::new(),
            resource_type: resource_type.into(),
            relation: "local".to_string(),
            labels: Vec::new(),
            src_refs: Vec::new(),
            access: Some(access),
            digest: None,
        }
    }

    /// Access type, if the resource has an access specification.
    pub fn access_type(&self) -> Option<&str> {
        self.access.as_ref().map(|a| a.access_type.as_str())
    }

    /// True if the resource has no content to digest.
    pub fn has_none_access(&self) -> bool {
        self.access.as_ref().map_or(true, AccessSpec::is_none)
    }

    /// `name:version` plus extra identity, for messages.
    pub fn identity(&self) -> String {
        element_identity(&self.name, &self.version, &self.extra_identity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessSpec>,
}

/// Edge to another component version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    /// Local name of the reference inside the referencing component.
    pub name: String,
    pub component_name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
}

impl ComponentReference {
    pub fn new(
        name: impl Into<String>,
        component_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            component_name: component_name.into(),
            version: version.into(),
            extra_identity: BTreeMap::new(),
            labels: Vec::new(),
            digest: None,
        }
    }

    /// Key of the referenced component version.
    pub fn key(&self) -> Result<ComponentVersionKey, IdentityError> {
        ComponentVersionKey::new(&self.component_name, &self.version)
    }
}

/// A named signature over the descriptor digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub digest: DigestSpec,
    pub signature: SignatureSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSpec {
    pub algorithm: String,
    pub value: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// Cached digests of one (transitively) referenced component version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedComponentDigests {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_digests: Vec<NestedResourceDigest>,
}

impl NestedComponentDigests {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            digest: None,
            resource_digests: Vec::new(),
        }
    }

    pub fn key(&self) -> Result<ComponentVersionKey, IdentityError> {
        ComponentVersionKey::new(&self.name, &self.version)
    }

    /// Order-insensitive comparison of the resource digest sets.
    pub fn resources_match(&self, other: &NestedComponentDigests) -> bool {
        resource_digests_match(&self.resource_digests, &other.resource_digests)
    }
}

/// Digest of one resource in a [`NestedComponentDigests`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedResourceDigest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_identity: BTreeMap<String, String>,
    pub digest: DigestSpec,
}

impl NestedResourceDigest {
    fn same_identity(&self, other: &NestedResourceDigest) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.extra_identity == other.extra_identity
    }
}

/// Equal length, and every entry of `a` has an entry in `b` with the same
/// identity and digest.
pub fn resource_digests_match(a: &[NestedResourceDigest], b: &[NestedResourceDigest]) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| {
            b.iter()
                .any(|y| x.same_identity(y) && x.digest == y.digest)
        })
}

fn element_identity(name: &str, version: &str, extra: &BTreeMap<String, String>) -> String {
    if extra.is_empty() {
        return format!("{name}:{version}");
    }
    let extra: Vec<String> = extra.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}:{version}[{}]", extra.join(","))
}

impl ComponentDescriptor {
    /// Empty descriptor for `name:version`.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            meta: Metadata {
                schema_version: SCHEMA_VERSION_V2.to_string(),
            },
            component: ComponentSpec {
                name: name.into(),
                version: version.into(),
                provider: Provider::default(),
                labels: Vec::new(),
                repository_contexts: Vec::new(),
                sources: Vec::new(),
                resources: Vec::new(),
                component_references: Vec::new(),
            },
            signatures: Vec::new(),
            nested_digests: Vec::new(),
        }
    }

    pub fn key(&self) -> Result<ComponentVersionKey, IdentityError> {
        ComponentVersionKey::new(&self.component.name, &self.component.version)
    }

    pub fn signature_index(&self, name: &str) -> Option<usize> {
        self.signatures.iter().position(|s| s.name == name)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    /// Replace the signature with the same name, or append.
    pub fn set_signature(&mut self, signature: Signature) {
        match self.signature_index(&signature.name) {
            Some(i) => self.signatures[i] = signature,
            None => self.signatures.push(signature),
        }
    }

    /// Digests of all resources that carry one.
    pub fn resource_digests(&self) -> NestedComponentDigests {
        let mut digests = NestedComponentDigests::new(&self.component.name, &self.component.version);
        digests.resource_digests = self
            .component
            .resources
            .iter()
            .filter_map(|r| {
                r.digest.as_ref().map(|d| NestedResourceDigest {
                    name: r.name.clone(),
                    version: r.version.clone(),
                    extra_identity: r.extra_identity.clone(),
                    digest: d.clone(),
                })
            })
            .collect();
        digests
    }

    /// Nested digest entry for `key`, if cached on this descriptor.
    pub fn nested_digest(&self, key: &ComponentVersionKey) -> Option<&NestedComponentDigests> {
        self.nested_digests
            .iter()
            .find(|n| n.name == key.name() && n.version == key.version())
    }

    /// Check that every reference and every resource with content carries a
    /// digest, and no resource without content does.
    pub fn is_normalizeable(&self) -> Result<(), NormalizationError> {
        let fail = |reason: String| NormalizationError::NotNormalizeable {
            component: format!("{}:{}", self.component.name, self.component.version),
            reason,
        };
        for r in &self.component.component_references {
            if !r.digest.as_ref().is_some_and(DigestSpec::is_complete) {
                return Err(fail(format!(
                    "missing digest in component reference {}:{}",
                    r.component_name, r.version
                )));
            }
        }
        for r in &self.component.resources {
            match (r.has_none_access(), &r.digest) {
                (false, None) => {
                    return Err(fail(format!("missing digest in resource {}", r.identity())));
                }
                (true, Some(_)) => {
                    return Err(fail(format!(
                        "digest for resource {} without access is not allowed",
                        r.identity()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Normalized bytes of this descriptor for digest computation.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor is not normalizeable or `algo` is unknown.
    pub fn normalize(&self, algo: &str) -> Result<CanonicalBytes, NormalizationError> {
        self.is_normalizeable()?;
        prepare_normalization(self, &descriptor_exclude_rules())?.to_canonical(algo)
    }
}
