//! # In-Memory Repository
//!
//! A [`Resolver`] over descriptors and blobs held in memory. Handles are
//! snapshots: edits through [`ComponentVersionAccess::descriptor_mut`] are
//! committed back to the repository on `close()`.
//!
//! Access types:
//!
//! | Access type | Blob key attribute |
//! |---|---|
//! | `localBlob` | `localReference` |
//! | `ociArtifact` | `imageReference` |
//! | `none` | no access method |

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use cvsign_core::descriptor::{ACCESS_TYPE_LOCAL_BLOB, ACCESS_TYPE_OCI_ARTIFACT};
use cvsign_core::{AccessSpec, ComponentDescriptor, ComponentVersionKey};

use crate::access::{AccessMethod, ComponentVersionAccess, Resolver};
use crate::error::AccessError;

/// Access attribute naming a local blob.
pub const LOCAL_REFERENCE: &str = "localReference";

/// Access attribute naming an OCI artifact.
pub const IMAGE_REFERENCE: &str = "imageReference";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default)]
struct Store {
    descriptors: BTreeMap<ComponentVersionKey, ComponentDescriptor>,
    blobs: BTreeMap<String, Vec<u8>>,
}

/// Shared in-memory component repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    store: Arc<RwLock<Store>>,
    lookups: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) a descriptor.
    pub fn add_descriptor(&self, descriptor: ComponentDescriptor) -> Result<ComponentVersionKey, AccessError> {
        let key = descriptor
            .key()
            .map_err(|e| AccessError::Failed(format!("invalid descriptor identity: {e}")))?;
        self.store.write().descriptors.insert(key.clone(), descriptor);
        Ok(key)
    }

    /// Store (or replace) blob content under `reference`.
    pub fn put_blob(&self, reference: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.store.write().blobs.insert(reference.into(), content.into());
    }

    /// A copy of the stored descriptor.
    pub fn descriptor(&self, name: &str, version: &str) -> Option<ComponentDescriptor> {
        let key = ComponentVersionKey::new(name, version).ok()?;
        self.store.read().descriptors.get(&key).cloned()
    }

    /// Open a handle without counting a lookup.
    pub fn open(&self, name: &str, version: &str) -> Result<MemoryComponentVersion, AccessError> {
        let not_found = || AccessError::NotFound {
            kind: "component version",
            name: format!("{name}:{version}"),
        };
        let key = ComponentVersionKey::new(name, version).map_err(|_| not_found())?;
        let descriptor = self.store.read().descriptors.get(&key).cloned().ok_or_else(not_found)?;
        Ok(MemoryComponentVersion {
            key,
            descriptor,
            store: Arc::clone(&self.store),
            closed: false,
        })
    }

    /// Number of lookups through [`Resolver`].
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn reset_lookup_count(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }
}

impl Resolver for MemoryRepository {
    fn lookup_component_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Box<dyn ComponentVersionAccess>, AccessError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(component = %format!("{name}:{version}"), "memory lookup");
        Ok(Box::new(self.open(name, version)?))
    }
}

/// Open component version in a [`MemoryRepository`].
#[derive(Debug)]
pub struct MemoryComponentVersion {
    key: ComponentVersionKey,
    descriptor: ComponentDescriptor,
    store: Arc<RwLock<Store>>,
    closed: bool,
}

impl ComponentVersionAccess for MemoryComponentVersion {
    fn key(&self) -> &ComponentVersionKey {
        &self.key
    }

    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut ComponentDescriptor {
        &mut self.descriptor
    }

    fn access_method(&self, resource_index: usize) -> Result<Option<Box<dyn AccessMethod>>, AccessError> {
        let resource = self
            .descriptor
            .component
            .resources
            .get(resource_index)
            .ok_or_else(|| AccessError::NotFound {
                kind: "resource",
                name: format!("{}#{resource_index}", self.key),
            })?;
        let Some(access) = resource.access.as_ref().filter(|a| !a.is_none()) else {
            return Ok(None);
        };
        let attribute = match access.access_type.as_str() {
            ACCESS_TYPE_LOCAL_BLOB => LOCAL_REFERENCE,
            ACCESS_TYPE_OCI_ARTIFACT => IMAGE_REFERENCE,
            other => return Err(AccessError::Failed(format!("unsupported access type {other:?}"))),
        };
        let reference = string_attribute(access, attribute)?;
        let mime_type = access
            .attributes
            .get("mediaType")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        Ok(Some(Box::new(MemoryAccessMethod {
            kind: access.access_type.clone(),
            mime_type,
            reference,
            store: Arc::clone(&self.store),
        })))
    }

    fn close(&mut self) -> Result<(), AccessError> {
        if self.closed {
            return Err(AccessError::Failed(format!("{} already closed", self.key)));
        }
        self.closed = true;
        self.store
            .write()
            .descriptors
            .insert(self.key.clone(), self.descriptor.clone());
        Ok(())
    }
}

fn string_attribute(access: &AccessSpec, name: &str) -> Result<String, AccessError> {
    access
        .attributes
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AccessError::Failed(format!("{} access without {name}", access.access_type)))
}

/// Reads a blob from the repository at call time.
#[derive(Debug)]
pub struct MemoryAccessMethod {
    kind: String,
    mime_type: String,
    reference: String,
    store: Arc<RwLock<Store>>,
}

impl AccessMethod for MemoryAccessMethod {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn content(&self) -> Result<Vec<u8>, AccessError> {
        self.store
            .read()
            .blobs
            .get(&self.reference)
            .cloned()
            .ok_or_else(|| AccessError::NotFound {
                kind: "blob",
                name: self.reference.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsign_core::Resource;

    fn repo_with_component() -> MemoryRepository {
        let repo = MemoryRepository::new();
        let mut cd = ComponentDescriptor::new("acme.org/app", "v1");
        cd.component
            .resources
            .push(Resource::new("data", "v1", "blob", AccessSpec::local_blob("data-blob")));
        cd.component
            .resources
            .push(Resource::new("doc", "v1", "plainText", AccessSpec::none()));
        cd.component.resources.push(Resource::new(
            "image",
            "v1",
            "ociImage",
            AccessSpec::new(ACCESS_TYPE_OCI_ARTIFACT)
                .with(IMAGE_REFERENCE, "ghcr.io/acme/app:v1")
                .with("mediaType", "application/vnd.oci.image.manifest.v1+json"),
        ));
        repo.add_descriptor(cd).unwrap();
        repo.put_blob("data-blob", b"hello".to_vec());
        repo.put_blob("ghcr.io/acme/app:v1", b"{}".to_vec());
        repo
    }

    #[test]
    fn access_methods_by_type() {
        let repo = repo_with_component();
        let cv = repo.open("acme.org/app", "v1").unwrap();

        let m = cv.access_method(0).unwrap().unwrap();
        assert_eq!(m.kind(), ACCESS_TYPE_LOCAL_BLOB);
        assert_eq!(m.mime_type(), DEFAULT_MIME_TYPE);
        assert_eq!(m.content().unwrap(), b"hello");

        assert!(cv.access_method(1).unwrap().is_none());

        let m = cv.access_method(2).unwrap().unwrap();
        assert_eq!(m.mime_type(), "application/vnd.oci.image.manifest.v1+json");
        assert_eq!(m.content().unwrap(), b"{}");

        assert!(matches!(cv.access_method(9), Err(AccessError::NotFound { .. })));
    }

    #[test]
    fn edits_commit_on_close() {
        let repo = repo_with_component();
        let mut cv = repo.lookup_component_version("acme.org/app", "v1").unwrap();
        cv.descriptor_mut().component.provider.name = "acme".into();
        assert_eq!(repo.descriptor("acme.org/app", "v1").unwrap().component.provider.name, "");
        cv.close().unwrap();
        assert_eq!(repo.descriptor("acme.org/app", "v1").unwrap().component.provider.name, "acme");
        assert!(cv.close().is_err());
        assert_eq!(repo.lookup_count(), 1);
    }

    #[test]
    fn unknown_component_is_not_found() {
        let repo = MemoryRepository::new();
        assert!(matches!(
            repo.lookup_component_version("x", "v1"),
            Err(AccessError::NotFound { .. })
        ));
        assert_eq!(repo.lookup_count(), 1);
        repo.reset_lookup_count();
        assert_eq!(repo.lookup_count(), 0);
    }
}
