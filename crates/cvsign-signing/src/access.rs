//! # Repository Access Seams
//!
//! The walk never talks to storage directly. It resolves referenced
//! component versions through a [`Resolver`], reads and updates
//! descriptors through a [`ComponentVersionAccess`] handle, and reads
//! resource content through an [`AccessMethod`].
//!
//! Handles obtained from a resolver are owned by the walk frame that
//! resolved them and must be closed exactly once; [`OnceCloser`] enforces
//! that, closing on drop when an error path skips the explicit close.

use std::ops::{Deref, DerefMut};

use cvsign_core::{ComponentDescriptor, ComponentVersionKey};

use crate::error::AccessError;

/// Reads the content of one resource.
pub trait AccessMethod {
    /// Access type, e.g. `localBlob`.
    fn kind(&self) -> &str;

    fn mime_type(&self) -> &str;

    /// The full blob content.
    fn content(&self) -> Result<Vec<u8>, AccessError>;
}

/// An open component version.
pub trait ComponentVersionAccess {
    fn key(&self) -> &ComponentVersionKey;

    fn descriptor(&self) -> &ComponentDescriptor;

    /// The live descriptor. Edits become visible to the repository on
    /// [`close()`](ComponentVersionAccess::close).
    fn descriptor_mut(&mut self) -> &mut ComponentDescriptor;

    /// Access method of the resource at `resource_index`, or `None` if the
    /// resource has no content.
    fn access_method(&self, resource_index: usize) -> Result<Option<Box<dyn AccessMethod>>, AccessError>;

    fn close(&mut self) -> Result<(), AccessError>;
}

/// Looks up component versions by name and version.
pub trait Resolver: Send + Sync {
    fn lookup_component_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Box<dyn ComponentVersionAccess>, AccessError>;
}

/// Owns a resolved handle and closes it exactly once.
pub struct OnceCloser {
    inner: Box<dyn ComponentVersionAccess>,
    closed: bool,
}

impl OnceCloser {
    pub fn new(inner: Box<dyn ComponentVersionAccess>) -> Self {
        Self { inner, closed: false }
    }

    /// Close the handle. Later calls, and the drop, do nothing.
    pub fn close(&mut self) -> Result<(), AccessError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for OnceCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnceCloser")
            .field("key", self.inner.key())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Deref for OnceCloser {
    type Target = dyn ComponentVersionAccess;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for OnceCloser {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for OnceCloser {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.inner.close() {
                tracing::warn!(component = %self.inner.key(), error = %e, "closing component version failed");
            }
        }
    }
}
