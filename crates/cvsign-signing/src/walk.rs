//! # Walking State
//!
//! Tracks the depth-first walk over the component reference graph. Every
//! vertex moves `unvisited → in-progress → finalized`:
//!
//! - [`WalkingState::add`] on an unvisited key marks it in progress and
//!   returns `true`.
//! - On a finalized key it returns `false`; the result is in the closure.
//! - On a key still in progress it fails with [`SigningError::Cycle`].
//!
//! The state also owns the digest context arena, the walk history used
//! in error messages, and the resolved handles of referenced versions.
//! Those handles stay open until the whole walk succeeded: only then are
//! their descriptor updates written and the handles closed. A failed walk
//! closes them unchanged.

use std::collections::{BTreeMap, HashSet};

use cvsign_core::{ComponentDescriptor, ComponentVersionKey, DigestSpec, NestedComponentDigests, Signature};

use crate::access::OnceCloser;
use crate::context::DigestContexts;
use crate::error::{AccessError, SigningError};

/// Element kind of component versions in the visited set.
pub const KIND_COMPONENT_VERSION: &str = "component version";

/// Final result of one walked version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    /// Descriptor with all computed digests filled in.
    pub descriptor: ComponentDescriptor,
    pub digest: DigestSpec,
}

/// Computed values to write into a live descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorUpdate {
    pub reference_digests: Vec<Option<DigestSpec>>,
    pub resource_digests: Vec<Option<DigestSpec>>,
    /// Replaces the signature list when set.
    pub signatures: Option<Vec<Signature>>,
    /// Replaces the nested digests when set.
    pub nested_digests: Option<Vec<NestedComponentDigests>>,
}

impl DescriptorUpdate {
    /// Collect the digests of `computed`.
    pub fn from_descriptor(computed: &ComponentDescriptor) -> Self {
        Self {
            reference_digests: computed
                .component
                .component_references
                .iter()
                .map(|r| r.digest.clone())
                .collect(),
            resource_digests: computed.component.resources.iter().map(|r| r.digest.clone()).collect(),
            signatures: None,
            nested_digests: None,
        }
    }

    pub fn apply_to(&self, live: &mut ComponentDescriptor) {
        for (dst, src) in live.component.component_references.iter_mut().zip(&self.reference_digests) {
            dst.digest = src.clone();
        }
        for (dst, src) in live.component.resources.iter_mut().zip(&self.resource_digests) {
            dst.digest = src.clone();
        }
        if let Some(signatures) = &self.signatures {
            live.signatures = signatures.clone();
        }
        if let Some(nested) = &self.nested_digests {
            live.nested_digests = nested.clone();
        }
    }
}

#[derive(Debug)]
struct PendingClose {
    handle: OnceCloser,
    update: Option<DescriptorUpdate>,
}

#[derive(Debug, Default)]
pub struct WalkingState {
    visited: HashSet<(&'static str, ComponentVersionKey)>,
    closure: BTreeMap<ComponentVersionKey, VersionInfo>,
    history: Vec<ComponentVersionKey>,
    contexts: DigestContexts,
    pending: Vec<PendingClose>,
}

impl WalkingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `key`.
    ///
    /// # Errors
    ///
    /// [`SigningError::Cycle`] if `key` is already in progress.
    pub fn add(&mut self, kind: &'static str, key: &ComponentVersionKey) -> Result<bool, SigningError> {
        if self.closure.contains_key(key) {
            return Ok(false);
        }
        if !self.visited.insert((kind, key.clone())) {
            return Err(SigningError::Cycle(self.cycle_path(key)));
        }
        self.history.push(key.clone());
        Ok(true)
    }

    pub fn is_in_progress(&self, kind: &'static str, key: &ComponentVersionKey) -> bool {
        !self.closure.contains_key(key) && self.visited.contains(&(kind, key.clone()))
    }

    /// Mark `key` finalized with its result.
    pub fn finish(&mut self, key: &ComponentVersionKey, info: VersionInfo) {
        self.pop(key);
        self.closure.insert(key.clone(), info);
    }

    /// Leave `key` after a failure, so it can be walked again.
    pub fn abort(&mut self, kind: &'static str, key: &ComponentVersionKey) {
        tracing::debug!(component = %key, kind, "walk aborted");
        self.pop(key);
        self.visited.remove(&(kind, key.clone()));
    }

    fn pop(&mut self, key: &ComponentVersionKey) {
        if self.history.last() == Some(key) {
            self.history.pop();
        }
    }

    pub fn get(&self, key: &ComponentVersionKey) -> Option<&VersionInfo> {
        self.closure.get(key)
    }

    pub fn closure(&self) -> &BTreeMap<ComponentVersionKey, VersionInfo> {
        &self.closure
    }

    pub fn history(&self) -> &[ComponentVersionKey] {
        &self.history
    }

    /// Current history as `a:v1->b:v1`.
    pub fn history_string(&self) -> String {
        join(&self.history)
    }

    /// `key` is in progress, so it appears in the history; the cycle is
    /// the history suffix starting there, closed by `key` again.
    pub fn cycle_path(&self, key: &ComponentVersionKey) -> String {
        let start = self.history.iter().position(|k| k == key).unwrap_or(0);
        let mut path: Vec<ComponentVersionKey> = self.history[start..].to_vec();
        path.push(key.clone());
        join(&path)
    }

    pub fn contexts(&self) -> &DigestContexts {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut DigestContexts {
        &mut self.contexts
    }

    /// Keep `handle` open until [`commit_pending`](Self::commit_pending).
    pub fn defer_close(&mut self, handle: OnceCloser, update: Option<DescriptorUpdate>) {
        self.pending.push(PendingClose { handle, update });
    }

    /// Number of handles waiting to be committed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Write the deferred updates and close their handles in the order
    /// they were finished. Handles left after a failing close are closed
    /// unchanged.
    pub fn commit_pending(&mut self) -> Result<(), AccessError> {
        for mut p in std::mem::take(&mut self.pending) {
            if let Some(update) = &p.update {
                update.apply_to(p.handle.descriptor_mut());
            }
            p.handle.close()?;
        }
        Ok(())
    }

    /// Close all deferred handles unchanged and forget their results, so
    /// a later walk with this state visits them again.
    pub fn discard_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "discarding uncommitted component versions");
        }
        for p in pending {
            let key = p.handle.key().clone();
            self.closure.remove(&key);
            self.visited.retain(|(_, k)| *k != key);
            self.contexts.forget(&key);
        }
    }
}

fn join(keys: &[ComponentVersionKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join("->")
}
