//! # Digest Contexts
//!
//! Every walked component version gets a [`DigestContext`]. Contexts live
//! in an arena ([`DigestContexts`]) and point to their parent by index.
//! Each tree of contexts shares one [`RootContextInfo`] holding the
//! per-walk digest tables:
//!
//! - `inputs`: presets known before the walk started, seeded from the
//!   root descriptor's `nestedDigests` and its own resource digests.
//! - `outputs`: resource digest sets computed during the walk.
//!
//! When a version finishes, [`DigestContexts::propagate`] checks its
//! resource digests against any preset for the same key and records the
//! result. A disagreement is an integrity failure: the same component
//! version must never be signed with two different content sets in one
//! walk.
//!
//! One arena may serve several walks. A version finished under an earlier
//! root is taken over by [`DigestContexts::adopt_finished`], which checks
//! the old results with [`DigestContexts::valid_for`] and merges them with
//! [`DigestContexts::use_context`].

use std::collections::BTreeMap;

use cvsign_core::{ComponentDescriptor, ComponentVersionKey, DigestSpec, NestedComponentDigests};

use crate::digester::DigesterType;
use crate::error::SigningError;

/// Index of a context in its arena.
pub type ContextId = usize;

/// Digest tables shared by one tree of contexts.
#[derive(Debug, Clone)]
pub struct RootContextInfo {
    pub ctx_key: ComponentVersionKey,
    pub sign: bool,
    /// Digester type of the root descriptor digest, once computed.
    pub digest_type: Option<DigesterType>,
    pub hasher: Option<String>,
    pub inputs: BTreeMap<ComponentVersionKey, NestedComponentDigests>,
    pub outputs: BTreeMap<ComponentVersionKey, NestedComponentDigests>,
}

impl RootContextInfo {
    fn new(key: ComponentVersionKey, descriptor: &ComponentDescriptor, sign: bool) -> Result<Self, SigningError> {
        let mut inputs = BTreeMap::new();
        for nested in &descriptor.nested_digests {
            inputs.insert(nested.key()?, nested.clone());
        }
        let content_resources = descriptor.component.resources.iter().filter(|r| !r.has_none_access());
        let mut any = false;
        let mut complete = true;
        for r in content_resources {
            any = true;
            complete &= r.digest.is_some();
        }
        if any && complete {
            inputs.insert(key.clone(), descriptor.resource_digests());
        }
        Ok(Self {
            ctx_key: key,
            sign,
            digest_type: None,
            hasher: None,
            inputs,
            outputs: BTreeMap::new(),
        })
    }

    /// Digests known for `key`: computed ones first, then presets.
    pub fn get_preset(&self, key: &ComponentVersionKey) -> Option<&NestedComponentDigests> {
        self.outputs.get(key).or_else(|| self.inputs.get(key))
    }
}

/// Per-version walk context.
#[derive(Debug, Clone)]
pub struct DigestContext {
    pub key: ComponentVersionKey,
    pub root: usize,
    pub parent: Option<ContextId>,
    pub descriptor: ComponentDescriptor,
    pub digest: Option<DigestSpec>,
    pub signed: bool,
    /// Digests of all transitively referenced versions.
    pub refs: BTreeMap<ComponentVersionKey, DigestSpec>,
}

/// Arena of contexts and their root tables.
#[derive(Debug, Clone, Default)]
pub struct DigestContexts {
    contexts: Vec<DigestContext>,
    roots: Vec<RootContextInfo>,
    finished: BTreeMap<ComponentVersionKey, ContextId>,
}

fn unknown(id: ContextId) -> SigningError {
    SigningError::Configuration(format!("unknown digest context {id}"))
}

impl DigestContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the context for `descriptor`. Without a parent a new root
    /// table is created and seeded from the descriptor.
    pub fn create(
        &mut self,
        descriptor: &ComponentDescriptor,
        parent: Option<ContextId>,
        sign: bool,
    ) -> Result<ContextId, SigningError> {
        let key = descriptor.key()?;
        let root = match parent {
            Some(p) => self.contexts.get(p).ok_or_else(|| unknown(p))?.root,
            None => {
                self.roots.push(RootContextInfo::new(key.clone(), descriptor, sign)?);
                self.roots.len() - 1
            }
        };
        self.contexts.push(DigestContext {
            key,
            root,
            parent,
            descriptor: descriptor.clone(),
            digest: None,
            signed: false,
            refs: BTreeMap::new(),
        });
        Ok(self.contexts.len() - 1)
    }

    pub fn get(&self, id: ContextId) -> Option<&DigestContext> {
        self.contexts.get(id)
    }

    pub fn root_of(&self, id: ContextId) -> Option<&RootContextInfo> {
        self.contexts.get(id).and_then(|c| self.roots.get(c.root))
    }

    pub fn get_preset(&self, id: ContextId, key: &ComponentVersionKey) -> Option<&NestedComponentDigests> {
        self.root_of(id).and_then(|r| r.get_preset(key))
    }

    /// Record a reference from `id` to `key` that was not walked in this
    /// context. A previously finished context for `key` contributes its
    /// own references as well.
    pub fn link(&mut self, id: ContextId, key: &ComponentVersionKey, digest: &DigestSpec) -> Result<(), SigningError> {
        let inherited = self
            .finished
            .get(key)
            .and_then(|f| self.contexts.get(*f))
            .map(|c| c.refs.clone())
            .unwrap_or_default();
        let ctx = self.contexts.get_mut(id).ok_or_else(|| unknown(id))?;
        ctx.refs.extend(inherited);
        ctx.refs.insert(key.clone(), digest.clone());
        Ok(())
    }

    /// Finish context `id` with its final `descriptor` and `digest`.
    ///
    /// # Errors
    ///
    /// [`SigningError::DigestSetMismatch`] if the resource digests disagree
    /// with a preset for the same key.
    pub fn propagate(
        &mut self,
        id: ContextId,
        descriptor: &ComponentDescriptor,
        digest: &DigestSpec,
        signed: bool,
    ) -> Result<(), SigningError> {
        let (key, root, parent) = {
            let ctx = self.contexts.get(id).ok_or_else(|| unknown(id))?;
            (ctx.key.clone(), ctx.root, ctx.parent)
        };
        let mut digs = descriptor.resource_digests();
        digs.digest = Some(digest.clone());

        let info = self.roots.get_mut(root).ok_or_else(|| unknown(id))?;
        if let Some(preset) = info.get_preset(&key) {
            if !preset.resources_match(&digs) {
                tracing::warn!(component = %key, "resource digests differ from preset");
                return Err(SigningError::DigestSetMismatch(key.to_string()));
            }
            let mut adopted = preset.clone();
            if adopted.digest.is_none() {
                adopted.digest = Some(digest.clone());
            }
            digs = adopted;
        }
        info.outputs.insert(key.clone(), digs);
        if parent.is_none() {
            info.digest_type = Some(DigesterType::of(digest));
            info.hasher = Some(digest.hash_algorithm.clone());
        }

        let ctx = &mut self.contexts[id];
        ctx.descriptor = descriptor.clone();
        ctx.digest = Some(digest.clone());
        ctx.signed = signed;
        let refs = ctx.refs.clone();
        self.finished.insert(key.clone(), id);

        if let Some(p) = parent {
            let parent = self.contexts.get_mut(p).ok_or_else(|| unknown(p))?;
            parent.refs.extend(refs);
            parent.refs.insert(key, digest.clone());
        }
        Ok(())
    }

    /// Take over the results of `other_id` from another arena.
    ///
    /// All computed digest sets of the other root are merged into this
    /// root; any disagreement with a known preset fails before anything
    /// is changed.
    pub fn use_context(&mut self, id: ContextId, other: &DigestContexts, other_id: ContextId) -> Result<(), SigningError> {
        let source = other.get(other_id).ok_or_else(|| unknown(other_id))?;
        let source_root = other.root_of(other_id).ok_or_else(|| unknown(other_id))?;
        self.use_parts(id, source, source_root)
    }

    fn use_parts(
        &mut self,
        id: ContextId,
        source: &DigestContext,
        source_root: &RootContextInfo,
    ) -> Result<(), SigningError> {
        let root = self.contexts.get(id).ok_or_else(|| unknown(id))?.root;
        let info = self.roots.get_mut(root).ok_or_else(|| unknown(id))?;

        for (k, v) in &source_root.outputs {
            if let Some(p) = info.get_preset(k) {
                if !p.resources_match(v) {
                    return Err(SigningError::DigestSetMismatch(k.to_string()));
                }
            }
        }
        for (k, v) in &source_root.outputs {
            info.outputs.insert(k.clone(), v.clone());
        }

        let ctx = &mut self.contexts[id];
        ctx.refs.extend(source.refs.iter().map(|(k, v)| (k.clone(), v.clone())));
        ctx.digest = source.digest.clone();
        ctx.descriptor = source.descriptor.clone();
        ctx.signed = source.signed;
        Ok(())
    }

    /// Whether the digests known to `id` agree with every preset of
    /// `other_id`.
    pub fn valid_for(&self, id: ContextId, other: &DigestContexts, other_id: ContextId) -> bool {
        let (Some(mine), Some(theirs)) = (self.root_of(id), other.root_of(other_id)) else {
            return false;
        };
        root_valid_for(mine, theirs)
    }

    /// Take over the context finished for `key` under another root of this
    /// arena, as a child of `id`.
    ///
    /// Returns `false` if `key` has no finished context, or if it was
    /// finished under the same root as `id`.
    ///
    /// # Errors
    ///
    /// [`SigningError::DigestSetMismatch`] if the earlier results disagree
    /// with the presets of `id`'s root.
    pub fn adopt_finished(&mut self, id: ContextId, key: &ComponentVersionKey) -> Result<bool, SigningError> {
        let Some(&finished) = self.finished.get(key) else {
            return Ok(false);
        };
        let root = self.contexts.get(id).ok_or_else(|| unknown(id))?.root;
        let source = self.contexts.get(finished).ok_or_else(|| unknown(finished))?.clone();
        let Some(digest) = source.digest.clone().filter(|_| source.root != root) else {
            return Ok(false);
        };
        let source_root = self.roots.get(source.root).ok_or_else(|| unknown(finished))?.clone();
        let mine = self.roots.get(root).ok_or_else(|| unknown(id))?;
        if !root_valid_for(&source_root, mine) {
            return Err(SigningError::DigestSetMismatch(key.to_string()));
        }

        let child = self.create(&source.descriptor, Some(id), false)?;
        self.use_parts(child, &source, &source_root)?;
        self.propagate(child, &source.descriptor, &digest, source.signed)?;
        tracing::debug!(component = %key, "reusing digests of an earlier walk");
        Ok(true)
    }

    /// Forget the finished context of `key`.
    pub fn forget(&mut self, key: &ComponentVersionKey) {
        self.finished.remove(key);
    }

    /// Nested digest entries for everything `id` references, sorted by key.
    ///
    /// A reference without known resource digests gets an entry with its
    /// digest only.
    pub fn nested_digests(&self, id: ContextId) -> Vec<NestedComponentDigests> {
        let Some(ctx) = self.contexts.get(id) else {
            return Vec::new();
        };
        ctx.refs
            .iter()
            .map(|(k, d)| {
                let mut entry = self
                    .get_preset(id, k)
                    .cloned()
                    .unwrap_or_else(|| NestedComponentDigests::new(k.name(), k.version()));
                if entry.digest.is_none() {
                    entry.digest = Some(d.clone());
                }
                entry
            })
            .collect()
    }
}

/// Whether everything `mine` knows agrees with the presets of `theirs`.
fn root_valid_for(mine: &RootContextInfo, theirs: &RootContextInfo) -> bool {
    let agrees = |k: &ComponentVersionKey, v: &NestedComponentDigests| {
        theirs.get_preset(k).map_or(true, |p| p.resources_match(v))
    };
    mine.outputs.iter().all(|(k, v)| agrees(k, v))
        && mine
            .inputs
            .iter()
            .filter(|(k, _)| !mine.outputs.contains_key(*k))
            .all(|(k, v)| agrees(k, v))
}
