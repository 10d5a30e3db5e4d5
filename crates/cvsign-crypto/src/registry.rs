//! # Algorithm and Key Registries
//!
//! Named hashers, signers and verifiers live in a [`HandlerRegistry`];
//! named public and private keys in a [`KeyRegistry`]. Both are layered:
//! each instance has an ordered list of parents. Lookups check the local
//! tables first, then each parent in order, and return the first match.
//! Registration only ever touches the local layer.
//!
//! This gives a process-wide default registry plus cheap per-call
//! overrides: `Registry::new(None, None)` creates empty local tables over
//! the defaults without copying them.
//!
//! ## Concurrency
//!
//! Tables are guarded by `parking_lot::RwLock`. Registration and lookup are
//! safe from any number of threads; lookups take only read locks.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::ed25519::Ed25519SignatureHandler;
use crate::handler::{Signer, Verifier};
use crate::hasher::{Hasher, Sha256Hasher, Sha512Hasher};
use crate::keys::{PrivateKey, PublicKey};
use crate::rsassa::RsaSignatureHandler;

/// Hashers, signers and verifiers by algorithm name.
#[derive(Default)]
pub struct HandlerRegistry {
    signers: RwLock<HashMap<String, Arc<dyn Signer>>>,
    verifiers: RwLock<HashMap<String, Arc<dyn Verifier>>>,
    hashers: RwLock<HashMap<String, Arc<dyn Hasher>>>,
    parents: Vec<Arc<HandlerRegistry>>,
}

impl HandlerRegistry {
    /// Empty registry delegating to `parents` in order.
    pub fn new(parents: Vec<Arc<HandlerRegistry>>) -> Self {
        Self {
            parents,
            ..Self::default()
        }
    }

    /// Registry holding the built-in handlers and nothing else.
    pub fn with_builtin_handlers() -> Self {
        let reg = Self::default();
        reg.register_hasher(Arc::new(Sha256Hasher));
        reg.register_hasher(Arc::new(Sha512Hasher));
        reg.register_signature_handler(Arc::new(RsaSignatureHandler));
        reg.register_signature_handler(Arc::new(Ed25519SignatureHandler));
        reg
    }

    pub fn register_signer(&self, signer: Arc<dyn Signer>) {
        let name = signer.algorithm().to_string();
        self.signers.write().insert(name, signer);
    }

    pub fn register_verifier(&self, verifier: Arc<dyn Verifier>) {
        let name = verifier.algorithm().to_string();
        self.verifiers.write().insert(name, verifier);
    }

    /// Register a type as both signer and verifier.
    pub fn register_signature_handler<H>(&self, handler: Arc<H>)
    where
        H: Signer + Verifier + 'static,
    {
        self.register_signer(handler.clone());
        self.register_verifier(handler);
    }

    pub fn register_hasher(&self, hasher: Arc<dyn Hasher>) {
        let name = hasher.algorithm().to_string();
        self.hashers.write().insert(name, hasher);
    }

    pub fn get_signer(&self, name: &str) -> Option<Arc<dyn Signer>> {
        if let Some(s) = self.signers.read().get(name) {
            return Some(Arc::clone(s));
        }
        self.parents.iter().find_map(|p| p.get_signer(name))
    }

    pub fn get_verifier(&self, name: &str) -> Option<Arc<dyn Verifier>> {
        if let Some(v) = self.verifiers.read().get(name) {
            return Some(Arc::clone(v));
        }
        self.parents.iter().find_map(|p| p.get_verifier(name))
    }

    pub fn get_hasher(&self, name: &str) -> Option<Arc<dyn Hasher>> {
        if let Some(h) = self.hashers.read().get(name) {
            return Some(Arc::clone(h));
        }
        self.parents.iter().find_map(|p| p.get_hasher(name))
    }

    /// Sorted names of all hashers visible through this registry.
    pub fn hasher_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hashers.read().keys().cloned().collect();
        for p in &self.parents {
            names.extend(p.hasher_names());
        }
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("signers", &self.signers.read().keys().collect::<Vec<_>>())
            .field("verifiers", &self.verifiers.read().keys().collect::<Vec<_>>())
            .field("hashers", &self.hashers.read().keys().collect::<Vec<_>>())
            .field("parents", &self.parents.len())
            .finish()
    }
}

/// Public and private keys by name.
#[derive(Default)]
pub struct KeyRegistry {
    public_keys: RwLock<HashMap<String, Arc<PublicKey>>>,
    private_keys: RwLock<HashMap<String, Arc<PrivateKey>>>,
    parents: Vec<Arc<KeyRegistry>>,
}

impl KeyRegistry {
    pub fn new(parents: Vec<Arc<KeyRegistry>>) -> Self {
        Self {
            parents,
            ..Self::default()
        }
    }

    pub fn register_public_key(&self, name: impl Into<String>, key: PublicKey) {
        self.public_keys.write().insert(name.into(), Arc::new(key));
    }

    pub fn register_private_key(&self, name: impl Into<String>, key: PrivateKey) {
        self.private_keys.write().insert(name.into(), Arc::new(key));
    }

    pub fn get_public_key(&self, name: &str) -> Option<Arc<PublicKey>> {
        if let Some(k) = self.public_keys.read().get(name) {
            return Some(Arc::clone(k));
        }
        self.parents.iter().find_map(|p| p.get_public_key(name))
    }

    pub fn get_private_key(&self, name: &str) -> Option<Arc<PrivateKey>> {
        if let Some(k) = self.private_keys.read().get(name) {
            return Some(Arc::clone(k));
        }
        self.parents.iter().find_map(|p| p.get_private_key(name))
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("public_keys", &self.public_keys.read().keys().collect::<Vec<_>>())
            .field("private_keys", &self.private_keys.read().len())
            .field("parents", &self.parents.len())
            .finish()
    }
}

/// A handler registry paired with a key registry.
#[derive(Debug, Clone)]
pub struct Registry {
    handlers: Arc<HandlerRegistry>,
    keys: Arc<KeyRegistry>,
}

impl Registry {
    /// Fresh local tables layered over `handlers` and `keys` (the
    /// process-wide defaults when `None`).
    pub fn new(handlers: Option<Arc<HandlerRegistry>>, keys: Option<Arc<KeyRegistry>>) -> Self {
        let handlers = handlers.unwrap_or_else(default_handler_registry);
        let keys = keys.unwrap_or_else(default_key_registry);
        Self {
            handlers: Arc::new(HandlerRegistry::new(vec![handlers])),
            keys: Arc::new(KeyRegistry::new(vec![keys])),
        }
    }

    /// Use the given registries as they are, without a local layer.
    pub fn from_parts(handlers: Arc<HandlerRegistry>, keys: Arc<KeyRegistry>) -> Self {
        Self { handlers, keys }
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub fn keys(&self) -> &Arc<KeyRegistry> {
        &self.keys
    }

    pub fn get_signer(&self, name: &str) -> Option<Arc<dyn Signer>> {
        self.handlers.get_signer(name)
    }

    pub fn get_verifier(&self, name: &str) -> Option<Arc<dyn Verifier>> {
        self.handlers.get_verifier(name)
    }

    pub fn get_hasher(&self, name: &str) -> Option<Arc<dyn Hasher>> {
        self.handlers.get_hasher(name)
    }

    pub fn get_public_key(&self, name: &str) -> Option<Arc<PublicKey>> {
        self.keys.get_public_key(name)
    }

    pub fn get_private_key(&self, name: &str) -> Option<Arc<PrivateKey>> {
        self.keys.get_private_key(name)
    }
}

static DEFAULT_HANDLERS: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();
static DEFAULT_KEYS: OnceLock<Arc<KeyRegistry>> = OnceLock::new();
static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Process-wide handler registry with the built-in handlers.
pub fn default_handler_registry() -> Arc<HandlerRegistry> {
    Arc::clone(DEFAULT_HANDLERS.get_or_init(|| Arc::new(HandlerRegistry::with_builtin_handlers())))
}

/// Process-wide key registry (initially empty).
pub fn default_key_registry() -> Arc<KeyRegistry> {
    Arc::clone(DEFAULT_KEYS.get_or_init(|| Arc::new(KeyRegistry::default())))
}

/// The process-wide defaults as a [`Registry`].
pub fn default_registry() -> Registry {
    DEFAULT_REGISTRY
        .get_or_init(|| Registry::from_parts(default_handler_registry(), default_key_registry()))
        .clone()
}
