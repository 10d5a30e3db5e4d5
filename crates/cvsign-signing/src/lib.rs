//! # cvsign-signing — Digest Propagation, Signing and Verification
//!
//! Walks a component version and its transitive references, computes
//! resource and descriptor digests, verifies and creates signatures, and
//! optionally writes the results back into the descriptors.
//!
//! ## Modules
//!
//! - [`apply`]: the walk itself.
//! - [`options`]: what a walk does, and defaulting/validation.
//! - [`walk`] / [`context`]: visited set, memoized closure, cycle
//!   detection, and the digest tables that keep a walk consistent.
//! - [`access`]: resolver, component version and access method seams.
//! - [`digester`]: blob digesters by resource type.
//! - [`config`]: key configuration files.
//! - [`memory`]: an in-memory repository implementing the access seams.
//! - [`printer`]: progress output.
//!
//! ## Crate Policy
//!
//! - The walk is synchronous and single-threaded per call. Independent
//!   walks may run in parallel with separate [`WalkingState`]s.
//! - Live descriptors are written only after all checks for a version
//!   passed.
//! - No subscriber is installed; events go through `tracing`.

pub mod access;
pub mod apply;
pub mod config;
pub mod context;
pub mod digester;
pub mod error;
pub mod memory;
pub mod options;
pub mod printer;
pub mod walk;

pub use access::{AccessMethod, ComponentVersionAccess, OnceCloser, Resolver};
pub use apply::apply;
pub use config::{KeyConfig, KeySource, KEY_CONFIG_TYPE};
pub use context::{ContextId, DigestContext, DigestContexts, RootContextInfo};
pub use digester::{BlobDigester, BlobDigesterRegistry, DigesterType, GenericBlobDigester, OciArtifactDigester};
pub use error::{AccessError, ConfigError, ErrorKind, SigningError};
pub use memory::{MemoryComponentVersion, MemoryRepository};
pub use options::Options;
pub use printer::{BufferPrinter, NullPrinter, Printer, TracingPrinter};
pub use walk::{DescriptorUpdate, VersionInfo, WalkingState, KIND_COMPONENT_VERSION};
