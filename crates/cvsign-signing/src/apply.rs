//! # Digest Propagation, Signing and Verification
//!
//! [`apply`] walks a component version and everything it references,
//! depth-first. For each version it
//!
//! 1. digests every reference (recursing where needed),
//! 2. digests every resource through the blob digesters,
//! 3. computes the normalized descriptor digest,
//! 4. verifies and/or creates signatures,
//! 5. collects the results to write back when updating.
//!
//! All checks run against a private copy of the descriptor. Referenced
//! versions stay open in the [`WalkingState`] until the root version has
//! passed every check; only then are their updates written and their
//! handles closed. A failed walk leaves every descriptor untouched.
//!
//! Each version is walked at most once per [`WalkingState`]; later
//! references to it are answered from the state's closure, including the
//! digests an earlier root recorded for it.

use std::sync::Arc;

use cvsign_core::{ComponentDescriptor, ComponentReference, ComponentVersionKey, DigestSpec, Signature};
use cvsign_crypto::Hasher;

use crate::access::{ComponentVersionAccess, OnceCloser};
use crate::context::ContextId;
use crate::digester::DigesterType;
use crate::error::SigningError;
use crate::options::Options;
use crate::printer::{NullPrinter, Printer};
use crate::walk::{DescriptorUpdate, VersionInfo, WalkingState, KIND_COMPONENT_VERSION};

/// Compute (and depending on `options`, verify, sign and store) the digest
/// of `cv` and its reference graph.
///
/// `printer` receives one progress line per element; `state` may be shared
/// between calls to reuse already computed digests. The handle `cv` is not
/// closed.
///
/// # Errors
///
/// Any [`SigningError`]; errors below a reference or resource are wrapped
/// with the element and the walk history.
pub fn apply(
    printer: Option<&dyn Printer>,
    state: Option<&mut WalkingState>,
    cv: &mut dyn ComponentVersionAccess,
    options: &Options,
) -> Result<DigestSpec, SigningError> {
    let mut opts = options.clone();
    opts.complete()?;
    let mut local = WalkingState::new();
    let state = state.unwrap_or(&mut local);
    let printer = printer.unwrap_or(&NullPrinter);
    let (digest, update) = match apply_version(printer, state, cv, &opts, None) {
        Ok(result) => result,
        Err(e) => {
            state.discard_pending();
            return Err(e);
        }
    };
    state.commit_pending()?;
    if let Some(update) = update {
        update.apply_to(cv.descriptor_mut());
    }
    Ok(digest)
}

/// The digest of a version and, when updating, what to write back into it.
type Applied = (DigestSpec, Option<DescriptorUpdate>);

fn apply_version(
    printer: &dyn Printer,
    state: &mut WalkingState,
    cv: &mut dyn ComponentVersionAccess,
    opts: &Options,
    parent: Option<ContextId>,
) -> Result<Applied, SigningError> {
    let key = cv.key().clone();
    if !state.add(KIND_COMPONENT_VERSION, &key)? {
        return state
            .get(&key)
            .map(|info| (info.digest.clone(), None))
            .ok_or_else(|| SigningError::Configuration(format!("no result recorded for {key}")));
    }
    tracing::debug!(component = %key, sign = opts.do_sign(), verify = opts.do_verify(), "applying to component version");
    let result = walk_version(printer, state, cv, opts, parent, &key);
    if result.is_err() {
        state.abort(KIND_COMPONENT_VERSION, &key);
    }
    result
}

fn walk_version(
    printer: &dyn Printer,
    state: &mut WalkingState,
    cv: &mut dyn ComponentVersionAccess,
    opts: &Options,
    parent: Option<ContextId>,
    key: &ComponentVersionKey,
) -> Result<Applied, SigningError> {
    let mut cd = cv.descriptor().clone();
    let ctx = state.contexts_mut().create(&cd, parent, opts.do_sign())?;

    let names: Vec<String> = if opts.signature_names.is_empty() {
        cd.signatures.iter().map(|s| s.name.clone()).collect()
    } else {
        opts.signature_names.clone()
    };
    if names.is_empty() && opts.do_verify() {
        return Err(SigningError::NoSignature(state.history_string()));
    }

    for i in 0..cd.component.component_references.len() {
        let reference = cd.component.component_references[i].clone();
        let digest = reference_digest(printer, state, opts, ctx, &reference).map_err(|e| SigningError::Reference {
            reference: reference.name.clone(),
            key: format!("{}:{}", reference.component_name, reference.version),
            history: state.history_string(),
            source: Box::new(e),
        })?;
        cd.component.component_references[i].digest = Some(digest);
    }

    let hasher = Arc::clone(opts.hasher()?);
    for i in 0..cd.component.resources.len() {
        let resource = &cd.component.resources[i];
        let identity = resource.identity();
        match resource_digest(printer, cv, opts, &hasher, i, &cd) {
            Ok(Some(d)) => cd.component.resources[i].digest = Some(d),
            Ok(None) => {}
            Err(e) => {
                return Err(SigningError::Resource {
                    resource: identity,
                    history: state.history_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    let algo = opts.normalization()?;
    let digest = descriptor_digest(&cd, hasher.as_ref(), algo)?;
    tracing::debug!(component = %key, digest = %digest.value, "descriptor digest computed");

    let mut verified: Vec<String> = Vec::new();
    if opts.do_verify() {
        verify_signatures(printer, state, opts, &cd, &digest, &names, &mut verified)?;
    }

    let mut signed = false;
    if let Some(name) = opts.signature_name().filter(|_| opts.do_sign()) {
        if !opts.do_verify() || !verified.iter().any(|v| v == name) {
            let signature = sign(opts, name, &digest)?;
            tracing::debug!(component = %key, signature = %name, "signed");
            printer.print(&format!("  signature {name} created"));
            cd.set_signature(signature);
            signed = true;
        }
    }

    state.contexts_mut().propagate(ctx, &cd, &digest, signed)?;

    let update = if opts.do_update() {
        let mut update = DescriptorUpdate::from_descriptor(&cd);
        if signed {
            update.signatures = Some(cd.signatures.clone());
            if parent.is_none() {
                let nested = state.contexts().nested_digests(ctx);
                cd.nested_digests = nested.clone();
                update.nested_digests = Some(nested);
            }
        }
        Some(update)
    } else {
        None
    };

    state.finish(
        key,
        VersionInfo {
            descriptor: cd,
            digest: digest.clone(),
        },
    );
    Ok((digest, update))
}

/// Digest of a referenced version: the stored one, a memoized one, or a
/// freshly walked one.
fn reference_digest(
    printer: &dyn Printer,
    state: &mut WalkingState,
    opts: &Options,
    ctx: ContextId,
    reference: &ComponentReference,
) -> Result<DigestSpec, SigningError> {
    let ref_key = reference.key()?;
    let existing = reference.digest.as_ref();
    if existing.is_none() && !opts.do_update() {
        return Err(SigningError::MissingDigest);
    }

    let walk = must_walk(state, opts, ctx, &ref_key);
    let Some(existing_digest) = existing.filter(|_| !walk) else {
        let nested_opts = opts.for_reference(existing)?;
        let calculated = walk_reference(printer, state, &nested_opts, ctx, &ref_key)?;
        if let Some(e) = existing {
            if *e != calculated {
                return Err(SigningError::DigestMismatch {
                    calculated,
                    existing: e.clone(),
                });
            }
        }
        printer.print(&format!("  reference {}: digest {}", reference.name, calculated));
        return Ok(calculated);
    };

    state.contexts_mut().link(ctx, &ref_key, existing_digest)?;
    printer.print(&format!("  reference {}: digest {} (not walked)", reference.name, existing_digest));
    Ok(existing_digest.clone())
}

/// Whether a reference that already carries a digest is walked anyway.
/// A signing root walks every reference it has no resource digests for.
fn must_walk(state: &WalkingState, opts: &Options, ctx: ContextId, key: &ComponentVersionKey) -> bool {
    if opts.verify_digests || opts.recursively || opts.do_verify() {
        return true;
    }
    let contexts = state.contexts();
    contexts.root_of(ctx).is_some_and(|r| r.sign) && contexts.get_preset(ctx, key).is_none()
}

fn walk_reference(
    printer: &dyn Printer,
    state: &mut WalkingState,
    opts: &Options,
    ctx: ContextId,
    ref_key: &ComponentVersionKey,
) -> Result<DigestSpec, SigningError> {
    if let Some(info) = state.get(ref_key) {
        let digest = memoized_digest(opts, info)?;
        tracing::debug!(component = %ref_key, "reference satisfied from closure");
        let contexts = state.contexts_mut();
        contexts.adopt_finished(ctx, ref_key)?;
        contexts.link(ctx, ref_key, &digest)?;
        return Ok(digest);
    }
    if state.is_in_progress(KIND_COMPONENT_VERSION, ref_key) {
        return Err(SigningError::Cycle(state.cycle_path(ref_key)));
    }

    let resolver = opts
        .resolver
        .as_ref()
        .ok_or_else(|| SigningError::Configuration("no resolver configured".to_string()))?;
    let handle = resolver.lookup_component_version(ref_key.name(), ref_key.version())?;
    let mut nested = OnceCloser::new(handle);
    printer.print(&format!("applying to version {ref_key}..."));
    let gapped = printer.add_gap("  ");
    let (digest, update) = apply_version(gapped.as_ref(), state, &mut *nested, opts, Some(ctx))?;
    state.defer_close(nested, update);
    Ok(digest)
}

/// The closure digest, recomputed from the stored descriptor when `opts`
/// asks for other algorithms.
fn memoized_digest(opts: &Options, info: &VersionInfo) -> Result<DigestSpec, SigningError> {
    let hasher = opts.hasher()?;
    let algo = opts.normalization()?;
    if info.digest.hash_algorithm == hasher.algorithm() && info.digest.normalisation_algorithm == algo {
        return Ok(info.digest.clone());
    }
    descriptor_digest(&info.descriptor, hasher.as_ref(), algo)
}

/// The digest to store for resource `index`, or `None` if it has none.
fn resource_digest(
    printer: &dyn Printer,
    cv: &dyn ComponentVersionAccess,
    opts: &Options,
    hasher: &Arc<dyn Hasher>,
    index: usize,
    cd: &ComponentDescriptor,
) -> Result<Option<DigestSpec>, SigningError> {
    let resource = &cd.component.resources[index];
    let Some(access_type) = resource.access_type() else {
        return Ok(None);
    };
    if opts.skip_access_types.contains(access_type) {
        printer.print(&format!("  resource {}: excluded from signature", resource.identity()));
        return Ok(Some(DigestSpec::exclude_from_signature()));
    }
    if resource.digest.as_ref().is_some_and(DigestSpec::is_excluded) {
        return Ok(resource.digest.clone());
    }
    if resource.has_none_access() {
        return Ok(None);
    }

    let method = cv
        .access_method(index)?
        .ok_or_else(|| SigningError::NoAccessMethod(access_type.to_string()))?;
    let requested: Vec<DigesterType> = resource.digest.iter().map(DigesterType::of).collect();
    let digests = opts.blob_digesters()?.determine_digests(
        &resource.resource_type,
        hasher.as_ref(),
        opts.registry()?,
        method.as_ref(),
        &requested,
    )?;
    let calculated = digests.into_iter().next().ok_or_else(|| SigningError::NoDigester {
        resource_type: resource.resource_type.clone(),
        access_type: access_type.to_string(),
    })?;
    if let Some(existing) = &resource.digest {
        if *existing != calculated {
            return Err(SigningError::DigestMismatch {
                calculated,
                existing: existing.clone(),
            });
        }
    }
    printer.print(&format!("  resource {}: digest {}", resource.identity(), calculated));
    Ok(Some(calculated))
}

fn descriptor_digest(cd: &ComponentDescriptor, hasher: &dyn Hasher, algo: &str) -> Result<DigestSpec, SigningError> {
    let bytes = cd.normalize(algo)?;
    Ok(DigestSpec::new(hasher.algorithm(), algo, hasher.digest(&bytes)))
}

fn verify_signatures(
    printer: &dyn Printer,
    state: &WalkingState,
    opts: &Options,
    cd: &ComponentDescriptor,
    digest: &DigestSpec,
    names: &[String],
    verified: &mut Vec<String>,
) -> Result<(), SigningError> {
    let registry = opts.registry()?;
    for name in names {
        let Some(sig) = cd.signature(name) else {
            continue;
        };
        let explicit = opts.signature_configured(name);

        let Some(public_key) = opts.public_key(name)? else {
            if explicit {
                return Err(SigningError::NotFound {
                    kind: "public key",
                    name: name.clone(),
                });
            }
            tracing::warn!(signature = %name, "no public key found, skipping signature");
            printer.print(&format!("  warning: no public key for signature {name}"));
            continue;
        };
        let Some(verifier) = registry.get_verifier(&sig.signature.algorithm) else {
            if explicit {
                return Err(SigningError::UnknownAlgorithm {
                    kind: "signing algorithm",
                    name: sig.signature.algorithm.clone(),
                });
            }
            tracing::warn!(signature = %name, algorithm = %sig.signature.algorithm, "no verifier found, skipping signature");
            printer.print(&format!("  warning: no verifier for signature {name}"));
            continue;
        };

        let expected = if sig.digest.digester_type() == digest.digester_type() {
            digest.clone()
        } else {
            let h = registry
                .get_hasher(&sig.digest.hash_algorithm)
                .ok_or_else(|| SigningError::UnknownAlgorithm {
                    kind: "hash algorithm",
                    name: sig.digest.hash_algorithm.clone(),
                })?;
            descriptor_digest(cd, h.as_ref(), &sig.digest.normalisation_algorithm)?
        };
        if sig.digest != expected {
            return Err(SigningError::SignatureDigestMismatch {
                name: name.clone(),
                recorded: sig.digest.clone(),
                calculated: expected,
            });
        }

        verifier
            .verify(&sig.digest.value, &sig.digest.hash_algorithm, &sig.signature, &public_key)
            .map_err(|source| SigningError::InvalidSignature {
                name: name.clone(),
                source,
            })?;
        tracing::debug!(signature = %name, history = %state.history_string(), "signature verified");
        printer.print(&format!("  signature {name} verified"));
        verified.push(name.clone());
    }

    if verified.is_empty() && !opts.do_sign() {
        return Err(SigningError::NoVerifiableSignature(state.history_string()));
    }
    Ok(())
}

fn sign(opts: &Options, name: &str, digest: &DigestSpec) -> Result<Signature, SigningError> {
    let private_key = opts.private_key(name).ok_or_else(|| SigningError::NotFound {
        kind: "private key",
        name: name.to_string(),
    })?;
    let signer = opts
        .signer
        .as_ref()
        .ok_or_else(|| SigningError::Configuration("no signer configured".to_string()))?;
    let mut spec = signer.sign(&digest.value, &digest.hash_algorithm, opts.issuer.as_deref(), &private_key)?;
    match (&spec.issuer, &opts.issuer) {
        (Some(reported), Some(configured)) if reported != configured => {
            return Err(SigningError::IssuerMismatch {
                reported: reported.clone(),
                configured: configured.clone(),
            });
        }
        (None, Some(configured)) => spec.issuer = Some(configured.clone()),
        _ => {}
    }
    Ok(Signature {
        name: name.to_string(),
        digest: digest.clone(),
        signature: spec,
    })
}
