//! # End-to-End Signing Flows
//!
//! Sign, verify and update component version graphs stored in a
//! `MemoryRepository`, with real SHA-2, RSA and Ed25519.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cvsign_core::{
    AccessSpec, ComponentDescriptor, ComponentReference, ComponentVersionKey, DigestSpec, Label, Resource,
    EXCLUDE_FROM_SIGNATURE, GENERIC_BLOB_DIGEST_V1, JSON_NORMALISATION_V1, JSON_NORMALISATION_V2,
};
use cvsign_crypto::rsassa::generate_key_pair;
use cvsign_crypto::{
    CertificateChain, Ed25519KeyPair, Ed25519SignatureHandler, Hasher, KeyCertificate, KeyRegistry, PrivateKey,
    PublicKey, Registry, RootCertificates, RsaSignatureHandler, Sha256Hasher, Sha512Hasher, ED25519,
    RSASSA_PKCS1_V1_5, SHA256, SHA512,
};
use cvsign_signing::{
    apply, AccessError, AccessMethod, BufferPrinter, ComponentVersionAccess, ErrorKind, KeyConfig,
    MemoryComponentVersion, MemoryRepository, Options, Resolver, SigningError, WalkingState,
};
use serde_json::json;

const A: &str = "acme.org/a";
const B: &str = "acme.org/b";
const C: &str = "acme.org/c";
const D: &str = "acme.org/d";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Store `name:v1` with one local blob resource and references to `refs`.
fn component(repo: &MemoryRepository, name: &str, content: &[u8], refs: &[&str]) {
    let mut cd = ComponentDescriptor::new(name, "v1");
    let blob = format!("{name}/data");
    cd.component
        .resources
        .push(Resource::new("data", "v1", "blob", AccessSpec::local_blob(&blob)));
    for &r in refs {
        let local = r.rsplit('/').next().unwrap_or(r);
        cd.component
            .component_references
            .push(ComponentReference::new(local, r, "v1"));
    }
    repo.add_descriptor(cd).unwrap();
    repo.put_blob(blob, content.to_vec());
}

fn ed_registry(name: &str, seed: u8) -> Registry {
    let reg = Registry::new(None, None);
    let kp = Ed25519KeyPair::from_seed(&[seed; 32]);
    reg.keys().register_public_key(name, PublicKey::Ed25519(kp.public_key()));
    reg.keys().register_private_key(name, PrivateKey::Ed25519(kp));
    reg
}

/// Apply to `name:v1` and commit the handle on success.
fn run(repo: &MemoryRepository, name: &str, opts: &Options) -> Result<DigestSpec, SigningError> {
    let mut cv = repo.open(name, "v1").unwrap();
    let digest = apply(None, None, &mut cv, opts)?;
    cv.close().unwrap();
    Ok(digest)
}

fn stored(repo: &MemoryRepository, name: &str) -> ComponentDescriptor {
    repo.descriptor(name, "v1").unwrap()
}

fn signing_options(repo: &MemoryRepository, reg: &Registry) -> Options {
    Options::new()
        .with_registry(reg.clone())
        .with_resolver(Arc::new(repo.clone()))
        .with_signer(Arc::new(Ed25519SignatureHandler), "acme")
}

fn verify_options(repo: &MemoryRepository, reg: &Registry) -> Options {
    Options::new()
        .with_registry(reg.clone())
        .with_resolver(Arc::new(repo.clone()))
        .with_verify_signature(true)
        .with_signature_name("acme")
}

#[test]
fn rsa_sign_verify_then_tampered_content_is_a_resource_mismatch() {
    init_tracing();
    let repo = MemoryRepository::new();
    component(&repo, A, b"hello", &[]);

    let (sk, pk) = generate_key_pair(1024).unwrap();
    let reg = Registry::new(None, None);
    reg.keys().register_private_key("acme", PrivateKey::Rsa(sk));
    reg.keys().register_public_key("acme", PublicKey::Rsa(pk));

    let opts = Options::new()
        .with_registry(reg.clone())
        .with_signer(Arc::new(RsaSignatureHandler), "acme");
    let digest = run(&repo, A, &opts).unwrap();

    let cd = stored(&repo, A);
    assert_eq!(digest.hash_algorithm, SHA256);
    assert_eq!(digest.normalisation_algorithm, JSON_NORMALISATION_V1);
    assert_eq!(digest.value, Sha256Hasher.digest(&cd.normalize(JSON_NORMALISATION_V1).unwrap()));
    assert_eq!(
        cd.component.resources[0].digest,
        Some(DigestSpec::new(SHA256, GENERIC_BLOB_DIGEST_V1, Sha256Hasher.hex_digest(b"hello")))
    );
    let sig = cd.signature("acme").unwrap();
    assert_eq!(sig.signature.algorithm, RSASSA_PKCS1_V1_5);
    assert_eq!(sig.digest, digest);

    let verify = Options::new()
        .with_registry(reg.clone())
        .with_verify_signature(true)
        .with_signature_name("acme");
    assert_eq!(run(&repo, A, &verify).unwrap(), digest);

    repo.put_blob(format!("{A}/data"), b"hellp".to_vec());
    let err = run(&repo, A, &verify).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(matches!(err, SigningError::Resource { ref resource, .. } if resource == "data:v1"));
    assert!(matches!(err.root_cause(), SigningError::DigestMismatch { .. }));
}

#[test]
fn sign_then_verify_round_trip_with_references() {
    init_tracing();
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let reg = ed_registry("acme", 1);

    let signed = run(&repo, A, &signing_options(&repo, &reg)).unwrap();
    assert_eq!(repo.lookup_count(), 1);

    let a = stored(&repo, A);
    let ref_digest = a.component.component_references[0].digest.clone().unwrap();
    assert_eq!(a.signature("acme").unwrap().signature.algorithm, ED25519);
    assert_eq!(a.nested_digests.len(), 1);
    assert_eq!(a.nested_digests[0].name, B);
    assert_eq!(a.nested_digests[0].digest, Some(ref_digest));
    assert_eq!(a.nested_digests[0].resource_digests.len(), 1);
    // Without recursion the referenced version is digested but not updated.
    assert!(stored(&repo, B).component.resources[0].digest.is_none());

    // Verification walks referenced versions again.
    repo.reset_lookup_count();
    assert_eq!(run(&repo, A, &verify_options(&repo, &reg)).unwrap(), signed);
    assert_eq!(repo.lookup_count(), 1);

    let deep = verify_options(&repo, &reg).with_verify_digests(true);
    assert_eq!(run(&repo, A, &deep).unwrap(), signed);
    assert_eq!(repo.lookup_count(), 2);

    // Changed content below a signed root no longer verifies; the digests
    // recorded in the root's nested digests catch it.
    repo.put_blob(format!("{B}/data"), b"bee!".to_vec());
    for opts in [verify_options(&repo, &reg), deep] {
        let err = run(&repo, A, &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(matches!(err, SigningError::Reference { ref reference, .. } if reference == "b"));
        assert!(matches!(err.root_cause(), SigningError::DigestSetMismatch(k) if k == "acme.org/b:v1"));
    }
}

#[test]
fn signing_records_nested_digests_of_digested_references() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let reg = ed_registry("acme", 12);
    let b_digest = run(&repo, B, &signing_options(&repo, &reg)).unwrap();
    let mut a = stored(&repo, A);
    a.component.component_references[0].digest = Some(b_digest.clone());
    repo.add_descriptor(a).unwrap();

    repo.reset_lookup_count();
    run(&repo, A, &signing_options(&repo, &reg)).unwrap();
    assert_eq!(repo.lookup_count(), 1);
    let a = stored(&repo, A);
    assert_eq!(a.nested_digests.len(), 1);
    assert_eq!(a.nested_digests[0].digest, Some(b_digest));
    assert_eq!(a.nested_digests[0].resource_digests.len(), 1);
    run(&repo, A, &verify_options(&repo, &reg)).unwrap();
}

#[test]
fn shared_state_reuses_digests_of_an_earlier_root() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let reg = ed_registry("acme", 13);
    let opts = signing_options(&repo, &reg);

    let mut state = WalkingState::new();
    let mut cv = repo.open(B, "v1").unwrap();
    let b_digest = apply(None, Some(&mut state), &mut cv, &opts).unwrap();
    cv.close().unwrap();

    repo.reset_lookup_count();
    let mut cv = repo.open(A, "v1").unwrap();
    apply(None, Some(&mut state), &mut cv, &opts).unwrap();
    cv.close().unwrap();
    assert_eq!(repo.lookup_count(), 0);

    let a = stored(&repo, A);
    assert_eq!(a.component.component_references[0].digest, Some(b_digest.clone()));
    assert_eq!(a.nested_digests.len(), 1);
    assert_eq!(a.nested_digests[0].digest, Some(b_digest));
    assert_eq!(
        a.nested_digests[0].resource_digests[0].digest,
        stored(&repo, B).component.resources[0].digest.clone().unwrap()
    );
    run(&repo, A, &verify_options(&repo, &reg)).unwrap();
}

#[test]
fn failed_root_leaves_referenced_versions_untouched() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"new", &[B]);
    let mut a = stored(&repo, A);
    a.component.resources[0].digest =
        Some(DigestSpec::new(SHA256, GENERIC_BLOB_DIGEST_V1, Sha256Hasher.hex_digest(b"old")));
    repo.add_descriptor(a).unwrap();

    let reg = ed_registry("acme", 14);
    let opts = signing_options(&repo, &reg).with_update(true).with_recursively(true);
    let mut state = WalkingState::new();
    let mut cv = repo.open(A, "v1").unwrap();
    let err = apply(None, Some(&mut state), &mut cv, &opts).unwrap_err();
    assert!(matches!(err, SigningError::Resource { .. }));
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let b = stored(&repo, B);
    assert!(b.component.resources[0].digest.is_none());
    assert!(b.signatures.is_empty());
    assert!(state.get(&ComponentVersionKey::new(B, "v1").unwrap()).is_none());
    assert_eq!(state.pending(), 0);

    // Once the root passes, the referenced version is updated as well.
    repo.put_blob(format!("{A}/data"), b"old".to_vec());
    let mut cv = repo.open(A, "v1").unwrap();
    apply(None, Some(&mut state), &mut cv, &opts).unwrap();
    cv.close().unwrap();
    let b = stored(&repo, B);
    assert!(b.component.resources[0].digest.is_some());
    assert!(b.signature("acme").is_some());
}

/// Resolver handing out handles that count their closes.
struct CountingResolver {
    repo: MemoryRepository,
    closes: Arc<AtomicUsize>,
}

struct CountedVersion {
    inner: MemoryComponentVersion,
    closes: Arc<AtomicUsize>,
}

impl ComponentVersionAccess for CountedVersion {
    fn key(&self) -> &ComponentVersionKey {
        self.inner.key()
    }

    fn descriptor(&self) -> &ComponentDescriptor {
        self.inner.descriptor()
    }

    fn descriptor_mut(&mut self) -> &mut ComponentDescriptor {
        self.inner.descriptor_mut()
    }

    fn access_method(&self, resource_index: usize) -> Result<Option<Box<dyn AccessMethod>>, AccessError> {
        self.inner.access_method(resource_index)
    }

    fn close(&mut self) -> Result<(), AccessError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}

impl Resolver for CountingResolver {
    fn lookup_component_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Box<dyn ComponentVersionAccess>, AccessError> {
        Ok(Box::new(CountedVersion {
            inner: self.repo.open(name, version)?,
            closes: Arc::clone(&self.closes),
        }))
    }
}

#[test]
fn referenced_version_is_closed_once_when_its_walk_fails() {
    let repo = MemoryRepository::new();
    let mut b = ComponentDescriptor::new(B, "v1");
    b.component
        .resources
        .push(Resource::new("data", "v1", "blob", AccessSpec::local_blob("missing")));
    repo.add_descriptor(b).unwrap();
    component(&repo, A, b"ay", &[B]);

    let closes = Arc::new(AtomicUsize::new(0));
    let resolver = CountingResolver {
        repo: repo.clone(),
        closes: Arc::clone(&closes),
    };
    let opts = Options::new()
        .with_resolver(Arc::new(resolver))
        .with_update(true)
        .with_recursively(true);

    let err = run(&repo, A, &opts).unwrap_err();
    assert!(matches!(err, SigningError::Reference { .. }));
    assert!(matches!(
        err.root_cause(),
        SigningError::Access(AccessError::NotFound { kind: "blob", .. })
    ));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(stored(&repo, A).component.component_references[0].digest.is_none());

    repo.put_blob("missing", b"found".to_vec());
    run(&repo, A, &opts).unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 2);
    assert!(stored(&repo, B).component.resources[0].digest.is_some());
}

#[test]
fn missing_key_is_fatal_only_for_named_signatures() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let acme = ed_registry("acme", 15);
    let other = ed_registry("other", 16);
    run(&repo, A, &signing_options(&repo, &acme)).unwrap();
    let sign_other = Options::new()
        .with_registry(other)
        .with_signer(Arc::new(Ed25519SignatureHandler), "other");
    run(&repo, A, &sign_other).unwrap();
    assert_eq!(stored(&repo, A).signatures.len(), 2);

    let implicit = Options::new().with_registry(acme.clone()).with_verify_signature(true);
    let printer = BufferPrinter::new();
    let mut cv = repo.open(A, "v1").unwrap();
    apply(Some(&printer), None, &mut cv, &implicit).unwrap();
    let lines = printer.lines();
    assert!(lines.contains(&"  signature acme verified".to_string()));
    assert!(lines.contains(&"  warning: no public key for signature other".to_string()));

    let explicit = implicit.with_signature_name("acme").with_signature_name("other");
    let err = run(&repo, A, &explicit).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(err, SigningError::NotFound { kind: "public key", ref name } if name == "other"));
}

#[test]
fn signed_float_label_verifies() {
    let repo = MemoryRepository::new();
    let mut cd = ComponentDescriptor::new(A, "v1");
    cd.component.labels.push(Label::new("ratio", json!(1.5)).signed());
    repo.add_descriptor(cd).unwrap();
    let reg = ed_registry("acme", 17);

    let signed = run(&repo, A, &signing_options(&repo, &reg)).unwrap();
    assert_eq!(run(&repo, A, &verify_options(&repo, &reg)).unwrap(), signed);

    let mut cd = stored(&repo, A);
    cd.component.labels[0].value = json!(2.5);
    repo.add_descriptor(cd).unwrap();
    let err = run(&repo, A, &verify_options(&repo, &reg)).unwrap_err();
    assert!(matches!(err, SigningError::SignatureDigestMismatch { .. }));
}

#[test]
fn diamond_resolves_shared_reference_once() {
    let repo = MemoryRepository::new();
    component(&repo, D, b"dee", &[]);
    component(&repo, B, b"bee", &[D]);
    component(&repo, C, b"see", &[D]);
    component(&repo, A, b"ay", &[B, C]);

    let opts = Options::new()
        .with_resolver(Arc::new(repo.clone()))
        .with_update(true)
        .with_recursively(true);
    let mut state = WalkingState::new();
    let mut cv = repo.open(A, "v1").unwrap();
    let digest = apply(None, Some(&mut state), &mut cv, &opts).unwrap();
    cv.close().unwrap();

    assert_eq!(repo.lookup_count(), 3);
    assert_eq!(state.closure().len(), 4);
    let d_digest = state.get(&cvsign_core::ComponentVersionKey::new(D, "v1").unwrap()).unwrap().digest.clone();
    assert_eq!(stored(&repo, B).component.component_references[0].digest, Some(d_digest.clone()));
    assert_eq!(stored(&repo, C).component.component_references[0].digest, Some(d_digest));
    assert!(stored(&repo, D).component.resources[0].digest.is_some());

    // A second walk with the same state is answered from the closure.
    let mut cv = repo.open(A, "v1").unwrap();
    assert_eq!(apply(None, Some(&mut state), &mut cv, &opts).unwrap(), digest);
    assert_eq!(repo.lookup_count(), 3);
}

#[test]
fn mismatch_leaves_live_descriptor_untouched() {
    let repo = MemoryRepository::new();
    let mut cd = ComponentDescriptor::new(A, "v1");
    cd.component
        .resources
        .push(Resource::new("fresh", "v1", "blob", AccessSpec::local_blob("fresh")));
    let mut wrong = Resource::new("stale", "v1", "blob", AccessSpec::local_blob("stale"));
    wrong.digest = Some(DigestSpec::new(SHA256, GENERIC_BLOB_DIGEST_V1, Sha256Hasher.hex_digest(b"old")));
    cd.component.resources.push(wrong);
    repo.add_descriptor(cd.clone()).unwrap();
    repo.put_blob("fresh", b"fresh".to_vec());
    repo.put_blob("stale", b"new".to_vec());

    let mut cv = repo.open(A, "v1").unwrap();
    let err = apply(None, None, &mut cv, &Options::new().with_update(true)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(cvsign_signing::ComponentVersionAccess::descriptor(&cv), &cd);
    assert_eq!(stored(&repo, A), cd);
}

#[test]
fn update_is_idempotent() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let reg = ed_registry("acme", 2);
    let signed = run(&repo, A, &signing_options(&repo, &reg)).unwrap();
    let after_sign = stored(&repo, A);

    let opts = verify_options(&repo, &reg).with_update(true);
    assert_eq!(run(&repo, A, &opts).unwrap(), signed);
    let first = stored(&repo, A);
    assert_eq!(run(&repo, A, &opts).unwrap(), signed);
    assert_eq!(stored(&repo, A), first);
    assert_eq!(first, after_sign);

    // Re-signing an already verified signature keeps it unchanged.
    let resign = signing_options(&repo, &reg).with_verify_signature(true);
    assert_eq!(run(&repo, A, &resign).unwrap(), signed);
    assert_eq!(stored(&repo, A).signatures, after_sign.signatures);
}

#[test]
fn reference_cycle_is_reported() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[B]);
    component(&repo, B, b"bee", &[A]);
    let opts = Options::new()
        .with_resolver(Arc::new(repo.clone()))
        .with_update(true)
        .with_recursively(true);
    let err = run(&repo, A, &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    assert!(matches!(
        err.root_cause(),
        SigningError::Cycle(p) if p == "acme.org/a:v1->acme.org/b:v1->acme.org/a:v1"
    ));
}

#[test]
fn missing_reference_digest_without_update_fails() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let err = run(&repo, A, &Options::new().with_resolver(Arc::new(repo.clone()))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err.root_cause(), SigningError::MissingDigest));
}

#[test]
fn skipped_and_contentless_resources() {
    let repo = MemoryRepository::new();
    let mut cd = ComponentDescriptor::new(A, "v1");
    cd.component
        .resources
        .push(Resource::new("data", "v1", "blob", AccessSpec::local_blob("data")));
    cd.component.resources.push(Resource::new(
        "image",
        "v1",
        "ociImage",
        AccessSpec::new("ociArtifact").with("imageReference", "ghcr.io/acme/a:v1"),
    ));
    cd.component
        .resources
        .push(Resource::new("docs", "v1", "plainText", AccessSpec::none()));
    repo.add_descriptor(cd).unwrap();
    repo.put_blob("data", b"data".to_vec());

    let opts = Options::new().with_update(true).with_skip_access_type("ociArtifact");
    let digest = run(&repo, A, &opts).unwrap();
    let cd = stored(&repo, A);
    assert!(cd.component.resources[0].digest.is_some());
    let skipped = cd.component.resources[1].digest.clone().unwrap();
    assert!(skipped.is_excluded());
    assert_eq!(skipped.normalisation_algorithm, EXCLUDE_FROM_SIGNATURE);
    assert!(cd.component.resources[2].digest.is_none());

    // The sentinel is kept on later walks without the skip option.
    assert_eq!(run(&repo, A, &Options::new().with_update(true)).unwrap(), digest);
}

#[test]
fn signature_under_other_algorithms_verifies() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let reg = ed_registry("acme", 3);
    let opts = signing_options(&repo, &reg)
        .with_hasher(Arc::new(Sha512Hasher))
        .with_normalization(JSON_NORMALISATION_V2);
    let signed = run(&repo, A, &opts).unwrap();
    assert_eq!(signed.hash_algorithm, SHA512);
    assert_eq!(signed.normalisation_algorithm, JSON_NORMALISATION_V2);

    let digest = run(&repo, A, &verify_options(&repo, &reg)).unwrap();
    assert_eq!(digest.hash_algorithm, SHA256);

    let mut cd = stored(&repo, A);
    cd.signatures[0].digest.value = Sha512Hasher.hex_digest(b"something else");
    repo.add_descriptor(cd).unwrap();
    let err = run(&repo, A, &verify_options(&repo, &reg)).unwrap_err();
    assert!(matches!(err, SigningError::SignatureDigestMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

#[test]
fn unsigned_or_unverifiable_descriptors() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let reg = ed_registry("acme", 4);

    let verify_any = Options::new().with_registry(reg.clone()).with_verify_signature(true);
    let err = run(&repo, A, &verify_any).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSignature);
    assert!(matches!(err, SigningError::NoSignature(_)));

    run(&repo, A, &signing_options(&repo, &reg)).unwrap();
    // Implicit signature names: a missing key is only a warning, which
    // leaves nothing verified.
    let err = run(&repo, A, &Options::new().with_verify_signature(true)).unwrap_err();
    assert!(matches!(err, SigningError::NoVerifiableSignature(_)));

    // A different key fails verification.
    let other = ed_registry("acme", 5);
    let err = run(&repo, A, &verify_options(&repo, &other)).unwrap_err();
    assert!(matches!(err, SigningError::InvalidSignature { .. }));
}

#[test]
fn certified_public_key_needs_trusted_root() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let root = Ed25519KeyPair::from_seed(&[10; 32]);
    let leaf = Ed25519KeyPair::from_seed(&[11; 32]);
    let cert = KeyCertificate::issue("acme", &PublicKey::Ed25519(leaf.public_key()), "root-ca", &root).unwrap();

    let signing = Registry::new(None, None);
    signing.keys().register_private_key("acme", PrivateKey::Ed25519(leaf));
    run(&repo, A, &signing_options(&repo, &signing)).unwrap();

    let keys = Arc::new(KeyRegistry::default());
    keys.register_public_key("acme", PublicKey::Certificate(CertificateChain::new(cert)));
    let verify = Options::new()
        .with_keys(Arc::clone(&keys))
        .with_verify_signature(true)
        .with_signature_name("acme");

    let err = run(&repo, A, &verify).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Certificate);

    let mut roots = RootCertificates::new();
    roots.add("root-ca", root.public_key());
    run(&repo, A, &verify.with_root_certs(roots)).unwrap();
}

#[test]
fn keys_from_configuration_file() {
    let dir = tempfile::tempdir().unwrap();
    let kp = Ed25519KeyPair::from_seed(&[20; 32]);
    std::fs::write(dir.path().join("acme.key"), hex::encode([20u8; 32])).unwrap();
    let mut f = std::fs::File::create(dir.path().join("keys.yaml")).unwrap();
    writeln!(
        f,
        "type: keys.config.cvsign/v1\npublicKeys:\n  acme:\n    data: \"{}\"\nprivateKeys:\n  acme:\n    path: acme.key",
        kp.public_key().to_hex()
    )
    .unwrap();

    let cfg = KeyConfig::from_path(dir.path().join("keys.yaml")).unwrap();
    let keys = Arc::new(KeyRegistry::default());
    cfg.apply_to_registry(&keys).unwrap();

    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let sign = Options::new()
        .with_keys(Arc::clone(&keys))
        .with_signer(Arc::new(Ed25519SignatureHandler), "acme");
    let signed = run(&repo, A, &sign).unwrap();
    let verify = Options::new()
        .with_keys(keys)
        .with_verify_signature(true)
        .with_signature_name("acme");
    assert_eq!(run(&repo, A, &verify).unwrap(), signed);
}

#[test]
fn printer_reports_nested_versions_indented() {
    let repo = MemoryRepository::new();
    component(&repo, B, b"bee", &[]);
    component(&repo, A, b"ay", &[B]);
    let printer = BufferPrinter::new();
    let mut cv = repo.open(A, "v1").unwrap();
    let opts = Options::new().with_resolver(Arc::new(repo.clone())).with_update(true);
    apply(Some(&printer), None, &mut cv, &opts).unwrap();

    let lines = printer.lines();
    assert!(lines.contains(&format!("applying to version {B}:v1...")));
    assert!(lines.iter().any(|l| l.starts_with("    resource data:v1: digest")));
    assert!(lines.iter().any(|l| l.starts_with("  reference b: digest")));
}

#[test]
fn issuer_is_recorded() {
    let repo = MemoryRepository::new();
    component(&repo, A, b"ay", &[]);
    let reg = ed_registry("acme", 6);
    run(&repo, A, &signing_options(&repo, &reg).with_issuer("Acme Inc.")).unwrap();
    assert_eq!(
        stored(&repo, A).signature("acme").unwrap().signature.issuer.as_deref(),
        Some("Acme Inc.")
    );
}
