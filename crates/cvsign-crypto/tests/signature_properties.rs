//! # Signature Handler Properties
//!
//! Every well-formed digest signs and verifies under both handlers; any
//! other digest of the same length fails verification, and digests of the
//! wrong length are rejected before signing.

use std::sync::OnceLock;

use proptest::prelude::*;

use cvsign_crypto::rsassa::generate_key_pair;
use cvsign_crypto::{
    CryptoError, Ed25519KeyPair, Ed25519SignatureHandler, PrivateKey, PublicKey, RsaSignatureHandler, Signer,
    Verifier, SHA256, SHA512,
};

/// RSA key generation is slow; all cases share one key pair.
fn rsa_keys() -> &'static (PrivateKey, PublicKey) {
    static KEYS: OnceLock<(PrivateKey, PublicKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let (sk, pk) = generate_key_pair(1024).unwrap();
        (PrivateKey::Rsa(sk), PublicKey::Rsa(pk))
    })
}

fn ed_keys(seed: [u8; 32]) -> (PrivateKey, PublicKey) {
    let kp = Ed25519KeyPair::from_seed(&seed);
    let pk = PublicKey::Ed25519(kp.public_key());
    (PrivateKey::Ed25519(kp), pk)
}

/// `digest` with byte `index` flipped.
fn tampered(digest: &[u8], index: usize) -> String {
    let mut other = digest.to_vec();
    let i = index % other.len();
    other[i] ^= 0x01;
    hex::encode(other)
}

fn sha256_digest() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 32)
}

fn sha512_digest() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 64)
}

proptest! {
    #[test]
    fn ed25519_round_trip(seed in any::<[u8; 32]>(), digest in sha256_digest(), flip in any::<usize>()) {
        let (sk, pk) = ed_keys(seed);
        let value = hex::encode(&digest);
        let sig = Ed25519SignatureHandler.sign(&value, SHA256, Some("acme"), &sk).unwrap();
        prop_assert_eq!(sig.issuer.as_deref(), Some("acme"));
        prop_assert!(Ed25519SignatureHandler.verify(&value, SHA256, &sig, &pk).is_ok());
        prop_assert!(Ed25519SignatureHandler.verify(&tampered(&digest, flip), SHA256, &sig, &pk).is_err());
    }

    #[test]
    fn ed25519_signature_is_deterministic(seed in any::<[u8; 32]>(), digest in sha512_digest()) {
        let (sk, _) = ed_keys(seed);
        let value = hex::encode(&digest);
        let first = Ed25519SignatureHandler.sign(&value, SHA512, None, &sk).unwrap();
        let second = Ed25519SignatureHandler.sign(&value, SHA512, None, &sk).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn digest_length_must_match_hash(len in (1usize..96).prop_filter("not a SHA-256 length", |l| *l != 32)) {
        let (sk, _) = ed_keys([7; 32]);
        let value = hex::encode(vec![0xab; len]);
        let err = Ed25519SignatureHandler.sign(&value, SHA256, None, &sk).unwrap_err();
        let is_length_error = matches!(err, CryptoError::DigestLength { expected: 32, actual, .. } if actual == len);
        prop_assert!(is_length_error);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn rsa_round_trip(digest in sha256_digest(), wide in sha512_digest(), flip in any::<usize>()) {
        let (sk, pk) = rsa_keys();
        for (hash, bytes) in [(SHA256, &digest), (SHA512, &wide)] {
            let value = hex::encode(bytes);
            let sig = RsaSignatureHandler.sign(&value, hash, None, sk).unwrap();
            prop_assert!(RsaSignatureHandler.verify(&value, hash, &sig, pk).is_ok());
            prop_assert!(RsaSignatureHandler.verify(&tampered(bytes, flip), hash, &sig, pk).is_err());
        }
    }
}
