//! # RSASSA-PKCS1-V1_5 Signature Handler
//!
//! Signs the decoded descriptor digest with PKCS#1 v1.5 padding. The
//! DigestInfo prefix is chosen from the hash algorithm the digest was
//! produced with (`SHA-256` or `SHA-512`).

use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha512};

use cvsign_core::SignatureSpec;

use crate::error::CryptoError;
use crate::handler::{decode_digest, Signer, Verifier};
use crate::hasher::{SHA256, SHA512};
use crate::keys::{PrivateKey, PublicKey};

/// Algorithm name of [`RsaSignatureHandler`].
pub const RSASSA_PKCS1_V1_5: &str = "RSASSA-PKCS1-V1_5";

/// Media type of RSA signature values.
pub const MEDIA_TYPE_RSA: &str = "application/vnd.cvsign.signature.rsa";

/// Default modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// `RSASSA-PKCS1-V1_5` signature handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaSignatureHandler;

fn padding(hash_algorithm: &str) -> Result<Pkcs1v15Sign, CryptoError> {
    match hash_algorithm {
        SHA256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        SHA512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        other => Err(CryptoError::UnknownAlgorithm {
            kind: "hash algorithm",
            name: other.to_string(),
        }),
    }
}

/// Generate an RSA key pair.
pub fn generate_key_pair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey), CryptoError> {
    let mut rng = rand::rngs::OsRng;
    let private = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::Key(format!("RSA key generation failed: {e}")))?;
    let public = private.to_public_key();
    Ok((private, public))
}

/// PKCS#8 PEM text of a private key.
pub fn private_key_pem(key: &RsaPrivateKey) -> Result<String, CryptoError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| CryptoError::Key(format!("PEM encoding failed: {e}")))
}

impl Signer for RsaSignatureHandler {
    fn algorithm(&self) -> &str {
        RSASSA_PKCS1_V1_5
    }

    fn sign(
        &self,
        digest: &str,
        hash_algorithm: &str,
        issuer: Option<&str>,
        key: &PrivateKey,
    ) -> Result<SignatureSpec, CryptoError> {
        let PrivateKey::Rsa(sk) = key else {
            return Err(CryptoError::Key(format!(
                "{RSASSA_PKCS1_V1_5} requires an RSA private key, got {}",
                key.kind()
            )));
        };
        let hashed = decode_digest(digest, hash_algorithm)?;
        let sig = sk
            .sign(padding(hash_algorithm)?, &hashed)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(SignatureSpec {
            algorithm: RSASSA_PKCS1_V1_5.to_string(),
            value: hex::encode(sig),
            media_type: MEDIA_TYPE_RSA.to_string(),
            issuer: issuer.map(str::to_string),
        })
    }
}

impl Verifier for RsaSignatureHandler {
    fn algorithm(&self) -> &str {
        RSASSA_PKCS1_V1_5
    }

    fn verify(
        &self,
        digest: &str,
        hash_algorithm: &str,
        signature: &SignatureSpec,
        key: &PublicKey,
    ) -> Result<(), CryptoError> {
        let PublicKey::Rsa(pk) = key else {
            return Err(CryptoError::Key(format!(
                "{RSASSA_PKCS1_V1_5} requires an RSA public key, got {}",
                key.kind()
            )));
        };
        let hashed = decode_digest(digest, hash_algorithm)?;
        let sig = hex::decode(&signature.value)?;
        pk.verify(padding(hash_algorithm)?, &hashed, &sig)
            .map_err(|e| CryptoError::VerificationFailed(format!("{RSASSA_PKCS1_V1_5}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{Hasher, Sha256Hasher, Sha512Hasher};

    #[test]
    fn sign_verify_sha256_and_sha512() {
        let (sk, pk) = generate_key_pair(1024).unwrap();
        let sk = PrivateKey::Rsa(sk);
        let pk = PublicKey::Rsa(pk);
        for (hash, digest) in [
            (SHA256, Sha256Hasher.hex_digest(b"cd")),
            (SHA512, Sha512Hasher.hex_digest(b"cd")),
        ] {
            let sig = Signer::sign(&RsaSignatureHandler, &digest, hash, None, &sk).unwrap();
            assert_eq!(sig.media_type, MEDIA_TYPE_RSA);
            Verifier::verify(&RsaSignatureHandler, &digest, hash, &sig, &pk).unwrap();
        }
    }

    #[test]
    fn tampered_digest_fails() {
        let (sk, pk) = generate_key_pair(1024).unwrap();
        let digest = Sha256Hasher.hex_digest(b"cd");
        let sig = Signer::sign(&RsaSignatureHandler, &digest, SHA256, None, &PrivateKey::Rsa(sk)).unwrap();
        let other = Sha256Hasher.hex_digest(b"ce");
        assert!(matches!(
            Verifier::verify(&RsaSignatureHandler, &other, SHA256, &sig, &PublicKey::Rsa(pk)),
            Err(CryptoError::VerificationFailed(_))
        ));
    }

    #[test]
    fn pem_roundtrip_through_key_parsing() {
        let (sk, pk) = generate_key_pair(1024).unwrap();
        let parsed = PrivateKey::parse(&private_key_pem(&sk).unwrap()).unwrap();
        assert_eq!(parsed.public_key(), PublicKey::Rsa(pk.clone()));
        let pk_text = PublicKey::Rsa(pk.clone()).to_text().unwrap();
        assert_eq!(PublicKey::parse(&pk_text).unwrap(), PublicKey::Rsa(pk));
    }

    #[test]
    fn wrong_key_kind() {
        let kp = crate::ed25519::Ed25519KeyPair::from_seed(&[1u8; 32]);
        let digest = Sha256Hasher.hex_digest(b"cd");
        assert!(matches!(
            Signer::sign(&RsaSignatureHandler, &digest, SHA256, None, &PrivateKey::Ed25519(kp)),
            Err(CryptoError::Key(_))
        ));
    }
}
