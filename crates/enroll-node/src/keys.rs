//! Per-attempt ECDSA P-256 key pairs.
//!
//! Private keys live only in this process: they are held as PKCS#8 bytes that
//! are zeroized on drop, have no `Debug` output beyond a public-key
//! fingerprint, and are never serialized into a request.

use enroll_core::{EnrollError, Result, SecretBytes};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use std::fmt;

use crate::hash::sha256_hex;

/// DER prefix of a P-256 `SubjectPublicKeyInfo`, up to the BIT STRING payload.
///
/// `SEQUENCE { SEQUENCE { id-ecPublicKey, prime256v1 }, BIT STRING (0 unused) }`
const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// Key pair generated for a single enrollment attempt
pub struct NodeKeyPair {
    signing: EcdsaKeyPair,
    pkcs8: SecretBytes,
    public_key_der: Vec<u8>,
}

impl NodeKeyPair {
    /// Rebuild a key pair from PKCS#8 DER
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let rng = SystemRandom::new();
        let signing = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| EnrollError::KeyGeneration(format!("rejected PKCS#8 key: {e}")))?;

        let mut public_key_der = P256_SPKI_PREFIX.to_vec();
        public_key_der.extend_from_slice(signing.public_key().as_ref());

        Ok(Self {
            signing,
            pkcs8: SecretBytes::new(pkcs8.to_vec()),
            public_key_der,
        })
    }

    /// Public key as DER `SubjectPublicKeyInfo`, the form embedded in requests
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// Public key as an uncompressed SEC1 point
    #[must_use]
    pub fn public_key_raw(&self) -> &[u8] {
        self.signing.public_key().as_ref()
    }

    /// Private key as PKCS#8 DER, for writing to the node's key store.
    ///
    /// Secret: never log or transmit the returned bytes.
    #[must_use]
    pub fn pkcs8_der(&self) -> &[u8] {
        self.pkcs8.expose()
    }

    /// SHA-256 of the public key DER, hex
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha256_hex(&self.public_key_der)
    }

    pub(crate) const fn signing_key(&self) -> &EcdsaKeyPair {
        &self.signing
    }
}

impl fmt::Debug for NodeKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeyPair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Source of fresh key pairs, one per enrollment attempt
pub trait KeyGenerator: Send + Sync {
    /// Generate an independent key pair
    fn generate(&self) -> Result<NodeKeyPair>;
}

/// Generates P-256 keys from the operating system's CSPRNG
#[derive(Debug)]
pub struct SystemKeyGenerator {
    rng: SystemRandom,
}

impl SystemKeyGenerator {
    /// Create a generator backed by [`SystemRandom`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator for SystemKeyGenerator {
    fn generate(&self) -> Result<NodeKeyPair> {
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &self.rng)
            .map_err(|_| EnrollError::KeyGeneration("P-256 key generation failed".into()))?;
        NodeKeyPair::from_pkcs8(document.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::prelude::FromDer;
    use x509_parser::x509::SubjectPublicKeyInfo;

    #[test]
    fn test_generate_distinct_pairs() {
        let generator = SystemKeyGenerator::new();
        let a = generator.generate().unwrap();
        let b = generator.generate().unwrap();

        assert_ne!(a.public_key_der(), b.public_key_der());
        assert_ne!(a.pkcs8_der(), b.pkcs8_der());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_public_key_is_valid_spki() {
        let key = SystemKeyGenerator::new().generate().unwrap();
        let (rest, spki) = SubjectPublicKeyInfo::from_der(key.public_key_der()).unwrap();

        assert!(rest.is_empty());
        assert_eq!(spki.algorithm.algorithm.to_id_string(), "1.2.840.10045.2.1");
        assert_eq!(&*spki.subject_public_key.data, key.public_key_raw());
        assert_eq!(key.public_key_raw().len(), 65);
    }

    #[test]
    fn test_pkcs8_round_trip() {
        let key = SystemKeyGenerator::new().generate().unwrap();
        let reloaded = NodeKeyPair::from_pkcs8(key.pkcs8_der()).unwrap();
        assert_eq!(key.public_key_der(), reloaded.public_key_der());
    }

    #[test]
    fn test_bad_pkcs8_is_key_generation_error() {
        let err = NodeKeyPair::from_pkcs8(b"not a key").unwrap_err();
        assert!(matches!(err, EnrollError::KeyGeneration(_)));
    }

    #[test]
    fn test_debug_shows_only_fingerprint() {
        let key = SystemKeyGenerator::new().generate().unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains(&key.fingerprint()));
        assert!(!rendered.contains(&hex::encode(key.pkcs8_der())));
    }
}
