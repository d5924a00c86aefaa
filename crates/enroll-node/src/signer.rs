//! Building and signing enrollment requests.
//!
//! The signature covers [`EnrollmentRequest::canonical_bytes`], i.e. the
//! request with `sig` unset. ECDSA P-256 hashes those bytes with SHA-256 and
//! signs the digest; the fixed-width result is split into its `r` and `s`
//! components.

use enroll_core::{
    CryptoType, EnrollError, EnrollmentRequest, Identity, Password, PublicKey, Result, Signature,
    Timestamp,
};
use ring::rand::SystemRandom;
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::keys::NodeKeyPair;

/// Width of one P-256 scalar in bytes
const SCALAR_LEN: usize = 32;

/// Build a request for `identity` stamped with the current time and sign it
pub fn build_and_sign(identity: &str, credential: &str, key: &NodeKeyPair) -> Result<EnrollmentRequest> {
    build_and_sign_at(Timestamp::now(), identity, credential, key)
}

/// Build and sign a request with an explicit timestamp
pub fn build_and_sign_at(
    ts: Timestamp,
    identity: &str,
    credential: &str,
    key: &NodeKeyPair,
) -> Result<EnrollmentRequest> {
    let mut request = EnrollmentRequest::unsigned(
        ts,
        Identity::new(identity),
        Password::new(credential),
        PublicKey {
            key_type: CryptoType::Ecdsa,
            key: key.public_key_der().to_vec(),
        },
    );

    let message = request.canonical_bytes()?;
    let signature = key
        .signing_key()
        .sign(&SystemRandom::new(), &message)
        .map_err(|_| EnrollError::Signing("ECDSA signing failed".into()))?;

    let (r, s) = signature.as_ref().split_at(SCALAR_LEN);
    request.sig = Some(Signature {
        sig_type: CryptoType::Ecdsa,
        r: r.to_vec(),
        s: s.to_vec(),
    });

    Ok(request)
}

/// Check a request's signature against the public key it carries.
///
/// This is the check the CA performs; it recomputes the canonical bytes
/// exactly as the signer did.
pub fn verify_request(request: &EnrollmentRequest) -> Result<()> {
    let sig = request
        .sig
        .as_ref()
        .ok_or_else(|| EnrollError::Signing("request carries no signature".into()))?;

    if sig.sig_type != CryptoType::Ecdsa || request.public_key.key_type != CryptoType::Ecdsa {
        return Err(EnrollError::Signing("only ECDSA requests are supported".into()));
    }

    let (_, spki) = SubjectPublicKeyInfo::from_der(&request.public_key.key)
        .map_err(|e| EnrollError::Signing(format!("malformed public key: {e}")))?;

    let fixed = [fixed_scalar(&sig.r)?, fixed_scalar(&sig.s)?].concat();
    let message = request.canonical_bytes()?;

    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, &*spki.subject_public_key.data)
        .verify(&message, &fixed)
        .map_err(|_| EnrollError::Signing("signature does not verify".into()))
}

/// Left-pad a big-endian integer to the scalar width
fn fixed_scalar(component: &[u8]) -> Result<[u8; SCALAR_LEN]> {
    let trimmed = match component.iter().position(|b| *b != 0) {
        Some(first) => &component[first..],
        None => &[],
    };
    if trimmed.len() > SCALAR_LEN {
        return Err(EnrollError::Signing("signature component too long".into()));
    }

    let mut out = [0u8; SCALAR_LEN];
    out[SCALAR_LEN - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}
