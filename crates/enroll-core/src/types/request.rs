use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::encoding;
use crate::{EnrollError, Result};

/// Wall-clock time of a request, seconds precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch
    pub seconds: i64,
    /// Sub-second part, always zero for enrollment requests
    #[serde(default)]
    pub nanos: i32,
}

impl Timestamp {
    /// The current time truncated to whole seconds
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self {
            seconds: time.timestamp(),
            nanos: 0,
        }
    }
}

/// Identity (user or node id) a certificate is requested for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Enrollment id registered with the CA
    pub id: String,
}

impl Identity {
    /// Create a new identity
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Credential proving the requester owns the identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    /// One-time enrollment password
    pub pw: String,
}

impl Password {
    /// Create a new password credential
    pub fn new(pw: impl Into<String>) -> Self {
        Self { pw: pw.into() }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([redacted])")
    }
}

/// Key algorithm tag carried next to keys and signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoType {
    /// ECDSA over NIST P-256 with SHA-256
    Ecdsa,
    /// RSA
    Rsa,
    /// DSA
    Dsa,
}

/// Public key embedded in an enrollment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Key algorithm
    #[serde(rename = "type")]
    pub key_type: CryptoType,
    /// DER-encoded `SubjectPublicKeyInfo`
    #[serde(with = "encoding::bytes")]
    pub key: Vec<u8>,
}

/// Request signature as two big-integer components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature algorithm
    #[serde(rename = "type")]
    pub sig_type: CryptoType,
    /// `r` component, big-endian
    #[serde(with = "encoding::bytes")]
    pub r: Vec<u8>,
    /// `s` component, big-endian
    #[serde(with = "encoding::bytes")]
    pub s: Vec<u8>,
}

/// Signed request for an enrollment certificate (`CreateCertificate`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    /// Time the request was built
    pub ts: Timestamp,
    /// Identity being enrolled
    pub id: Identity,
    /// Enrollment credential
    pub pw: Password,
    /// Public half of the key pair generated for this attempt
    #[serde(rename = "pub")]
    pub public_key: PublicKey,
    /// Signature over [`EnrollmentRequest::canonical_bytes`]
    #[serde(default)]
    pub sig: Option<Signature>,
}

impl EnrollmentRequest {
    /// Build an unsigned request
    pub fn unsigned(
        ts: Timestamp,
        id: Identity,
        pw: Password,
        public_key: PublicKey,
    ) -> Self {
        Self {
            ts,
            id,
            pw,
            public_key,
            sig: None,
        }
    }

    /// Canonical byte form covered by the signature.
    ///
    /// CBOR encoding of every field with `sig` unset. Field order is fixed by
    /// the struct definition, so signer and CA produce identical bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let unsigned = UnsignedView {
            ts: &self.ts,
            id: &self.id,
            pw: &self.pw,
            public_key: &self.public_key,
            sig: None,
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&unsigned, &mut buf)
            .map_err(|e| EnrollError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Returns true once a signature is attached
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.sig.is_some()
    }
}

// Borrowing mirror of `EnrollmentRequest`; must keep the same field order.
#[derive(Serialize)]
struct UnsignedView<'a> {
    ts: &'a Timestamp,
    id: &'a Identity,
    pw: &'a Password,
    #[serde(rename = "pub")]
    public_key: &'a PublicKey,
    sig: Option<&'a Signature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EnrollmentRequest {
        EnrollmentRequest::unsigned(
            Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            },
            Identity::new("alice"),
            Password::new("pw123"),
            PublicKey {
                key_type: CryptoType::Ecdsa,
                key: vec![0x30, 0x59, 0x30, 0x13],
            },
        )
    }

    #[test]
    fn test_canonical_bytes_ignore_signature() {
        let unsigned = sample();
        let mut signed = sample();
        signed.sig = Some(Signature {
            sig_type: CryptoType::Ecdsa,
            r: vec![1; 32],
            s: vec![2; 32],
        });

        assert_eq!(
            unsigned.canonical_bytes().unwrap(),
            signed.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_canonical_bytes_cover_every_field() {
        let base = sample().canonical_bytes().unwrap();

        let mut other_id = sample();
        other_id.id = Identity::new("bob");
        assert_ne!(base, other_id.canonical_bytes().unwrap());

        let mut other_pw = sample();
        other_pw.pw = Password::new("pw124");
        assert_ne!(base, other_pw.canonical_bytes().unwrap());

        let mut other_ts = sample();
        other_ts.ts.seconds += 1;
        assert_ne!(base, other_ts.canonical_bytes().unwrap());
    }

    #[test]
    fn test_json_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"]["id"], "alice");
        assert_eq!(json["pub"]["type"], "ECDSA");
        assert_eq!(json["pub"]["key"], "MFkwEw==");
        assert!(json["sig"].is_null());
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("pw123"));
    }
}
