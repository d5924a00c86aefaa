use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret bytes, zeroized on drop and never printed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wrap secret bytes
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the secret bytes. Do not store or log the result.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Number of secret bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([redacted; {}])", self.0.len())
    }
}

/// What the CA hands back for a successful `CreateCertificate`
#[derive(Debug, Clone)]
pub struct EnrollmentResult {
    /// Issued enrollment certificate, DER
    pub certificate: Vec<u8>,
    /// Private key material, only when the CA generated keys on our behalf
    pub key_material: Option<SecretBytes>,
}

/// Raw DER bytes of the CA certificate, or several concatenated DER certificates
#[derive(Clone, PartialEq, Eq)]
pub struct CaCertificateChain(Vec<u8>);

impl CaCertificateChain {
    /// Wrap raw DER bytes as returned by `ReadCACertificate`
    #[must_use]
    pub const fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// Raw DER bytes
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw DER bytes
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.0
    }

    /// Returns true if the CA sent nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CaCertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaCertificateChain({} bytes)", self.0.len())
    }
}
