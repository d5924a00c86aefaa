use serde::{Deserialize, Serialize};

use super::encoding;
use super::request::Identity;

/// A single certificate as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cert {
    /// DER-encoded certificate (or concatenated chain)
    #[serde(with = "encoding::bytes")]
    pub cert: Vec<u8>,
}

/// Response to `CreateCertificate`
#[derive(Clone, Serialize, Deserialize)]
pub struct CreateCertificateResponse {
    /// The issued enrollment certificate
    pub cert: Cert,
    /// Private key material, only present when the CA generated keys for us
    #[serde(default, with = "encoding::optional_bytes")]
    pub key: Option<Vec<u8>>,
}

impl std::fmt::Debug for CreateCertificateResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCertificateResponse")
            .field("cert", &self.cert)
            .field("key", &self.key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Request body for `ReadCertificate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCertificateRequest {
    /// Identity whose certificate is wanted
    pub id: Identity,
    /// Optional certificate hash to select a specific issuance
    #[serde(default, with = "encoding::optional_bytes")]
    pub hash: Option<Vec<u8>>,
}

/// Empty request body (`ReadCACertificate`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Error body returned by the CA alongside a non-success status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable reason
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_response_without_key() {
        let resp: CreateCertificateResponse =
            serde_json::from_str(r#"{"cert":{"cert":"AQID"}}"#).unwrap();
        assert_eq!(resp.cert.cert, vec![1, 2, 3]);
        assert!(resp.key.is_none());
    }

    #[test]
    fn test_create_response_key_is_redacted() {
        let resp: CreateCertificateResponse =
            serde_json::from_str(r#"{"cert":{"cert":"AQID"},"key":"c2VjcmV0"}"#).unwrap();
        assert_eq!(resp.key.as_deref(), Some(&b"secret"[..]));
        assert!(!format!("{resp:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_bad_base64_is_rejected() {
        let parsed = serde_json::from_str::<Cert>(r#"{"cert":"not base64!"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_serializes_to_object() {
        assert_eq!(serde_json::to_string(&Empty::default()).unwrap(), "{}");
    }
}
