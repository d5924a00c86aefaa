//! Test harness: an in-process enrollment CA served over HTTP.
//!
//! `TestCa` mounts ECAP handlers on a wiremock server. `CreateCertificate`
//! checks the credential, verifies the request signature and issues a leaf
//! for the exact public key in the request. `ReadCACertificate` serves the
//! CA's self-signed root.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use enroll_core::{EnrollmentRequest, Result};
use enroll_node::keys::{KeyGenerator, NodeKeyPair, SystemKeyGenerator};
use enroll_node::signer;
use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Private keys handed out by [`RecordingKeyGenerator`], PKCS#8 DER
pub type KeyLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Key generator that remembers every key it produced.
///
/// The fake CA needs the private half to have rcgen issue a certificate for
/// the node's public key.
#[derive(Default)]
pub struct RecordingKeyGenerator {
    inner: SystemKeyGenerator,
    pub log: KeyLog,
}

impl RecordingKeyGenerator {
    /// Generator appending to an existing log
    pub fn sharing(log: KeyLog) -> Self {
        Self {
            inner: SystemKeyGenerator::new(),
            log,
        }
    }
}

impl KeyGenerator for RecordingKeyGenerator {
    fn generate(&self) -> Result<NodeKeyPair> {
        let key = self.inner.generate()?;
        self.log.lock().unwrap().push(key.pkcs8_der().to_vec());
        Ok(key)
    }
}

/// Signing material of the fake CA
pub struct CaMaterial {
    pub root: Certificate,
    pub root_key: KeyPair,
}

impl CaMaterial {
    pub fn generate() -> Self {
        let root_key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, "Test ECA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root = params.self_signed(&root_key).unwrap();
        Self { root, root_key }
    }

    pub fn root_der(&self) -> Vec<u8> {
        self.root.der().to_vec()
    }
}

/// `CreateCertificate` handler
struct IssueCertificate {
    ca: Arc<CaMaterial>,
    keys: KeyLog,
    identity: String,
    password: String,
}

impl Respond for IssueCertificate {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "malformed body"}));
        };
        if body["id"]["id"] != self.identity || body["pw"]["pw"] != self.password {
            return ResponseTemplate::new(401)
                .set_body_json(json!({"error": "identity or password do not match"}));
        }

        let Ok(parsed) = serde_json::from_value::<EnrollmentRequest>(body) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "malformed request"}));
        };
        if signer::verify_request(&parsed).is_err() {
            return ResponseTemplate::new(401).set_body_json(json!({"error": "bad signature"}));
        }

        let Some(subject_key) = self.subject_key(&parsed.public_key.key) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "unknown key"}));
        };

        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, self.identity.as_str());
        let leaf = params
            .signed_by(&subject_key, &self.ca.root, &self.ca.root_key)
            .unwrap();

        ResponseTemplate::new(200).set_body_json(json!({
            "cert": {"cert": STANDARD.encode(leaf.der())},
        }))
    }
}

impl IssueCertificate {
    /// Find the recorded private key whose public half the request carries
    fn subject_key(&self, public_key_der: &[u8]) -> Option<KeyPair> {
        let log = self.keys.lock().unwrap();
        log.iter()
            .find(|pkcs8| {
                NodeKeyPair::from_pkcs8(pkcs8)
                    .is_ok_and(|k| k.public_key_der() == public_key_der)
            })
            .and_then(|pkcs8| KeyPair::try_from(pkcs8.as_slice()).ok())
    }
}

/// A running fake CA
pub struct TestCa {
    pub server: MockServer,
    pub material: Arc<CaMaterial>,
}

impl TestCa {
    /// Start a CA that enrolls `identity` with `password`
    pub async fn start(identity: &str, password: &str, keys: KeyLog) -> Self {
        let server = MockServer::start().await;
        let material = Arc::new(CaMaterial::generate());

        Mock::given(method("POST"))
            .and(path("/ecap/CreateCertificate"))
            .respond_with(IssueCertificate {
                ca: material.clone(),
                keys,
                identity: identity.to_string(),
                password: password.to_string(),
            })
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ecap/ReadCACertificate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cert": STANDARD.encode(material.root_der()),
            })))
            .mount(&server)
            .await;

        Self { server, material }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of requests that reached `rpc`
    pub async fn calls_to(&self, rpc: &str) -> usize {
        let target = format!("/ecap/{rpc}");
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == target)
            .count()
    }
}
