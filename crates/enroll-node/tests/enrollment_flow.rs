//! End-to-end tests for node enrollment against an HTTP-served CA.
//!
//! Each test starts its own fake CA (see `common`) and drives the real
//! `CaClient` through `Enrollment`.

mod common;

use common::{RecordingKeyGenerator, TestCa};
use enroll_client::CaClient;
use enroll_core::{EnrollError, ErrorKind};
use enroll_node::orchestrator::{Enrollment, IdentityPhase, TrustPhase};
use enroll_node::trust::TrustStore;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn enrollment_for(
    ca: &TestCa,
    keys: &RecordingKeyGenerator,
    dir: &TempDir,
) -> Enrollment<CaClient, RecordingKeyGenerator> {
    Enrollment::with_key_generator(
        CaClient::new(&ca.uri()).unwrap(),
        RecordingKeyGenerator::sharing(keys.log.clone()),
        TrustStore::new(dir.path().join("certs").join("ca-chain.pem")),
    )
}

// ============================================================================
// Full enrollment
// ============================================================================

#[tokio::test]
async fn test_alice_enrolls_and_certificate_chains_to_pinned_root() {
    let keys = RecordingKeyGenerator::default();
    let ca = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();
    let mut enrollment = enrollment_for(&ca, &keys, &dir);

    let node = assert_ok!(enrollment.enroll("alice", "pw123").await);

    assert!(enrollment.is_enrolled());
    assert_eq!(enrollment.identity_phase(), IdentityPhase::CertificateReceived);
    assert_eq!(enrollment.trust_phase(), TrustPhase::TrustPoolLoaded);

    // the issued certificate carries the key generated for this attempt
    assert!(node.identity.certificate_matches_key().unwrap());

    // and it verifies against the pinned CA root
    let issuer = assert_ok!(node.trust_pool.verify(node.identity.certificate()));
    assert!(node.trust_pool.contains(&ca.material.root_der()));
    assert!(issuer.subject.contains("Test ECA"));

    // the pinned file is PEM and holds exactly the root
    let pinned = std::fs::read_to_string(enrollment.trust_store().path()).unwrap();
    assert!(pinned.starts_with("-----BEGIN CERTIFICATE-----"));
    assert_eq!(node.trust_pool.len(), 1);
}

#[tokio::test]
async fn test_restart_reloads_trust_without_contacting_ca() {
    let keys = RecordingKeyGenerator::default();
    let ca = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();

    let first = assert_ok!(enrollment_for(&ca, &keys, &dir).enroll("alice", "pw123").await);
    assert_eq!(ca.calls_to("ReadCACertificate").await, 1);

    let mut restarted = enrollment_for(&ca, &keys, &dir);
    let pool = assert_ok!(restarted.load_trust().await);

    assert_eq!(ca.calls_to("ReadCACertificate").await, 1);
    assert_eq!(pool.fingerprints(), first.trust_pool.fingerprints());
    assert_ok!(pool.verify(first.identity.certificate()));
}

#[tokio::test]
async fn test_repeat_enroll_never_repins_a_different_root() {
    let keys = RecordingKeyGenerator::default();
    let genuine = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let impostor = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();

    assert_ok!(enrollment_for(&genuine, &keys, &dir).enroll("alice", "pw123").await);
    let node = assert_ok!(enrollment_for(&impostor, &keys, &dir).enroll("alice", "pw123").await);

    assert!(node.trust_pool.contains(&genuine.material.root_der()));
    assert!(!node.trust_pool.contains(&impostor.material.root_der()));
    assert_eq!(impostor.calls_to("ReadCACertificate").await, 0);
    // the impostor's certificate does not chain to the pinned root
    assert_err!(node.trust_pool.verify(node.identity.certificate()));
}

// ============================================================================
// Identity attempts
// ============================================================================

#[tokio::test]
async fn test_two_attempts_use_distinct_keys() {
    let keys = RecordingKeyGenerator::default();
    let ca = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();
    let mut enrollment = enrollment_for(&ca, &keys, &dir);

    let first = assert_ok!(enrollment.enroll_identity("alice", "pw123").await);
    let second = assert_ok!(enrollment.enroll_identity("alice", "pw123").await);

    assert_ne!(
        first.key_pair().public_key_der(),
        second.key_pair().public_key_der()
    );
    assert_ne!(first.certificate(), second.certificate());
    assert!(first.certificate_matches_key().unwrap());
    assert!(second.certificate_matches_key().unwrap());
    assert_eq!(keys.log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_wrong_password_is_rejection_and_not_enrolled() {
    let keys = RecordingKeyGenerator::default();
    let ca = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();
    let mut enrollment = enrollment_for(&ca, &keys, &dir);

    let err = assert_err!(enrollment.enroll("alice", "wrong").await);

    assert!(err.is_remote_rejection());
    assert!(matches!(err, EnrollError::Rejected { code: 401, .. }));
    assert_eq!(
        enrollment.identity_phase(),
        IdentityPhase::Failed(ErrorKind::RemoteRejection)
    );
    assert!(!enrollment.is_enrolled());
}

#[tokio::test]
async fn test_unknown_identity_is_rejection() {
    let keys = RecordingKeyGenerator::default();
    let ca = TestCa::start("alice", "pw123", keys.log.clone()).await;
    let dir = TempDir::new().unwrap();
    let mut enrollment = enrollment_for(&ca, &keys, &dir);

    let err = assert_err!(enrollment.enroll_identity("bob", "pw123").await);
    assert_eq!(err.kind(), ErrorKind::RemoteRejection);
}

// ============================================================================
// Unreachable CA
// ============================================================================

#[tokio::test]
async fn test_unreachable_ca_fails_both_flows() {
    let keys = RecordingKeyGenerator::default();
    let dir = TempDir::new().unwrap();

    // Bind then drop a listener so the port is closed.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = CaClient::new(&format!("http://{addr}")).unwrap();
    let store = TrustStore::new(dir.path().join("ca-chain.pem"));
    let mut enrollment = Enrollment::with_key_generator(Arc::new(client), keys, store);

    let err = assert_err!(enrollment.enroll("alice", "pw123").await);

    assert!(err.is_retryable());
    assert!(matches!(enrollment.identity_phase(), IdentityPhase::Failed(_)));
    assert!(matches!(enrollment.trust_phase(), TrustPhase::Failed(_)));
    assert!(!enrollment.trust_store().exists().await);
}
