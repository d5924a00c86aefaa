//! Enrollment sequencing.
//!
//! Two independent flows make a node enrolled:
//!
//! ```text
//! identity: Idle -> KeysGenerated -> RequestBuilt -> Submitted -> CertificateReceived
//! trust:    Idle -> RootFetched -> RootPersisted -> TrustPoolLoaded
//! ```
//!
//! Once a chain is pinned, [`Enrollment::enroll`] goes straight from `Idle` to
//! `TrustPoolLoaded` by reading it back from disk.
//!
//! Either flow lands in `Failed` on the first error and stays there until the
//! caller starts it again. Nothing here retries.

use enroll_client::{CertificateAuthority, ROOT_IDENTITY_HINT};
use enroll_core::{EnrollError, ErrorKind, Result, SecretBytes};
use std::fmt;
use tracing::{debug, error, info, warn};
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::hash::sha256_hex;
use crate::keys::{KeyGenerator, NodeKeyPair, SystemKeyGenerator};
use crate::signer;
use crate::trust::{split_chain, TrustPool, TrustStore};

/// Progress of the identity flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPhase {
    /// Nothing attempted yet
    Idle,
    /// A fresh key pair exists for this attempt
    KeysGenerated,
    /// The request is built and signed
    RequestBuilt,
    /// The request is on its way to the CA
    Submitted,
    /// The CA issued a certificate
    CertificateReceived,
    /// The attempt failed
    Failed(ErrorKind),
}

/// Progress of the trust flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPhase {
    /// Nothing attempted yet
    Idle,
    /// The CA chain was fetched
    RootFetched,
    /// The CA chain is on disk
    RootPersisted,
    /// The trust pool was rebuilt from disk
    TrustPoolLoaded,
    /// The attempt failed
    Failed(ErrorKind),
}

impl IdentityPhase {
    /// Returns true in the terminal success state
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::CertificateReceived)
    }

    /// The state after this one on the success path; terminal states stay put
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::KeysGenerated,
            Self::KeysGenerated => Self::RequestBuilt,
            Self::RequestBuilt => Self::Submitted,
            Self::Submitted | Self::CertificateReceived => Self::CertificateReceived,
            Self::Failed(kind) => Self::Failed(kind),
        }
    }
}

impl TrustPhase {
    /// Returns true in the terminal success state
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::TrustPoolLoaded)
    }

    /// The state after this one on the success path; terminal states stay put
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::RootFetched,
            Self::RootFetched => Self::RootPersisted,
            Self::RootPersisted | Self::TrustPoolLoaded => Self::TrustPoolLoaded,
            Self::Failed(kind) => Self::Failed(kind),
        }
    }
}

fn advance_identity(phase: &mut IdentityPhase) {
    let from = *phase;
    *phase = from.next();
    debug!(from = ?from, to = ?*phase, "identity phase");
}

fn advance_trust(phase: &mut TrustPhase) {
    let from = *phase;
    *phase = from.next();
    debug!(from = ?from, to = ?*phase, "trust phase");
}

/// The identity a node obtained from the CA
pub struct IssuedIdentity {
    key_pair: NodeKeyPair,
    certificate: Vec<u8>,
    key_material: Option<SecretBytes>,
}

impl IssuedIdentity {
    /// Key pair generated for the successful attempt
    #[must_use]
    pub const fn key_pair(&self) -> &NodeKeyPair {
        &self.key_pair
    }

    /// Issued enrollment certificate, DER
    #[must_use]
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Key material the CA generated for us, if any
    #[must_use]
    pub const fn key_material(&self) -> Option<&SecretBytes> {
        self.key_material.as_ref()
    }

    /// SHA-256 fingerprint of the certificate (hex)
    #[must_use]
    pub fn certificate_fingerprint(&self) -> String {
        sha256_hex(&self.certificate)
    }

    /// Returns true if the certificate embeds this attempt's public key
    pub fn certificate_matches_key(&self) -> Result<bool> {
        let (_, cert) = x509_parser::parse_x509_certificate(&self.certificate)
            .map_err(|e| EnrollError::parse("enrollment certificate", e))?;
        let (_, ours) = SubjectPublicKeyInfo::from_der(self.key_pair.public_key_der())
            .map_err(|e| EnrollError::parse("node public key", e))?;

        Ok(cert.public_key().algorithm.algorithm == ours.algorithm.algorithm
            && cert.public_key().subject_public_key.data == ours.subject_public_key.data)
    }

    /// Split into key pair, certificate and CA-generated key material
    #[must_use]
    pub fn into_parts(self) -> (NodeKeyPair, Vec<u8>, Option<SecretBytes>) {
        (self.key_pair, self.certificate, self.key_material)
    }
}

impl fmt::Debug for IssuedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedIdentity")
            .field("key_pair", &self.key_pair)
            .field("certificate", &self.certificate_fingerprint())
            .field("key_material", &self.key_material)
            .finish()
    }
}

/// A node that holds both an identity and a trust anchor
#[derive(Debug)]
pub struct EnrolledNode {
    /// Identity issued by the CA
    pub identity: IssuedIdentity,
    /// Trust pool rebuilt from the pinned CA chain
    pub trust_pool: TrustPool,
}

/// Drives identity enrollment and trust bootstrap against one CA
pub struct Enrollment<C, G = SystemKeyGenerator> {
    ca: C,
    keys: G,
    store: TrustStore,
    identity: IdentityPhase,
    trust: TrustPhase,
}

impl<C: CertificateAuthority> Enrollment<C> {
    /// Enrollment against `ca`, pinning the CA chain in `store`
    pub fn new(ca: C, store: TrustStore) -> Self {
        Self::with_key_generator(ca, SystemKeyGenerator::new(), store)
    }
}

impl<C: CertificateAuthority, G: KeyGenerator> Enrollment<C, G> {
    /// Enrollment with a custom key source
    pub const fn with_key_generator(ca: C, keys: G, store: TrustStore) -> Self {
        Self {
            ca,
            keys,
            store,
            identity: IdentityPhase::Idle,
            trust: TrustPhase::Idle,
        }
    }

    /// Where the identity flow stands
    pub const fn identity_phase(&self) -> IdentityPhase {
        self.identity
    }

    /// Where the trust flow stands
    pub const fn trust_phase(&self) -> TrustPhase {
        self.trust
    }

    /// Both flows reached their terminal success state
    pub const fn is_enrolled(&self) -> bool {
        self.identity.is_complete() && self.trust.is_complete()
    }

    /// The trust store this enrollment pins into
    pub const fn trust_store(&self) -> &TrustStore {
        &self.store
    }

    /// Obtain an enrollment certificate for `identity`.
    ///
    /// Every call generates a new key pair; a failed attempt's key is dropped.
    pub async fn enroll_identity(&mut self, identity: &str, credential: &str) -> Result<IssuedIdentity> {
        run_identity(&self.ca, &self.keys, &mut self.identity, identity, credential).await
    }

    /// Fetch the CA chain, pin it to disk and load the trust pool.
    ///
    /// Trust on first use: the chain comes from an unauthenticated call and is
    /// pinned after a structural parse only. It is not checked against any
    /// higher authority.
    pub async fn bootstrap_trust_on_first_use(&mut self) -> Result<TrustPool> {
        run_trust(&self.ca, &self.store, &mut self.trust).await
    }

    /// Rebuild the trust pool from the pinned chain without contacting the CA.
    ///
    /// This is the path for every start after the first.
    pub async fn load_trust(&mut self) -> Result<TrustPool> {
        run_load(&self.store, &mut self.trust).await
    }

    /// Run both flows concurrently; succeed only if both do.
    ///
    /// A chain that is already pinned is reloaded from disk and never
    /// replaced; only [`Self::bootstrap_trust_on_first_use`] re-pins.
    pub async fn enroll(&mut self, identity: &str, credential: &str) -> Result<EnrolledNode> {
        let pinned = self.store.exists().await;
        let (ca, store, trust) = (&self.ca, &self.store, &mut self.trust);
        let (identity_result, trust_result) = tokio::join!(
            run_identity(ca, &self.keys, &mut self.identity, identity, credential),
            async move {
                if pinned {
                    run_load(store, trust).await
                } else {
                    run_trust(ca, store, trust).await
                }
            },
        );

        match (identity_result, trust_result) {
            (Ok(identity), Ok(trust_pool)) => {
                info!(
                    certificate = %identity.certificate_fingerprint(),
                    trusted = trust_pool.len(),
                    "node enrolled"
                );
                Ok(EnrolledNode {
                    identity,
                    trust_pool,
                })
            }
            (Ok(_), Err(e)) => {
                warn!(error = %e, "enrollment certificate obtained but CA chain not pinned");
                Err(e)
            }
            (Err(e), _) => Err(e),
        }
    }
}

async fn run_identity<C: CertificateAuthority, G: KeyGenerator>(
    ca: &C,
    keys: &G,
    phase: &mut IdentityPhase,
    identity: &str,
    credential: &str,
) -> Result<IssuedIdentity> {
    *phase = IdentityPhase::Idle;
    let result = identity_steps(ca, keys, phase, identity, credential).await;
    if let Err(e) = &result {
        error!(identity, error = %e, "failed obtaining enrollment certificate");
        *phase = IdentityPhase::Failed(e.kind());
    }
    result
}

async fn identity_steps<C: CertificateAuthority, G: KeyGenerator>(
    ca: &C,
    keys: &G,
    phase: &mut IdentityPhase,
    identity: &str,
    credential: &str,
) -> Result<IssuedIdentity> {
    let key_pair = keys.generate()?;
    advance_identity(phase);
    debug!(identity, key = %key_pair.fingerprint(), "generated enrollment key pair");

    let request = signer::build_and_sign(identity, credential, &key_pair)?;
    advance_identity(phase);

    let call = ca.request_certificate(&request);
    advance_identity(phase);
    let result = call.await?;

    let issued = IssuedIdentity {
        key_pair,
        certificate: result.certificate,
        key_material: result.key_material,
    };
    advance_identity(phase);
    debug!(
        identity,
        certificate = %issued.certificate_fingerprint(),
        ca_generated_key = issued.key_material.is_some(),
        "enrollment certificate received"
    );

    Ok(issued)
}

async fn run_load(store: &TrustStore, phase: &mut TrustPhase) -> Result<TrustPool> {
    match store.load().await {
        Ok(pool) => {
            *phase = TrustPhase::TrustPoolLoaded;
            Ok(pool)
        }
        Err(e) => {
            error!(error = %e, "failed loading pinned CA certificate chain");
            *phase = TrustPhase::Failed(e.kind());
            Err(e)
        }
    }
}

async fn run_trust<C: CertificateAuthority>(
    ca: &C,
    store: &TrustStore,
    phase: &mut TrustPhase,
) -> Result<TrustPool> {
    *phase = TrustPhase::Idle;
    let result = trust_steps(ca, store, phase).await;
    if let Err(e) = &result {
        error!(error = %e, "failed bootstrapping CA trust");
        *phase = TrustPhase::Failed(e.kind());
    }
    result
}

async fn trust_steps<C: CertificateAuthority>(
    ca: &C,
    store: &TrustStore,
    phase: &mut TrustPhase,
) -> Result<TrustPool> {
    let chain = ca.fetch_root_certificate(ROOT_IDENTITY_HINT).await?;
    advance_trust(phase);

    // Unparseable material must never reach the trust file.
    let certs = split_chain(&chain)?;
    for der in &certs {
        warn!(
            fingerprint = %sha256_hex(der),
            "trusting CA certificate on first use"
        );
    }

    store.persist(&chain).await?;
    advance_trust(phase);

    let pool = store.load().await?;
    advance_trust(phase);
    Ok(pool)
}
