//! # enroll-node
//!
//! Everything a node does to join the network: obtain an enrollment
//! certificate for its identity and pin the CA's certificate chain as its
//! trust anchor.
//!
//! ## Flow
//!
//! ```text
//! Identity (per attempt, fresh key every time)
//!   KeyGenerator::generate() -> signer::build_and_sign()
//!   -> CertificateAuthority::request_certificate()
//!   -> IssuedIdentity
//!
//! Trust (first start, trust on first use)
//!   CertificateAuthority::fetch_root_certificate("ca-root")
//!   -> split_chain() -> TrustStore::persist() -> TrustStore::load()
//!   -> TrustPool
//!
//! Trust (every later start, no network)
//!   TrustStore::load() -> TrustPool
//! ```
//!
//! The node counts as enrolled only when both flows succeeded.

pub mod config;
pub mod hash;
pub mod keys;
pub mod orchestrator;
pub mod signer;
pub mod trust;

pub use config::{CallConfig, NodeConfig};
pub use enroll_core::{EnrollError, ErrorKind, Result};
pub use keys::{KeyGenerator, NodeKeyPair, SystemKeyGenerator};
pub use orchestrator::{EnrolledNode, Enrollment, IdentityPhase, IssuedIdentity, TrustPhase};
pub use trust::{split_chain, TrustPool, TrustStore, TrustedCertificate};
