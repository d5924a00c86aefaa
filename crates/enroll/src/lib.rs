//! Node enrollment against a ledger network's enrollment CA.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use enroll::{Enrollment, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> enroll::Result<()> {
//!     let config = NodeConfig::load("node.toml".as_ref())?;
//!     let mut enrollment = Enrollment::new(config.ca_client()?, config.trust_store());
//!
//!     // Pins the CA chain on first use, reloads it on every later run
//!     let node = enrollment.enroll("alice", "pw123").await?;
//!
//!     node.trust_pool.verify(node.identity.certificate())?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

// Re-export core types
pub use enroll_core::*;

// Re-export client
pub use enroll_client::{CaClient, CaClientBuilder, CallOptions, CertificateAuthority};

// Re-export node-side enrollment
pub use enroll_node::{
    config::{CallConfig, NodeConfig},
    keys::{KeyGenerator, NodeKeyPair, SystemKeyGenerator},
    orchestrator::{EnrolledNode, Enrollment, IdentityPhase, IssuedIdentity, TrustPhase},
    signer,
    trust::{TrustPool, TrustStore, TrustedCertificate},
};

// Re-export runtime for convenience
pub use tokio;
