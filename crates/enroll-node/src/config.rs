//! Node configuration for enrollment.

use enroll_client::{CaClient, CallOptions};
use enroll_core::{EnrollError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::trust::TrustStore;

/// What a node needs to know to enroll: where the CA is and where its trust
/// anchor lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// CA endpoint address (default: <http://localhost:7054>).
    #[serde(default = "default_ca_address")]
    pub ca_address: String,

    /// Path of the pinned CA certificate chain (default: certs/ca-chain.pem).
    #[serde(default = "default_trust_chain_path")]
    pub trust_chain_path: PathBuf,

    /// Options for each CA call.
    #[serde(default)]
    pub call: CallConfig,
}

/// Serializable form of [`CallOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Overall deadline of one call (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect deadline (seconds).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// PEM root for a TLS-served CA endpoint. Transport only; unrelated to
    /// the pinned enrollment trust chain.
    #[serde(default)]
    pub transport_root_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ca_address: default_ca_address(),
            trust_chain_path: default_trust_chain_path(),
            call: CallConfig::default(),
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
            transport_root_path: None,
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| EnrollError::io(path, e))?;
            toml::from_str(&content).map_err(|e| EnrollError::Config(e.to_string()))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can actually be used.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.ca_address)
            .map_err(|e| EnrollError::Config(format!("ca_address {}: {e}", self.ca_address)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EnrollError::Config(format!(
                "ca_address must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.trust_chain_path.as_os_str().is_empty() {
            return Err(EnrollError::Config("trust_chain_path is empty".into()));
        }
        if self.call.timeout_secs == 0 {
            return Err(EnrollError::Config("call.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Call options for the CA client.
    pub fn call_options(&self) -> Result<CallOptions> {
        let mut options = CallOptions::new()
            .timeout(Duration::from_secs(self.call.timeout_secs))
            .connect_timeout(Duration::from_secs(self.call.connect_timeout_secs));

        if let Some(agent) = &self.call.user_agent {
            options = options.user_agent(agent.clone());
        }
        if let Some(path) = &self.call.transport_root_path {
            let pem = std::fs::read(path).map_err(|e| EnrollError::io(path, e))?;
            options = options.transport_root_pem(pem);
        }
        Ok(options)
    }

    /// Client for the configured CA.
    pub fn ca_client(&self) -> Result<CaClient> {
        CaClient::builder(self.ca_address.clone())
            .options(self.call_options()?)
            .build()
    }

    /// Trust store at the configured path.
    #[must_use]
    pub fn trust_store(&self) -> TrustStore {
        TrustStore::new(self.trust_chain_path.clone())
    }
}

// Default value functions for serde.
fn default_ca_address() -> String {
    String::from("http://localhost:7054")
}

fn default_trust_chain_path() -> PathBuf {
    PathBuf::from("certs/ca-chain.pem")
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}
