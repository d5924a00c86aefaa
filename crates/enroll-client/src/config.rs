//! Per-call options for talking to the CA.

use std::time::Duration;

/// Default overall deadline for one RPC
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for establishing the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options applied to every call made by a [`crate::CaClient`]
///
/// Timeouts are supplied by the caller; the client never picks a retry
/// policy on its own.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Overall deadline for a request/response round-trip
    pub timeout: Duration,

    /// Deadline for the TCP/TLS connect phase
    pub connect_timeout: Duration,

    /// User-Agent header sent with each call
    pub user_agent: String,

    /// Extra PEM root certificate for the transport, used when the CA
    /// endpoint is served over TLS with a private certificate
    pub transport_root_pem: Option<Vec<u8>>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("enroll-rs/{}", env!("CARGO_PKG_VERSION")),
            transport_root_pem: None,
        }
    }
}

impl CallOptions {
    /// Create options with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Trust an extra PEM root certificate for the transport
    #[must_use]
    pub fn transport_root_pem(mut self, pem: Vec<u8>) -> Self {
        self.transport_root_pem = Some(pem);
        self
    }
}
