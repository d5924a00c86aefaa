//! HTTP transport for the ECAP service.

use crate::api::EcapApi;
use crate::config::CallOptions;
use enroll_core::{
    CaCertificateChain, EnrollError, EnrollmentRequest, EnrollmentResult, Identity,
    ReadCertificateRequest, RemoteError, Result, SecretBytes,
};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

/// Path prefix of the ECAP service
const SERVICE_PREFIX: &str = "ecap";

/// Identity hint used when asking for the CA's own certificate
pub const ROOT_IDENTITY_HINT: &str = "ca-root";

/// Client for the enrollment CA
///
/// Every call is one request/response round-trip on its own connection.
/// Idle connections are never kept, so dropping an in-flight call closes its
/// socket. The client does not retry; callers branch on
/// [`EnrollError::is_retryable`].
#[derive(Clone)]
pub struct CaClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: Url,
    options: CallOptions,
}

impl CaClient {
    /// Create a client for the CA at `address` using default call options
    pub fn new(address: &str) -> Result<Self> {
        CaClientBuilder::new(address).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(address: impl Into<String>) -> CaClientBuilder {
        CaClientBuilder::new(address)
    }

    /// Raw ECAP endpoints
    #[must_use]
    pub fn ecap(&self) -> EcapApi<'_> {
        EcapApi::new(self)
    }

    /// Base URL of the CA endpoint
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Options applied to each call
    #[must_use]
    pub fn options(&self) -> &CallOptions {
        &self.inner.options
    }

    /// Submit a signed enrollment request and receive the issued certificate.
    ///
    /// A CA refusal (bad credential, bad signature, policy) comes back as
    /// [`EnrollError::Rejected`] and is distinct from transport failures.
    pub async fn request_certificate(&self, request: &EnrollmentRequest) -> Result<EnrollmentResult> {
        if !request.is_signed() {
            return Err(EnrollError::Signing(
                "refusing to submit an unsigned enrollment request".into(),
            ));
        }

        let response = self.ecap().create_certificate(request).await.map_err(|e| {
            error!(identity = %request.id.id, error = %e, "failed requesting enrollment certificate");
            e
        })?;

        if response.cert.cert.is_empty() {
            return Err(EnrollError::InvalidResponse(
                "CreateCertificate returned an empty certificate".into(),
            ));
        }

        Ok(EnrollmentResult {
            certificate: response.cert.cert,
            key_material: response.key.map(SecretBytes::new),
        })
    }

    /// Fetch the CA's own certificate chain.
    ///
    /// This call is unauthenticated: nothing is trusted yet, so whatever the
    /// endpoint returns is accepted as the trust anchor on first use. It is
    /// the weakest link of the whole enrollment flow and the returned chain is
    /// not checked against any higher authority.
    pub async fn fetch_root_certificate(&self, hint: &str) -> Result<CaCertificateChain> {
        let cert = self.ecap().read_ca_certificate().await.map_err(|e| {
            error!(hint, error = %e, "failed requesting CA certificate");
            match e {
                EnrollError::NotFound { .. } => EnrollError::NotFound {
                    resource: hint.to_string(),
                },
                other => other,
            }
        })?;

        if cert.cert.is_empty() {
            return Err(EnrollError::NotFound {
                resource: hint.to_string(),
            });
        }

        Ok(CaCertificateChain::from_der(cert.cert))
    }

    /// Read a previously issued certificate for `identity`
    pub async fn read_certificate(&self, identity: &str, hash: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let request = ReadCertificateRequest {
            id: Identity::new(identity),
            hash,
        };
        let cert = self.ecap().read_certificate(&request).await?;
        Ok(cert.cert)
    }

    /// Perform one RPC: POST a JSON body, decode a JSON reply
    pub(crate) async fn call<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        rpc: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(rpc)?;
        debug!(url = %url, rpc, "ECAP request");

        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        self.handle_response(rpc, response).await
    }

    /// Build the URL of one RPC
    fn build_url(&self, rpc: &str) -> Result<Url> {
        self.inner
            .base_url
            .join(&format!("{SERVICE_PREFIX}/{rpc}"))
            .map_err(|e| EnrollError::Config(format!("invalid CA address: {e}")))
    }

    /// Classify a reqwest failure
    fn transport_error(&self, err: &reqwest::Error) -> EnrollError {
        if err.is_timeout() {
            EnrollError::Timeout(
                u64::try_from(self.inner.options.timeout.as_millis()).unwrap_or(u64::MAX),
            )
        } else {
            EnrollError::Connection(err.to_string())
        }
    }

    /// Decode a reply, mapping non-success statuses onto the error taxonomy
    async fn handle_response<T: DeserializeOwned>(
        &self,
        rpc: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| self.transport_error(&e))?;
            serde_json::from_slice(&body)
                .map_err(|e| EnrollError::InvalidResponse(format!("{rpc}: {e}")))
        } else {
            Err(Self::handle_error(rpc, status.as_u16(), response).await)
        }
    }

    /// Convert an error reply to an [`EnrollError`]
    async fn handle_error(rpc: &str, status: u16, response: reqwest::Response) -> EnrollError {
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<RemoteError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        match status {
            404 => EnrollError::NotFound {
                resource: if message.is_empty() {
                    rpc.to_string()
                } else {
                    message
                },
            },
            408 | 429 | 502 | 503 | 504 => {
                warn!(status, rpc, "CA temporarily unavailable");
                EnrollError::Connection(format!("CA unavailable ({status}): {message}"))
            }
            _ => EnrollError::Rejected {
                code: status,
                reason: message,
            },
        }
    }
}

/// Builder for configuring a [`CaClient`]
pub struct CaClientBuilder {
    address: String,
    options: CallOptions,
}

impl CaClientBuilder {
    /// Create a new builder for the CA at `address`
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            options: CallOptions::default(),
        }
    }

    /// Replace all call options
    #[must_use]
    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CaClient> {
        let mut base_url = Url::parse(&self.address)
            .map_err(|e| EnrollError::Config(format!("invalid CA address {}: {e}", self.address)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let builder = HttpClient::builder()
            .timeout(self.options.timeout)
            .connect_timeout(self.options.connect_timeout)
            .user_agent(&self.options.user_agent)
            .pool_max_idle_per_host(0);

        let builder = Self::with_transport_root(builder, self.options.transport_root_pem.as_deref())?;

        let http = builder
            .build()
            .map_err(|e| EnrollError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(CaClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                options: self.options,
            }),
        })
    }

    #[cfg(any(feature = "rustls", feature = "native-tls"))]
    fn with_transport_root(
        builder: reqwest::ClientBuilder,
        pem: Option<&[u8]>,
    ) -> Result<reqwest::ClientBuilder> {
        let Some(pem) = pem else {
            return Ok(builder);
        };
        let cert = reqwest::Certificate::from_pem(pem)
            .map_err(|e| EnrollError::Config(format!("invalid transport root certificate: {e}")))?;
        Ok(builder.add_root_certificate(cert))
    }

    #[cfg(not(any(feature = "rustls", feature = "native-tls")))]
    fn with_transport_root(
        builder: reqwest::ClientBuilder,
        pem: Option<&[u8]>,
    ) -> Result<reqwest::ClientBuilder> {
        if pem.is_some() {
            return Err(EnrollError::Config(
                "transport root certificate requires a TLS feature".into(),
            ));
        }
        Ok(builder)
    }
}
