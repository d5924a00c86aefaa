//! The seam between enrollment logic and the remote CA.

use async_trait::async_trait;
use enroll_core::{CaCertificateChain, EnrollmentRequest, EnrollmentResult, Result};
use std::sync::Arc;

use crate::CaClient;

/// The two remote operations enrollment needs from a CA
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Submit a signed request, receive the issued certificate
    async fn request_certificate(&self, request: &EnrollmentRequest) -> Result<EnrollmentResult>;

    /// Fetch the CA's own certificate chain, trusted on first use
    async fn fetch_root_certificate(&self, hint: &str) -> Result<CaCertificateChain>;
}

#[async_trait]
impl CertificateAuthority for CaClient {
    async fn request_certificate(&self, request: &EnrollmentRequest) -> Result<EnrollmentResult> {
        Self::request_certificate(self, request).await
    }

    async fn fetch_root_certificate(&self, hint: &str) -> Result<CaCertificateChain> {
        Self::fetch_root_certificate(self, hint).await
    }
}

#[async_trait]
impl<T: CertificateAuthority + ?Sized> CertificateAuthority for Arc<T> {
    async fn request_certificate(&self, request: &EnrollmentRequest) -> Result<EnrollmentResult> {
        (**self).request_certificate(request).await
    }

    async fn fetch_root_certificate(&self, hint: &str) -> Result<CaCertificateChain> {
        (**self).fetch_root_certificate(hint).await
    }
}
