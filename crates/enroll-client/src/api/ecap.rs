//! ECAP endpoints: the enrollment CA's public service.

use crate::CaClient;
use enroll_core::{Cert, CreateCertificateResponse, Empty, EnrollmentRequest, ReadCertificateRequest, Result};

/// ECAP API endpoints
pub struct EcapApi<'a> {
    client: &'a CaClient,
}

impl<'a> EcapApi<'a> {
    pub(crate) const fn new(client: &'a CaClient) -> Self {
        Self { client }
    }

    /// `CreateCertificate`: exchange a signed request for an enrollment certificate
    pub async fn create_certificate(
        &self,
        request: &EnrollmentRequest,
    ) -> Result<CreateCertificateResponse> {
        self.client.call("CreateCertificate", request).await
    }

    /// `ReadCACertificate`: the CA's own certificate, unauthenticated
    pub async fn read_ca_certificate(&self) -> Result<Cert> {
        self.client.call("ReadCACertificate", &Empty::default()).await
    }

    /// `ReadCertificate`: a certificate previously issued to an identity
    pub async fn read_certificate(&self, request: &ReadCertificateRequest) -> Result<Cert> {
        self.client.call("ReadCertificate", request).await
    }
}
