//! Durable CA trust anchor and the in-memory trust pool built from it.
//!
//! The trust-chain file is the only durable trust anchor a node has. It is
//! written once during trust bootstrap and read back on every start.

use chrono::{DateTime, TimeZone, Utc};
use enroll_core::{CaCertificateChain, EnrollError, Result};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use x509_parser::certificate::X509Certificate;

use crate::hash::sha256_hex;

/// PEM tag of certificate blocks
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Owner read/write/execute only
#[cfg(unix)]
const TRUST_FILE_MODE: u32 = 0o700;

/// Split a DER chain into its certificates, rejecting anything unparseable.
///
/// The chain may hold one certificate or several concatenated ones.
pub fn split_chain(chain: &CaCertificateChain) -> Result<Vec<&[u8]>> {
    let mut remaining = chain.as_der();
    let mut certs = Vec::new();

    while !remaining.is_empty() {
        let (rest, _) = x509_parser::parse_x509_certificate(remaining)
            .map_err(|e| EnrollError::parse("CA certificate chain", e))?;
        let consumed = remaining.len() - rest.len();
        certs.push(&remaining[..consumed]);
        remaining = rest;
    }

    if certs.is_empty() {
        return Err(EnrollError::TrustBootstrap(
            "CA certificate chain is empty".into(),
        ));
    }

    Ok(certs)
}

/// A certificate admitted to the trust pool
#[derive(Debug, Clone)]
pub struct TrustedCertificate {
    der: Vec<u8>,
    /// SHA-256 fingerprint of the DER encoding (hex)
    pub fingerprint: String,
    /// Subject distinguished name (human-readable)
    pub subject: String,
    /// Not valid after
    pub not_after: DateTime<Utc>,
}

impl TrustedCertificate {
    /// Parse a single DER certificate
    pub fn from_der(der: &[u8], source_name: &str) -> Result<Self> {
        let (rest, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| EnrollError::parse(source_name, e))?;
        if !rest.is_empty() {
            return Err(EnrollError::parse(
                source_name,
                format!("{} trailing bytes after certificate", rest.len()),
            ));
        }

        let not_after = not_after_utc(cert.validity().not_after.timestamp()).ok_or_else(|| {
            EnrollError::parse(source_name, "notAfter outside the representable date range")
        })?;

        Ok(Self {
            der: der.to_vec(),
            fingerprint: sha256_hex(der),
            subject: cert.subject().to_string(),
            not_after,
        })
    }

    /// DER encoding
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        x509_parser::parse_x509_certificate(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| EnrollError::parse("trust pool", e))
    }
}

fn not_after_utc(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}

/// In-memory set of trusted CA certificates.
///
/// Built once at startup from the trust-chain file and handed by reference to
/// whatever verifies certificates later. There is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct TrustPool {
    certs: Vec<TrustedCertificate>,
    fingerprints: HashSet<String>,
}

impl TrustPool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from PEM text holding one or more certificate blocks.
    ///
    /// Fails with [`EnrollError::TrustBootstrap`] if no certificate can be
    /// found at all, and with [`EnrollError::Parse`] if a certificate block
    /// holds something that is not a certificate.
    pub fn from_pem(content: &[u8], source_name: &str) -> Result<Self> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(EnrollError::TrustBootstrap(format!(
                "trust chain {source_name} is empty"
            )));
        }

        let blocks = pem::parse_many(content).map_err(|e| {
            EnrollError::TrustBootstrap(format!("trust chain {source_name} is corrupt: {e}"))
        })?;

        let mut pool = Self::new();
        for block in blocks.iter().filter(|b| b.tag() == CERTIFICATE_TAG) {
            pool.add(TrustedCertificate::from_der(block.contents(), source_name)?);
        }

        if pool.is_empty() {
            return Err(EnrollError::TrustBootstrap(format!(
                "trust chain {source_name} holds no certificates"
            )));
        }

        Ok(pool)
    }

    /// Add a certificate, returning false if it was already present
    pub fn add(&mut self, cert: TrustedCertificate) -> bool {
        if !self.fingerprints.insert(cert.fingerprint.clone()) {
            return false;
        }
        self.certs.push(cert);
        true
    }

    /// Number of trusted certificates
    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns true if nothing is trusted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Iterate over trusted certificates
    pub fn iter(&self) -> impl Iterator<Item = &TrustedCertificate> {
        self.certs.iter()
    }

    /// Returns true if this exact DER certificate is trusted
    #[must_use]
    pub fn contains(&self, der: &[u8]) -> bool {
        self.fingerprints.contains(&sha256_hex(der))
    }

    /// Fingerprints of all trusted certificates
    #[must_use]
    pub fn fingerprints(&self) -> &HashSet<String> {
        &self.fingerprints
    }

    /// Check that `cert_der` was issued by a certificate in this pool.
    ///
    /// Returns the issuing pool entry. Validity periods are checked for the
    /// leaf only.
    pub fn verify(&self, cert_der: &[u8]) -> Result<&TrustedCertificate> {
        let (_, leaf) = x509_parser::parse_x509_certificate(cert_der)
            .map_err(|e| EnrollError::parse("certificate under verification", e))?;

        if !leaf.validity().is_valid() {
            return Err(EnrollError::Untrusted(format!(
                "certificate for {} is outside its validity period",
                leaf.subject()
            )));
        }

        for trusted in &self.certs {
            let issuer = trusted.parsed()?;
            if issuer.subject().as_raw() != leaf.issuer().as_raw() {
                continue;
            }
            if leaf.verify_signature(Some(issuer.public_key())).is_ok() {
                return Ok(trusted);
            }
        }

        Err(EnrollError::Untrusted(format!(
            "no trusted issuer for {}",
            leaf.subject()
        )))
    }
}

/// Persists the CA chain at a fixed path and loads it back as a [`TrustPool`]
#[derive(Debug, Clone)]
pub struct TrustStore {
    path: PathBuf,
}

impl TrustStore {
    /// Trust store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the trust-chain file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a trust chain has been pinned
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Write `chain` to the trust-chain file as PEM certificate blocks.
    ///
    /// The file is written under a temporary name in the same directory and
    /// renamed into place, so readers see either the old content or the
    /// complete new content. Any prior content is replaced.
    pub async fn persist(&self, chain: &CaCertificateChain) -> Result<()> {
        let blocks: Vec<pem::Pem> = split_chain(chain)?
            .into_iter()
            .map(|der| pem::Pem::new(CERTIFICATE_TAG, der.to_vec()))
            .collect();
        let encoded = pem::encode_many(&blocks);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EnrollError::io(&dir, e))?;

        let tmp = self.temp_path(&dir)?;
        if let Err(e) = write_private(&tmp, encoded.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            error!(path = %self.path.display(), error = %e, "failed storing CA certificate chain");
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            error!(path = %self.path.display(), error = %e, "failed storing CA certificate chain");
            return Err(EnrollError::io(&self.path, e));
        }

        info!(
            path = %self.path.display(),
            certificates = blocks.len(),
            "stored CA certificate chain"
        );
        Ok(())
    }

    /// Read the trust-chain file and build a fresh pool from it
    pub async fn load(&self) -> Result<TrustPool> {
        debug!(path = %self.path.display(), "loading CA certificate chain");

        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "failed loading CA certificate chain");
            EnrollError::io(&self.path, e)
        })?;

        let pool = TrustPool::from_pem(&content, &self.path.display().to_string())?;
        debug!(certificates = pool.len(), "CA certificate chain loaded");
        Ok(pool)
    }

    /// Unique sibling name for the in-progress write
    fn temp_path(&self, dir: &Path) -> Result<PathBuf> {
        let mut nonce = [0u8; 8];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| EnrollError::io(dir, std::io::Error::other("no randomness for temp name")))?;

        let name = self
            .path
            .file_name()
            .map_or_else(|| "trust-chain".into(), |n| n.to_string_lossy().into_owned());
        Ok(dir.join(format!(".{name}.{}.tmp", hex::encode(nonce))))
    }
}

/// Create `path` with owner-only permissions, write `data` and sync it
async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(TRUST_FILE_MODE);

    let mut file = options
        .open(path)
        .await
        .map_err(|e| EnrollError::io(path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| EnrollError::io(path, e))?;
    file.sync_all().await.map_err(|e| EnrollError::io(path, e))?;

    // The process umask may have narrowed the create mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(TRUST_FILE_MODE))
            .await
            .map_err(|e| EnrollError::io(path, e))?;
    }

    Ok(())
}
