//! TLS configuration and certificate loading.

use std::fs;
use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid certificate material: {0}")]
    Material(#[from] std::io::Error),
}

/// Server certificate chain and private key, both PEM encoded.
#[derive(Clone)]
pub struct CertificateMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl CertificateMaterial {
    /// Accept PEM bytes if they hold at least one certificate and a private key.
    pub fn from_pem(cert_pem: Vec<u8>, key_pem: Vec<u8>) -> Option<Self> {
        if !has_certificate(&cert_pem) || !has_private_key(&key_pem) {
            return None;
        }
        Some(Self { cert_pem, key_pem })
    }

    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }

    /// Build the server-side rustls config.
    ///
    /// `RustlsConfig::from_pem` configures `with_no_client_auth`; callers
    /// authenticate with the shared secret, not with client certificates.
    pub async fn rustls_config(&self) -> Result<RustlsConfig, TlsError> {
        Ok(RustlsConfig::from_pem(self.cert_pem.clone(), self.key_pem.clone()).await?)
    }
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("cert_bytes", &self.cert_pem.len())
            .field("key_bytes", &"<redacted>")
            .finish()
    }
}

fn has_certificate(pem: &[u8]) -> bool {
    let mut reader = BufReader::new(pem);
    // The iterator borrows `reader` and must be dropped before it.
    let found = matches!(rustls_pemfile::certs(&mut reader).next(), Some(Ok(_)));
    found
}

fn has_private_key(pem: &[u8]) -> bool {
    let mut reader = BufReader::new(pem);
    matches!(rustls_pemfile::private_key(&mut reader), Ok(Some(_)))
}

/// Read the certificate and key files.
///
/// Returns `None` until both files exist and parse. A half-written file
/// looks the same as a missing one.
pub fn probe_certificates(cert_path: &Path, key_path: &Path) -> Option<CertificateMaterial> {
    let cert_pem = fs::read(cert_path).ok()?;
    let key_pem = fs::read(key_path).ok()?;
    CertificateMaterial::from_pem(cert_pem, key_pem)
}
