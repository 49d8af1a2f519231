//! TLS termination.
//!
//! # Responsibilities
//! - Load certificate chains and private keys from PEM files
//! - Select the certificate by SNI; unknown names fail the handshake
//! - Build a rustls server config (TLS 1.2/1.3, ALPN h2 + http/1.1)
//!
//! # Design Decisions
//! - rustls only (no OpenSSL)
//! - The ring provider is selected explicitly
//! - Certificates are reloaded with the configuration, never watched on
//!   their own

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring::{default_provider, sign::any_supported_type};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::ResolvesServerCertUsingSni;
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;

use crate::config::TlsConfig;

/// Error loading TLS material.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("unsupported private key in {path}: {source}")]
    UnsupportedKey {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
    #[error("certificate for {host}: {source}")]
    Certificate {
        host: String,
        #[source]
        source: rustls::Error,
    },
    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Build the server config for every configured certificate.
pub fn load_server_config(config: &TlsConfig) -> Result<Arc<ServerConfig>, TlsError> {
    let mut resolver = ResolvesServerCertUsingSni::new();

    for certificate in &config.certificates {
        let key = load_certified_key(
            Path::new(&certificate.cert_path),
            Path::new(&certificate.key_path),
        )?;
        for host in &certificate.hosts {
            resolver
                .add(host, key.clone())
                .map_err(|source| TlsError::Certificate {
                    host: host.clone(),
                    source,
                })?;
        }
        tracing::info!(
            hosts = ?certificate.hosts,
            cert_path = %certificate.cert_path,
            "Loaded TLS certificate"
        );
    }

    let mut server_config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(resolver));
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(server_config))
}

fn load_certified_key(cert_path: &Path, key_path: &Path) -> Result<CertifiedKey, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    let signing_key = any_supported_type(&key).map_err(|source| TlsError::UnsupportedKey {
        path: key_path.to_path_buf(),
        source,
    })?;
    Ok(CertifiedKey::new(certs, signing_key))
}

/// Load TLS certificates from PEM files
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Load private key from PEM file
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CertificateConfig;
    use std::io::Write;

    struct TempPem {
        dir: PathBuf,
    }

    impl TempPem {
        fn new(name: &str, hosts: &[&str]) -> (Self, CertificateConfig) {
            let dir = std::env::temp_dir().join(format!(
                "tenant-edge-tls-{}-{}",
                name,
                uuid::Uuid::new_v4()
            ));
            std::fs::create_dir_all(&dir).unwrap();

            let names: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
            let certified = rcgen::generate_simple_self_signed(names.clone()).unwrap();
            let cert_path = dir.join("fullchain.pem");
            let key_path = dir.join("privkey.pem");
            File::create(&cert_path)
                .unwrap()
                .write_all(certified.cert.pem().as_bytes())
                .unwrap();
            File::create(&key_path)
                .unwrap()
                .write_all(certified.key_pair.serialize_pem().as_bytes())
                .unwrap();

            let config = CertificateConfig {
                hosts: names,
                cert_path: cert_path.display().to_string(),
                key_path: key_path.display().to_string(),
            };
            (Self { dir }, config)
        }
    }

    impl Drop for TempPem {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn loads_certificates_for_every_host() {
        let (_main, main) = TempPem::new("main", &["multi-tenant.example", "nantou.multi-tenant.example"]);
        let (_other, other) = TempPem::new("other", &["other.example"]);

        let config = load_server_config(&TlsConfig {
            certificates: vec![main, other],
        })
        .unwrap();

        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn missing_key_file_is_reported() {
        let (_pem, mut certificate) = TempPem::new("missing", &["multi-tenant.example"]);
        certificate.key_path = "/nonexistent/privkey.pem".into();

        let err = load_server_config(&TlsConfig {
            certificates: vec![certificate],
        })
        .unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let (pem, mut certificate) = TempPem::new("empty", &["multi-tenant.example"]);
        let empty = pem.dir.join("empty.pem");
        File::create(&empty).unwrap();
        certificate.cert_path = empty.display().to_string();

        let err = load_server_config(&TlsConfig {
            certificates: vec![certificate],
        })
        .unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }
}
