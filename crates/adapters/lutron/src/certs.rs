//! Loading and structural validation of the paired certificate bundle.
//!
//! Pairing with a bridge yields three PEM files: the bridge's CA, a client
//! certificate and its private key. They are checked here before any socket
//! is opened so that a misconfigured path fails `initialize` immediately.

use std::io::Cursor;
use std::path::Path;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::CertificatePaths;
use crate::error::LutronError;

/// Parsed certificates ready for a rustls client configuration.
#[derive(Debug)]
pub struct CertificateBundle {
    pub ca: Vec<CertificateDer<'static>>,
    pub client_chain: Vec<CertificateDer<'static>>,
    pub client_key: PrivateKeyDer<'static>,
}

/// Read and parse all three files.
///
/// # Errors
///
/// Returns [`LutronError::Certificate`] naming the first file that is
/// missing, lacks PEM markers, or holds no usable entry.
pub async fn load(paths: &CertificatePaths) -> Result<CertificateBundle, LutronError> {
    let ca = read_pem(&paths.ca).await?;
    let client_cert = read_pem(&paths.client_cert).await?;
    let client_key = read_pem(&paths.client_key).await?;

    let bundle = CertificateBundle {
        ca: parse_certificates(&paths.ca, &ca)?,
        client_chain: parse_certificates(&paths.client_cert, &client_cert)?,
        client_key: parse_private_key(&paths.client_key, &client_key)?,
    };
    tracing::debug!(
        ca = bundle.ca.len(),
        chain = bundle.client_chain.len(),
        "loaded bridge certificate bundle"
    );
    Ok(bundle)
}

async fn read_pem(path: &Path) -> Result<String, LutronError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| LutronError::certificate(path, err.to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| LutronError::certificate(path, "file is not PEM text"))?;
    if !(text.contains("-----BEGIN ") && text.contains("-----END ")) {
        return Err(LutronError::certificate(path, "missing PEM BEGIN/END markers"));
    }
    Ok(text)
}

fn parse_certificates(path: &Path, pem: &str) -> Result<Vec<CertificateDer<'static>>, LutronError> {
    if !pem.contains("-----BEGIN CERTIFICATE-----") {
        return Err(LutronError::certificate(path, "no CERTIFICATE block"));
    }
    let certs = rustls_pemfile::certs(&mut Cursor::new(pem.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| LutronError::certificate(path, err.to_string()))?;
    if certs.is_empty() {
        return Err(LutronError::certificate(path, "no certificate could be decoded"));
    }
    Ok(certs)
}

fn parse_private_key(path: &Path, pem: &str) -> Result<PrivateKeyDer<'static>, LutronError> {
    if !pem.contains("PRIVATE KEY-----") {
        return Err(LutronError::certificate(path, "no PRIVATE KEY block"));
    }
    rustls_pemfile::private_key(&mut Cursor::new(pem.as_bytes()))
        .map_err(|err| LutronError::certificate(path, err.to_string()))?
        .ok_or_else(|| LutronError::certificate(path, "no private key could be decoded"))
}
