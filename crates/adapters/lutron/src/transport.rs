//! Byte-stream connectors.
//!
//! The session logic only needs a bidirectional stream; [`Connector`] is the
//! seam that lets tests substitute an in-memory bridge for the TLS socket.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::certs::CertificateBundle;
use crate::error::LutronError;

/// A connected, bidirectional byte stream to a bridge.
pub trait BridgeStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> BridgeStream for T {}

pub type BoxStream = Box<dyn BridgeStream>;

/// Opens a new stream to the bridge. Called once at initialization and once
/// per reconnect attempt.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<BoxStream, LutronError>>;
}

/// Mutual-TLS connector for a real bridge.
pub struct TlsConnector {
    host: String,
    port: u16,
    timeout: Duration,
    server_name: ServerName<'static>,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Build the rustls client configuration from a loaded bundle.
    ///
    /// # Errors
    ///
    /// Returns [`LutronError::Tls`] when the CA, the client chain or the key
    /// is rejected by rustls, or the host is not a valid server name.
    pub fn new(
        host: &str,
        port: u16,
        timeout: Duration,
        bundle: CertificateBundle,
    ) -> Result<Self, LutronError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        for cert in bundle.ca {
            roots.add(cert).map_err(tls_error)?;
        }
        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()
            .map_err(|err| LutronError::Tls(err.to_string()))?;

        let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(tls_error)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(BridgeVerifier { inner: verifier }))
            .with_client_auth_cert(bundle.client_chain, bundle.client_key)
            .map_err(tls_error)?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|err| LutronError::Tls(format!("invalid bridge host `{host}`: {err}")))?;

        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
            server_name,
            tls: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

fn tls_error(err: rustls::Error) -> LutronError {
    LutronError::Tls(err.to_string())
}

impl Connector for TlsConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxStream, LutronError>> {
        Box::pin(async move {
            let tcp = tokio::time::timeout(
                self.timeout,
                TcpStream::connect((self.host.as_str(), self.port)),
            )
            .await
            .map_err(|_| LutronError::Timeout(self.timeout))??;
            tcp.set_nodelay(true)?;

            let stream = tokio::time::timeout(
                self.timeout,
                self.tls.connect(self.server_name.clone(), tcp),
            )
            .await
            .map_err(|_| LutronError::Timeout(self.timeout))?
            .map_err(|err| LutronError::Tls(err.to_string()))?;

            tracing::debug!(host = %self.host, port = self.port, "TLS session established");
            Ok(Box::new(stream) as BoxStream)
        })
    }
}

/// Chain verification against the paired CA, without the hostname check.
///
/// Bridge certificates are issued for the bridge's own name, not for the
/// address it is reached at, so only a name mismatch is tolerated.
#[derive(Debug)]
struct BridgeVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for BridgeVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(reason))
                if format!("{reason:?}").starts_with("NotValidForName") =>
            {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

    use super::*;

    #[test]
    fn should_reject_ca_that_is_not_a_certificate() {
        let bundle = CertificateBundle {
            ca: vec![CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00])],
            client_chain: vec![CertificateDer::from(vec![0x30, 0x00])],
            client_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(vec![0x30, 0x00])),
        };
        let result = TlsConnector::new("192.168.1.20", 8081, Duration::from_secs(1), bundle);
        assert!(matches!(result, Err(LutronError::Tls(_))));
    }
}
