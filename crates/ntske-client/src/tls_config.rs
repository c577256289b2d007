// TLS configuration for NTS-KE clients.
//
// TLS 1.3 only, ALPN "ntske/1", ring crypto provider. Trust comes from the
// WebPKI roots unless a PEM CA bundle is supplied.

use std::io;
use std::sync::Arc;

use ntske_proto::exporter::NTS_KE_ALPN;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::pem::PemObject;

use crate::error::ConfigError;

/// Where the client's trust anchors come from.
#[derive(Clone, Debug, Default)]
pub enum RootCertificates {
    /// Mozilla's root program via `webpki-roots`.
    #[default]
    WebPki,
    /// PEM-encoded CA certificates.
    Pem(Vec<u8>),
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn root_store(roots: &RootCertificates) -> io::Result<rustls::RootCertStore> {
    match roots {
        RootCertificates::WebPki => Ok(rustls::RootCertStore::from_iter(
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
        )),
        RootCertificates::Pem(pem) => {
            let mut store = rustls::RootCertStore::empty();
            for cert in CertificateDer::pem_slice_iter(pem) {
                let cert = cert.map_err(|e| ConfigError::InvalidCaBundle {
                    detail: e.to_string(),
                })?;
                store.add(cert).map_err(|e| ConfigError::InvalidCaBundle {
                    detail: e.to_string(),
                })?;
            }
            if store.is_empty() {
                return Err(ConfigError::InvalidCaBundle {
                    detail: "no certificates found".to_string(),
                }
                .into());
            }
            Ok(store)
        }
    }
}

/// Build a TLS 1.3 client configuration for NTS-KE.
///
/// With `accept_invalid_certs` the server certificate is not verified at
/// all; only use it against test servers.
pub fn nts_ke_client_config(
    roots: &RootCertificates,
    accept_invalid_certs: bool,
) -> io::Result<rustls::ClientConfig> {
    let provider = crypto_provider();
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipVerification { provider }))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(root_store(roots)?)
            .with_no_client_auth()
    };
    config.alpn_protocols = vec![NTS_KE_ALPN.to_vec()];
    Ok(config)
}

/// Accepts any server certificate. Signatures are still checked so the
/// handshake itself stays well-formed.
#[derive(Debug)]
struct SkipVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
