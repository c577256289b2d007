// TLS configuration for the NTS-KE server.
//
// TLS 1.3 only, ALPN "ntske/1", ring crypto provider, no client auth.

use std::sync::Arc;

use ntske_proto::exporter::NTS_KE_ALPN;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::ConfigError;

/// Build a TLS server configuration for NTS-KE.
pub(crate) fn nts_ke_server_config(
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
) -> Result<rustls::ServerConfig, ConfigError> {
    let mut config =
        rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| ConfigError::Tls {
                detail: e.to_string(),
            })?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| ConfigError::Tls {
                detail: e.to_string(),
            })?;
    config.alpn_protocols = vec![NTS_KE_ALPN.to_vec()];
    Ok(config)
}
