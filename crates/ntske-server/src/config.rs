// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTS-KE server configuration.

use std::io;
use std::path::Path;
use std::time::Duration;

use ntske_proto::params::DEFAULT_NTS_KE_PORT;
use ntske_proto::session::{DEFAULT_COOKIE_COUNT, ReplyOptions};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pki_types::pem::PemObject;

use crate::default_listen_addr;
use crate::error::ConfigError;

/// Default deadline for the TLS accept and each record read/write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an NTS-KE server.
#[derive(Debug)]
pub struct NtsKeServerConfig {
    /// TLS certificate chain (DER encoded).
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// Private key corresponding to the certificate (DER encoded).
    pub private_key: PrivateKeyDer<'static>,
    /// Listen address (default: `"[::]:4430"`).
    pub listen_addr: String,
    /// NTP server to advertise via the Server record.
    /// If `None`, clients use the NTS-KE server hostname.
    pub ntp_server: Option<String>,
    /// NTP port to advertise via the Port record.
    /// If `None`, clients use the default port 123.
    pub ntp_port: Option<u16>,
    /// Number of cookies to issue per session, 1 to 32 (default: 8).
    pub cookie_count: usize,
    /// Deadline for each network phase of a connection (default: 10 s).
    pub io_timeout: Duration,
}

impl NtsKeServerConfig {
    /// Create a config from PEM-encoded certificate chain and private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> io::Result<Self> {
        let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidCertificate {
                detail: e.to_string(),
            })?;
        if certs.is_empty() {
            return Err(ConfigError::InvalidCertificate {
                detail: "no certificates found".to_string(),
            }
            .into());
        }

        let key = PrivateKeyDer::from_pem_slice(key_pem).map_err(|e| {
            ConfigError::InvalidPrivateKey {
                detail: e.to_string(),
            }
        })?;

        Ok(NtsKeServerConfig {
            cert_chain: certs,
            private_key: key,
            listen_addr: default_listen_addr(DEFAULT_NTS_KE_PORT),
            ntp_server: None,
            ntp_port: None,
            cookie_count: DEFAULT_COOKIE_COUNT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    /// Create a config from PEM certificate and key files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> io::Result<Self> {
        let cert_pem = read_credential(cert_path.as_ref())?;
        let key_pem = read_credential(key_path.as_ref())?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Set the listen address.
    pub fn listen(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// What each successful reply carries.
    pub fn reply_options(&self) -> ReplyOptions {
        ReplyOptions {
            cookie_count: self.cookie_count,
            ntp_server: self.ntp_server.clone(),
            ntp_port: self.ntp_port,
        }
    }
}

fn read_credential(path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        ConfigError::Unreadable {
            path: path.display().to_string(),
            detail: e.to_string(),
        }
        .into()
    })
}
