// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio NTS-KE client driver.
//!
//! Dials the server, completes TLS 1.3 with ALPN `ntske/1`, writes the
//! request produced by [`ClientSession`], feeds every reply record back into
//! the session, and exports the session keys once the reply is accepted.
//! Connect, handshake and write each run under [`ClientOptions::io_timeout`];
//! the whole reply must arrive within one more `io_timeout`.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ntske_proto::error::{ChannelError, NtsKeError};
use ntske_proto::exporter::require_ntske_protocol;
use ntske_proto::params::{DEFAULT_NTS_KE_PORT, NegotiatedParameters};
use ntske_proto::session::{ClientSession, ClientState};
use ntske_proto::stream::{read_record, with_deadline};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::ConfigError;
use crate::tls_config::{RootCertificates, nts_ke_client_config};

/// Default deadline for each network phase of the exchange.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Trust anchors for the server certificate.
    pub root_certificates: RootCertificates,
    /// Skip server certificate verification.
    pub accept_invalid_certs: bool,
    /// Deadline per I/O step.
    pub io_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientOptions {
    /// WebPKI roots, certificate verification on, 10 s per step.
    pub fn new() -> Self {
        ClientOptions {
            root_certificates: RootCertificates::WebPki,
            accept_invalid_certs: false,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Trust only the CA certificates in this PEM data.
    pub fn with_ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates = RootCertificates::Pem(pem.into());
        self
    }

    /// Trust only the CA certificates in this PEM file.
    pub fn with_ca_file(self, path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| ConfigError::InvalidCaBundle {
            detail: format!("{}: {e}", path.display()),
        })?;
        Ok(self.with_ca_pem(pem))
    }

    /// Disable server certificate verification.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the per-step deadline.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }
}

/// Split `host[:port]` into host and port (default 4430).
///
/// Bracketed IPv6 literals (`[::1]:4430`) are accepted; the brackets are
/// removed from the returned host.
pub fn parse_server_addr(server: &str) -> (&str, u16) {
    if let Some(rest) = server.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(DEFAULT_NTS_KE_PORT);
            return (host, port);
        }
    }
    match server.rsplit_once(':') {
        // A bare IPv6 literal has more than one colon and no port.
        Some((host, port)) if !host.contains(':') => match port.parse::<u16>() {
            Ok(p) => (host, p),
            Err(_) => (server, DEFAULT_NTS_KE_PORT),
        },
        _ => (server, DEFAULT_NTS_KE_PORT),
    }
}

/// Feed reply records into `session` until it completes or fails.
async fn read_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
    session: &mut ClientSession,
) -> Result<(), NtsKeError> {
    while session.state() != ClientState::Complete {
        let record = match read_record(reader).await {
            Ok(record) => record,
            Err(NtsKeError::Protocol(e)) => return Err(session.receive_error(e)),
            Err(e) => return Err(e),
        };
        session.receive(record)?;
    }
    Ok(())
}

/// Run one NTS-KE exchange against `server` (`host[:port]`).
///
/// # Example
///
/// ```no_run
/// # async fn example() -> std::io::Result<()> {
/// use ntske_client::ClientOptions;
///
/// let params = ntske_client::key_exchange("time.example.com", &ClientOptions::new()).await?;
/// println!("got {} cookies", params.cookies.len());
/// # Ok(())
/// # }
/// ```
pub async fn key_exchange(server: &str, options: &ClientOptions) -> io::Result<NegotiatedParameters> {
    Ok(run_key_exchange(server, options).await?)
}

async fn run_key_exchange(
    server: &str,
    options: &ClientOptions,
) -> Result<NegotiatedParameters, NtsKeError> {
    let limit = options.io_timeout;
    let (hostname, port) = parse_server_addr(server);
    debug!(host = hostname, port, "NTS-KE connecting");

    let tls_config = nts_ke_client_config(&options.root_certificates, options.accept_invalid_certs)?;
    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name =
        ServerName::try_from(hostname.to_string()).map_err(|_| ChannelError::InvalidServerName {
            name: hostname.to_string(),
        })?;

    let tcp_stream = match tokio::time::timeout(limit, TcpStream::connect((hostname, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(ChannelError::Connect(e).into()),
        Err(_) => return Err(ChannelError::Timeout { phase: "connect" }.into()),
    };
    let mut tls_stream =
        with_deadline(limit, "TLS handshake", connector.connect(server_name, tcp_stream)).await?;

    {
        let (_, conn) = tls_stream.get_ref();
        require_ntske_protocol(conn)?;
    }

    let mut session = ClientSession::new();
    let request = session.start()?;
    with_deadline(limit, "write", async {
        tls_stream.write_all(&request).await?;
        tls_stream.flush().await
    })
    .await?;

    with_deadline(limit, "read reply", read_reply(&mut tls_stream, &mut session)).await?;

    let (_, conn) = tls_stream.get_ref();
    let params = session.export_keys(conn)?;

    // Best-effort close; the keys are already exported.
    let _ = tokio::time::timeout(limit, tls_stream.shutdown()).await;

    debug!(
        cookies = params.cookies.len(),
        algorithm = params.algorithm_id,
        server = params.ntp_server.as_deref().unwrap_or(hostname),
        port = params.ntp_port,
        "NTS-KE complete"
    );
    Ok(params)
}
