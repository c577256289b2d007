// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTS-KE server using the Tokio runtime (RFC 8915 section 4).
//!
//! Accepts TLS 1.3 connections, reads the client request into a
//! [`ServerSession`], derives the session keys from the TLS exporter, mints
//! cookies with the current keyring snapshot, and writes the reply. The
//! whole request must arrive within one `io_timeout`. A request that fails
//! to decode or negotiate gets an Error record back. Each connection runs on
//! its own task; failures are logged and never stop the listener.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use ntske_server::config::NtsKeServerConfig;
//! use ntske_server::keyring::SharedKeyring;
//! use ntske_server::nts_ke_server::NtsKeServer;
//!
//! let config = NtsKeServerConfig::from_pem_files("server.crt", "server.key")?;
//! let server = NtsKeServer::bind(config, SharedKeyring::default()).await?;
//! server.run().await
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use ntske_proto::error::{ChannelError, NtsKeError};
use ntske_proto::exporter::require_ntske_protocol;
use ntske_proto::session::{
    ERROR_INTERNAL_SERVER, ReplyOptions, ServerSession, ServerState, error_code_for,
};
use ntske_proto::stream::{read_record, with_deadline};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use crate::config::NtsKeServerConfig;
use crate::error::ConfigError;
use crate::keyring::SharedKeyring;
use crate::tls_config::nts_ke_server_config;

/// An NTS-KE server bound to its listen address.
pub struct NtsKeServer {
    listener: TcpListener,
    tls_acceptor: TlsAcceptor,
    keyring: SharedKeyring,
    reply: ReplyOptions,
    io_timeout: Duration,
}

impl NtsKeServer {
    /// Build the TLS acceptor and bind the listen address.
    pub async fn bind(config: NtsKeServerConfig, keyring: SharedKeyring) -> io::Result<Self> {
        let reply = config.reply_options();
        reply
            .validate()
            .map_err(|_| ConfigError::InvalidCookieCount {
                count: reply.cookie_count,
            })?;
        let io_timeout = config.io_timeout;
        let listen_addr = config.listen_addr;
        let tls_config = nts_ke_server_config(config.cert_chain, config.private_key)?;

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&listen_addr)
            .await
            .map_err(|_| ConfigError::InvalidListenAddress {
                address: listen_addr.clone(),
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ConfigError::InvalidListenAddress {
                address: listen_addr,
            }
            .into());
        }
        let listener = TcpListener::bind(&addrs[..]).await?;
        info!("NTS-KE server listening on {}", listener.local_addr()?);

        Ok(NtsKeServer {
            listener,
            tls_acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            keyring,
            reply,
            io_timeout,
        })
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the keyring this server mints with.
    pub fn keyring(&self) -> SharedKeyring {
        self.keyring.clone()
    }

    /// Accept connections indefinitely.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (tcp_stream, peer_addr) = self.listener.accept().await?;
            debug!("NTS-KE connection from {}", peer_addr);

            let acceptor = self.tls_acceptor.clone();
            let keyring = self.keyring.clone();
            let reply = self.reply.clone();
            let io_timeout = self.io_timeout;

            tokio::spawn(async move {
                if let Err(e) =
                    handle_nts_ke_connection(tcp_stream, acceptor, &keyring, reply, io_timeout).await
                {
                    debug!("NTS-KE error from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Feed request records into `session` until End of Message.
async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    session: &mut ServerSession,
) -> Result<(), NtsKeError> {
    while session.state() != ServerState::BuildingReply {
        let record = match read_record(reader).await {
            Ok(record) => record,
            Err(NtsKeError::Protocol(e)) => return Err(session.receive_error(e)),
            Err(e) => return Err(e),
        };
        session.receive(record)?;
    }
    Ok(())
}

/// Write an Error record and End of Message, then close the stream.
async fn send_error_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    code: u16,
    limit: Duration,
) -> Result<(), NtsKeError> {
    let reply = ServerSession::error_reply(code)?;
    with_deadline(limit, "write error", async {
        writer.write_all(&reply).await?;
        writer.flush().await?;
        writer.shutdown().await
    })
    .await
}

/// Send an error reply for `err` and hand `err` back to the caller.
async fn reject<W: AsyncWrite + Unpin>(
    writer: &mut W,
    code: u16,
    limit: Duration,
    err: NtsKeError,
) -> NtsKeError {
    if let Err(e) = send_error_reply(writer, code, limit).await {
        debug!("NTS-KE: failed to send error reply ({}): {}", code, e);
    }
    err
}

/// Handle a single NTS-KE client connection.
async fn handle_nts_ke_connection(
    tcp_stream: TcpStream,
    acceptor: TlsAcceptor,
    keyring: &SharedKeyring,
    reply: ReplyOptions,
    limit: Duration,
) -> Result<(), NtsKeError> {
    let mut tls_stream = match tokio::time::timeout(limit, acceptor.accept(tcp_stream)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(ChannelError::Accept(e).into()),
        Err(_) => return Err(ChannelError::Timeout { phase: "TLS accept" }.into()),
    };
    {
        let (_, conn) = tls_stream.get_ref();
        require_ntske_protocol(conn)?;
    }

    let mut session = ServerSession::new(reply);
    let request = with_deadline(limit, "read request", read_request(&mut tls_stream, &mut session)).await;
    match request {
        Ok(()) => {}
        Err(err @ (NtsKeError::Protocol(_) | NtsKeError::Negotiation(_))) => {
            return Err(reject(&mut tls_stream, error_code_for(&err), limit, err).await);
        }
        Err(err) => return Err(err),
    }

    let snapshot = keyring.snapshot();
    let built = {
        let (_, conn) = tls_stream.get_ref();
        session.build_reply(conn, &snapshot)
    };
    let response = match built {
        Ok(bytes) => bytes,
        Err(err) => return Err(reject(&mut tls_stream, ERROR_INTERNAL_SERVER, limit, err).await),
    };

    with_deadline(limit, "write", async {
        tls_stream.write_all(&response).await?;
        tls_stream.flush().await
    })
    .await?;
    let _ = tokio::time::timeout(limit, tls_stream.shutdown()).await;

    debug!(
        "NTS-KE: sent reply (ntp_v4 offered: {}, algorithms offered: {:?})",
        session.offered_ntp_v4(),
        session.offered_algorithms()
    );
    Ok(())
}
