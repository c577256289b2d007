// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Sans-I/O NTS-KE handshake sessions.
//!
//! The runtime crates own the sockets; they feed decoded records into a
//! session and write whatever bytes the session hands back.
//!
//! Client: `Start -> SentRequest -> ReadingReply -> Complete | Failed`.
//!
//! Server: `Start -> ReadingRequest -> BuildingReply -> Complete | Failed`.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::aead::AEAD_AES_SIV_CMAC_256;
use crate::cookie::{self, CookieKeyring, PlainCookie};
use crate::error::{CryptoError, NegotiationError, NtsKeError, ProtocolError};
use crate::exporter::{NTP_V4_PROTOCOL_ID, SecureChannel, derive_session_keys};
use crate::params::{DEFAULT_NTP_PORT, NegotiatedParameters};
use crate::record::{Record, RecordBody, encode_message};

/// Error code: unrecognized critical record.
pub const ERROR_UNRECOGNIZED_CRITICAL: u16 = 0;
/// Error code: bad request.
pub const ERROR_BAD_REQUEST: u16 = 1;
/// Error code: internal server error.
pub const ERROR_INTERNAL_SERVER: u16 = 2;

/// Default number of cookies issued per handshake.
pub const DEFAULT_COOKIE_COUNT: usize = 8;

/// Most cookies a server will put in one reply.
pub const MAX_COOKIE_COUNT: usize = 32;

/// Most records either side accepts in one message, End of Message included.
pub const MAX_MESSAGE_RECORDS: usize = 64;

/// Client session state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientState {
    /// Nothing sent yet.
    Start,
    /// Request written, no reply record seen.
    SentRequest,
    /// At least one reply record seen.
    ReadingReply,
    /// Reply accepted; keys may be exported once.
    Complete,
    /// Terminal failure.
    Failed,
}

impl ClientState {
    fn name(self) -> &'static str {
        match self {
            ClientState::Start => "Start",
            ClientState::SentRequest => "SentRequest",
            ClientState::ReadingReply => "ReadingReply",
            ClientState::Complete => "Complete",
            ClientState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Client side of one NTS-KE exchange.
#[derive(Debug)]
pub struct ClientSession {
    state: ClientState,
    next_protocol: Option<u16>,
    algorithm: Option<u16>,
    cookies: Vec<Vec<u8>>,
    ntp_server: Option<String>,
    ntp_port: Option<u16>,
    warnings: Vec<u16>,
    records: usize,
    failure: Option<NtsKeError>,
    keys_exported: bool,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    /// A session in `Start`.
    pub fn new() -> Self {
        ClientSession {
            state: ClientState::Start,
            next_protocol: None,
            algorithm: None,
            cookies: Vec::new(),
            ntp_server: None,
            ntp_port: None,
            warnings: Vec::new(),
            records: 0,
            failure: None,
            keys_exported: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Why the session failed, once it has.
    pub fn failure(&self) -> Option<&NtsKeError> {
        self.failure.as_ref()
    }

    /// Cookies received so far.
    pub fn cookies(&self) -> &[Vec<u8>] {
        &self.cookies
    }

    /// Warning codes received so far.
    pub fn warnings(&self) -> &[u16] {
        &self.warnings
    }

    /// The request records: NTPv4, AES-SIV-CMAC-256, End of Message.
    pub fn request_records() -> Vec<Record> {
        vec![
            Record::new(true, RecordBody::NextProtocol(vec![NTP_V4_PROTOCOL_ID])),
            Record::new(true, RecordBody::AeadAlgorithm(vec![AEAD_AES_SIV_CMAC_256])),
            Record::end_of_message(),
        ]
    }

    /// Produce the request bytes and move to `SentRequest`.
    pub fn start(&mut self) -> Result<Vec<u8>, NtsKeError> {
        if self.state != ClientState::Start {
            return Err(self.invalid_state("start"));
        }
        let bytes = encode_message(&Self::request_records())?;
        self.state = ClientState::SentRequest;
        trace!(len = bytes.len(), "NTS-KE request built");
        Ok(bytes)
    }

    /// Feed one reply record. Returns the state afterwards.
    pub fn receive(&mut self, record: Record) -> Result<ClientState, NtsKeError> {
        match self.state {
            ClientState::SentRequest => self.state = ClientState::ReadingReply,
            ClientState::ReadingReply => {}
            _ => return Err(self.invalid_state("receive")),
        }
        self.records += 1;
        if self.records > MAX_MESSAGE_RECORDS {
            return Err(self.fail(ProtocolError::TooManyRecords {
                limit: MAX_MESSAGE_RECORDS,
            }));
        }

        match record.body {
            RecordBody::EndOfMessage => return self.finish(),
            RecordBody::NextProtocol(ids) => {
                if !ids.contains(&NTP_V4_PROTOCOL_ID) {
                    return Err(self.fail(NegotiationError::UnsupportedNextProtocol { offered: ids }));
                }
                self.next_protocol = Some(NTP_V4_PROTOCOL_ID);
            }
            RecordBody::AeadAlgorithm(ids) => {
                if ids.is_empty() {
                    return Err(self.fail(NegotiationError::MissingAlgorithm));
                }
                if self.algorithm.is_some() || ids.len() > 1 {
                    let algorithm = self.algorithm.unwrap_or(ids[0]);
                    return Err(self.fail(NegotiationError::UnsupportedAlgorithm { algorithm }));
                }
                self.algorithm = Some(ids[0]);
            }
            RecordBody::Cookie(cookie) => self.cookies.push(cookie),
            RecordBody::NtpServer(server) => self.ntp_server = Some(server),
            RecordBody::NtpPort(port) => self.ntp_port = Some(port),
            RecordBody::Warning(code) => {
                warn!(code, "NTS-KE server sent a warning");
                self.warnings.push(code);
            }
            RecordBody::Error(code) => {
                debug!(code, "NTS-KE server sent an error");
                return Err(self.fail(NegotiationError::ServerError { code }));
            }
            RecordBody::Unknown { record_type, .. } => {
                if record.critical {
                    return Err(self.fail(ProtocolError::UnrecognizedCritical { record_type }));
                }
                trace!(record_type, "ignoring non-critical record");
            }
        }
        Ok(self.state)
    }

    /// Record a decode failure on the reply stream.
    pub fn receive_error(&mut self, err: ProtocolError) -> NtsKeError {
        self.fail(err)
    }

    fn finish(&mut self) -> Result<ClientState, NtsKeError> {
        let algorithm = match self.algorithm {
            None => return Err(self.fail(NegotiationError::MissingAlgorithm)),
            Some(a) if a != AEAD_AES_SIV_CMAC_256 => {
                return Err(self.fail(NegotiationError::UnsupportedAlgorithm { algorithm: a }));
            }
            Some(a) => a,
        };
        if self.cookies.is_empty() {
            return Err(self.fail(NegotiationError::NoCookies));
        }
        self.state = ClientState::Complete;
        debug!(
            cookies = self.cookies.len(),
            algorithm,
            server = self.ntp_server.as_deref().unwrap_or("<ke host>"),
            port = self.ntp_port.unwrap_or(DEFAULT_NTP_PORT),
            "NTS-KE reply complete"
        );
        Ok(self.state)
    }

    /// Derive session keys and hand back the negotiated parameters.
    ///
    /// Valid once, and only in `Complete`.
    pub fn export_keys<C: SecureChannel + ?Sized>(
        &mut self,
        channel: &C,
    ) -> Result<NegotiatedParameters, NtsKeError> {
        if self.state != ClientState::Complete {
            return Err(CryptoError::SessionNotComplete.into());
        }
        if self.keys_exported {
            return Err(CryptoError::KeysAlreadyExported.into());
        }
        let algorithm_id = self.algorithm.unwrap_or(AEAD_AES_SIV_CMAC_256);
        let keys = derive_session_keys(channel, algorithm_id)?;
        self.keys_exported = true;

        Ok(NegotiatedParameters {
            next_protocol: self.next_protocol.unwrap_or(NTP_V4_PROTOCOL_ID),
            algorithm_id,
            cookies: std::mem::take(&mut self.cookies),
            ntp_server: self.ntp_server.clone(),
            ntp_port: self.ntp_port.unwrap_or(DEFAULT_NTP_PORT),
            c2s_key: keys.c2s,
            s2c_key: keys.s2c,
            warnings: self.warnings.clone(),
        })
    }

    fn fail(&mut self, err: impl Into<NtsKeError> + Clone) -> NtsKeError {
        self.state = ClientState::Failed;
        self.failure = Some(err.clone().into());
        err.into()
    }

    fn invalid_state(&self, operation: &'static str) -> NtsKeError {
        NegotiationError::InvalidState {
            operation,
            state: self.state.name(),
        }
        .into()
    }
}

/// Server session state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerState {
    /// No request record seen.
    Start,
    /// Reading the client request.
    ReadingRequest,
    /// Request complete; reply not built.
    BuildingReply,
    /// Reply built.
    Complete,
    /// Terminal failure.
    Failed,
}

impl ServerState {
    fn name(self) -> &'static str {
        match self {
            ServerState::Start => "Start",
            ServerState::ReadingRequest => "ReadingRequest",
            ServerState::BuildingReply => "BuildingReply",
            ServerState::Complete => "Complete",
            ServerState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the server puts in every successful reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyOptions {
    /// Cookies minted per handshake.
    pub cookie_count: usize,
    /// NTP server to advertise, if not the NTS-KE host.
    pub ntp_server: Option<String>,
    /// NTP port to advertise, if not 123.
    pub ntp_port: Option<u16>,
}

impl ReplyOptions {
    /// Check that a reply built with these options is usable by a client.
    pub fn validate(&self) -> Result<(), NegotiationError> {
        if self.cookie_count == 0 || self.cookie_count > MAX_COOKIE_COUNT {
            return Err(NegotiationError::InvalidCookieCount {
                count: self.cookie_count,
            });
        }
        Ok(())
    }
}

impl Default for ReplyOptions {
    fn default() -> Self {
        ReplyOptions {
            cookie_count: DEFAULT_COOKIE_COUNT,
            ntp_server: None,
            ntp_port: None,
        }
    }
}

/// Server side of one NTS-KE exchange.
#[derive(Debug)]
pub struct ServerSession {
    state: ServerState,
    options: ReplyOptions,
    offered_ntp_v4: bool,
    offered_algorithms: Vec<u16>,
    records: usize,
}

impl ServerSession {
    /// A session in `Start`.
    pub fn new(options: ReplyOptions) -> Self {
        ServerSession {
            state: ServerState::Start,
            options,
            offered_ntp_v4: false,
            offered_algorithms: Vec::new(),
            records: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Whether the client offered NTPv4.
    pub fn offered_ntp_v4(&self) -> bool {
        self.offered_ntp_v4
    }

    /// AEAD algorithms the client offered, in order.
    pub fn offered_algorithms(&self) -> &[u16] {
        &self.offered_algorithms
    }

    /// Feed one request record. Returns the state afterwards.
    pub fn receive(&mut self, record: Record) -> Result<ServerState, NtsKeError> {
        match self.state {
            ServerState::Start => self.state = ServerState::ReadingRequest,
            ServerState::ReadingRequest => {}
            _ => return Err(self.invalid_state("receive")),
        }
        self.records += 1;
        if self.records > MAX_MESSAGE_RECORDS {
            self.state = ServerState::Failed;
            return Err(ProtocolError::TooManyRecords {
                limit: MAX_MESSAGE_RECORDS,
            }
            .into());
        }

        match record.body {
            RecordBody::EndOfMessage => {
                self.state = ServerState::BuildingReply;
                debug!(
                    ntp_v4 = self.offered_ntp_v4,
                    algorithms = ?self.offered_algorithms,
                    "NTS-KE request complete"
                );
            }
            RecordBody::NextProtocol(ids) => {
                self.offered_ntp_v4 |= ids.contains(&NTP_V4_PROTOCOL_ID);
            }
            RecordBody::AeadAlgorithm(ids) => self.offered_algorithms.extend(ids),
            RecordBody::Unknown { record_type, .. } if record.critical => {
                self.state = ServerState::Failed;
                return Err(ProtocolError::UnrecognizedCritical { record_type }.into());
            }
            other => trace!(?other, "ignoring request record"),
        }
        Ok(self.state)
    }

    /// Record a decode failure on the request stream.
    pub fn receive_error(&mut self, err: ProtocolError) -> NtsKeError {
        self.state = ServerState::Failed;
        err.into()
    }

    /// Derive keys, mint cookies, and encode the reply.
    pub fn build_reply<C: SecureChannel + ?Sized>(
        &mut self,
        channel: &C,
        keyring: &CookieKeyring,
    ) -> Result<Vec<u8>, NtsKeError> {
        if self.state != ServerState::BuildingReply {
            return Err(self.invalid_state("build_reply"));
        }
        match self.encode_reply(channel, keyring) {
            Ok(bytes) => {
                self.state = ServerState::Complete;
                Ok(bytes)
            }
            Err(e) => {
                self.state = ServerState::Failed;
                Err(e)
            }
        }
    }

    fn encode_reply<C: SecureChannel + ?Sized>(
        &self,
        channel: &C,
        keyring: &CookieKeyring,
    ) -> Result<Vec<u8>, NtsKeError> {
        self.options.validate()?;
        let keys = derive_session_keys(channel, AEAD_AES_SIV_CMAC_256)?;
        let plain = PlainCookie {
            algorithm_id: AEAD_AES_SIV_CMAC_256,
            s2c_key: keys.s2c,
            c2s_key: keys.c2s,
        };

        let mut records = vec![
            Record::new(true, RecordBody::NextProtocol(vec![NTP_V4_PROTOCOL_ID])),
            Record::new(true, RecordBody::AeadAlgorithm(vec![AEAD_AES_SIV_CMAC_256])),
        ];
        for _ in 0..self.options.cookie_count {
            let sealed = cookie::mint(&plain, keyring)?;
            records.push(Record::new(false, RecordBody::Cookie(sealed.to_bytes())));
        }
        if let Some(server) = &self.options.ntp_server {
            records.push(Record::new(false, RecordBody::NtpServer(server.clone())));
        }
        if let Some(port) = self.options.ntp_port {
            records.push(Record::new(false, RecordBody::NtpPort(port)));
        }
        records.push(Record::end_of_message());

        debug!(
            cookies = self.options.cookie_count,
            key_id = keyring.current_key_id(),
            "NTS-KE reply built"
        );
        Ok(encode_message(&records)?)
    }

    /// Error reply: `error(code)` followed by End of Message.
    pub fn error_reply(code: u16) -> Result<Vec<u8>, NtsKeError> {
        Ok(encode_message(&[
            Record::new(true, RecordBody::Error(code)),
            Record::end_of_message(),
        ])?)
    }

    fn invalid_state(&self, operation: &'static str) -> NtsKeError {
        NegotiationError::InvalidState {
            operation,
            state: self.state.name(),
        }
        .into()
    }
}

/// Error code to send back for a failed request.
pub fn error_code_for(err: &NtsKeError) -> u16 {
    match err {
        NtsKeError::Protocol(ProtocolError::UnrecognizedCritical { .. }) => {
            ERROR_UNRECOGNIZED_CRITICAL
        }
        NtsKeError::Protocol(_) | NtsKeError::Negotiation(_) => ERROR_BAD_REQUEST,
        _ => ERROR_INTERNAL_SERVER,
    }
}
