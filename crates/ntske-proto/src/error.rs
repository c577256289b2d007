// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for NTS-KE record decoding, negotiation, secured-channel
//! handling, and cookie/key cryptography.
//!
//! The engine returns [`NtsKeError`] directly. The runtime crates keep
//! `io::Result` public APIs and convert via `From<NtsKeError> for io::Error`,
//! so callers can still match programmatically by downcasting:
//!
//! ```
//! use ntske_proto::error::{NegotiationError, NtsKeError};
//!
//! let io_err: std::io::Error = NtsKeError::from(NegotiationError::NoCookies).into();
//! let inner = io_err
//!     .get_ref()
//!     .and_then(|e| e.downcast_ref::<NtsKeError>());
//! assert!(matches!(inner, Some(NtsKeError::Negotiation(NegotiationError::NoCookies))));
//! ```

use std::fmt;
use std::io;

/// Malformed or unacceptable NTS-KE record data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// A record declared a body longer than the input that remains.
    BufferOverrun {
        /// Declared body length.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// Unrecognized record type with the critical bit set.
    UnrecognizedCritical {
        /// The 15-bit record type.
        record_type: u16,
    },
    /// A recognized record type whose body does not fit its format.
    MalformedBody {
        /// The 15-bit record type.
        record_type: u16,
        /// What was wrong with it.
        detail: &'static str,
    },
    /// Record body does not fit in the 16-bit length field.
    BodyTooLong {
        /// Length of the body that was refused.
        len: usize,
    },
    /// Input ended before an End of Message record.
    MissingEndOfMessage,
    /// An unknown record type that is a known code or wider than 15 bits.
    InvalidRecordType {
        /// The rejected type.
        record_type: u16,
    },
    /// A message carried more records than a session accepts.
    TooManyRecords {
        /// The record limit.
        limit: usize,
    },
}

/// The peers could not agree on usable session parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NegotiationError {
    /// The reply carried no AEAD Algorithm record.
    MissingAlgorithm,
    /// The negotiated AEAD algorithm is not AES-SIV-CMAC-256.
    UnsupportedAlgorithm {
        /// The algorithm the server selected.
        algorithm: u16,
    },
    /// The reply carried no cookies.
    NoCookies,
    /// The server answered with an Error record.
    ServerError {
        /// Error code from the record body.
        code: u16,
    },
    /// The Next Protocol record did not select NTPv4.
    UnsupportedNextProtocol {
        /// Protocol ids offered by the peer.
        offered: Vec<u16>,
    },
    /// A reply must carry at least one cookie and no more than the limit.
    InvalidCookieCount {
        /// The configured count.
        count: usize,
    },
    /// An operation was called in a state that does not allow it.
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State the session was in.
        state: &'static str,
    },
}

/// Failures of the secured channel underneath the session.
#[derive(Debug)]
pub enum ChannelError {
    /// Dialing the NTS-KE server failed.
    Connect(io::Error),
    /// Accepting a client connection failed.
    Accept(io::Error),
    /// The protocol selector is not `ntske/1`.
    ProtocolMismatch {
        /// What the channel negotiated, if anything.
        negotiated: Option<String>,
    },
    /// A read, write or handshake step exceeded its deadline.
    Timeout {
        /// Which step timed out.
        phase: &'static str,
    },
    /// The server name is not valid for TLS.
    InvalidServerName {
        /// The rejected name.
        name: String,
    },
}

/// Key export and cookie sealing/opening failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CryptoError {
    /// The channel handshake has not finished, so nothing can be exported.
    ChannelNotReady,
    /// The channel's exporter refused the request.
    KeyExport {
        /// Detail from the channel implementation.
        detail: String,
    },
    /// Keys were already exported for this session.
    KeysAlreadyExported,
    /// Keys were requested before the session completed.
    SessionNotComplete,
    /// Cookie failed authentication (wrong key or tampered).
    CookieAuthentication,
    /// No keyring entry with this identifier.
    UnknownKeyId {
        /// Key id embedded in the cookie.
        key_id: u16,
    },
    /// The cookie is too short or its payload has the wrong shape.
    MalformedCookie,
    /// AEAD sealing failed.
    Seal,
}

/// Any failure of an NTS-KE session.
#[derive(Debug)]
pub enum NtsKeError {
    /// Record codec failure.
    Protocol(ProtocolError),
    /// Negotiation failure.
    Negotiation(NegotiationError),
    /// Secured-channel failure.
    Channel(ChannelError),
    /// Key export or cookie failure.
    Crypto(CryptoError),
    /// Underlying I/O error.
    Io(io::Error),
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BufferOverrun {
                declared,
                available,
            } => write!(
                f,
                "buffer overrun: record declares {declared} body bytes, {available} available"
            ),
            ProtocolError::UnrecognizedCritical { record_type } => {
                write!(f, "unknown record type {record_type} with critical bit set")
            }
            ProtocolError::MalformedBody {
                record_type,
                detail,
            } => write!(f, "malformed body for record type {record_type}: {detail}"),
            ProtocolError::BodyTooLong { len } => {
                write!(f, "record body of {len} bytes exceeds 65535")
            }
            ProtocolError::MissingEndOfMessage => write!(f, "message has no End of Message record"),
            ProtocolError::InvalidRecordType { record_type } => {
                write!(f, "record type {record_type:#06x} cannot be sent as an unknown record")
            }
            ProtocolError::TooManyRecords { limit } => {
                write!(f, "message exceeds {limit} records")
            }
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::MissingAlgorithm => write!(f, "no AEAD algorithm negotiated"),
            NegotiationError::UnsupportedAlgorithm { algorithm } => {
                write!(f, "unsupported AEAD algorithm: {algorithm}")
            }
            NegotiationError::NoCookies => write!(f, "server did not provide any cookies"),
            NegotiationError::ServerError { code } => write!(f, "server error: code {code}"),
            NegotiationError::UnsupportedNextProtocol { offered } => {
                write!(f, "next protocol does not include NTPv4 (offered {offered:?})")
            }
            NegotiationError::InvalidCookieCount { count } => {
                write!(f, "invalid cookie count {count}")
            }
            NegotiationError::InvalidState { operation, state } => {
                write!(f, "cannot {operation} in state {state}")
            }
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Connect(e) => write!(f, "connect failed: {e}"),
            ChannelError::Accept(e) => write!(f, "accept failed: {e}"),
            ChannelError::ProtocolMismatch { negotiated } => match negotiated {
                Some(p) => write!(f, "peer not speaking ntske/1 (negotiated {p:?})"),
                None => write!(f, "peer not speaking ntske/1 (no protocol negotiated)"),
            },
            ChannelError::Timeout { phase } => write!(f, "{phase} timed out"),
            ChannelError::InvalidServerName { name } => write!(f, "invalid server name: {name}"),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::ChannelNotReady => write!(f, "channel handshake not complete"),
            CryptoError::KeyExport { detail } => write!(f, "key export failed: {detail}"),
            CryptoError::KeysAlreadyExported => write!(f, "session keys already exported"),
            CryptoError::SessionNotComplete => write!(f, "session has not completed"),
            CryptoError::CookieAuthentication => write!(f, "cookie authentication failed"),
            CryptoError::UnknownKeyId { key_id } => write!(f, "unknown cookie key id {key_id}"),
            CryptoError::MalformedCookie => write!(f, "malformed cookie"),
            CryptoError::Seal => write!(f, "AEAD seal failed"),
        }
    }
}

impl fmt::Display for NtsKeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtsKeError::Protocol(e) => write!(f, "NTS-KE protocol error: {e}"),
            NtsKeError::Negotiation(e) => write!(f, "NTS-KE negotiation error: {e}"),
            NtsKeError::Channel(e) => write!(f, "NTS-KE channel error: {e}"),
            NtsKeError::Crypto(e) => write!(f, "NTS-KE crypto error: {e}"),
            NtsKeError::Io(e) => write!(f, "{e}"),
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for ProtocolError {}
impl std::error::Error for NegotiationError {}
impl std::error::Error for CryptoError {}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Connect(e) | ChannelError::Accept(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for NtsKeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NtsKeError::Protocol(e) => Some(e),
            NtsKeError::Negotiation(e) => Some(e),
            NtsKeError::Channel(e) => Some(e),
            NtsKeError::Crypto(e) => Some(e),
            NtsKeError::Io(e) => Some(e),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────

impl From<ProtocolError> for NtsKeError {
    fn from(err: ProtocolError) -> Self {
        NtsKeError::Protocol(err)
    }
}

impl From<NegotiationError> for NtsKeError {
    fn from(err: NegotiationError) -> Self {
        NtsKeError::Negotiation(err)
    }
}

impl From<ChannelError> for NtsKeError {
    fn from(err: ChannelError) -> Self {
        NtsKeError::Channel(err)
    }
}

impl From<CryptoError> for NtsKeError {
    fn from(err: CryptoError) -> Self {
        NtsKeError::Crypto(err)
    }
}

impl From<io::Error> for NtsKeError {
    fn from(err: io::Error) -> Self {
        NtsKeError::Io(err)
    }
}

impl From<NtsKeError> for io::Error {
    fn from(err: NtsKeError) -> io::Error {
        let kind = match &err {
            NtsKeError::Protocol(_) => io::ErrorKind::InvalidData,
            NtsKeError::Negotiation(NegotiationError::ServerError { .. }) => {
                io::ErrorKind::ConnectionRefused
            }
            NtsKeError::Negotiation(_) => io::ErrorKind::InvalidData,
            NtsKeError::Channel(ChannelError::Timeout { .. }) => io::ErrorKind::TimedOut,
            NtsKeError::Channel(ChannelError::InvalidServerName { .. }) => {
                io::ErrorKind::InvalidInput
            }
            NtsKeError::Channel(ChannelError::Connect(e) | ChannelError::Accept(e)) => e.kind(),
            NtsKeError::Channel(_) => io::ErrorKind::InvalidData,
            NtsKeError::Crypto(_) => io::ErrorKind::Other,
            NtsKeError::Io(e) => e.kind(),
        };
        if let NtsKeError::Io(e) = err {
            return e;
        }
        io::Error::new(kind, err)
    }
}
