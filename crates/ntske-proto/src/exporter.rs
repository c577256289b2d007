// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Session key derivation from the secured channel's keying-material
//! exporter (RFC 5705 / RFC 8446 section 7.5).
//!
//! The engine never names a TLS library. It sees the channel through
//! [`SecureChannel`]; with the `tls` feature the trait is implemented for
//! `rustls::ClientConnection` and `rustls::ServerConnection`.

use std::fmt;

use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{KEY_LEN, aead_key_length};
use crate::error::{ChannelError, CryptoError, NegotiationError};

/// ALPN protocol id for NTS-KE.
pub const NTS_KE_ALPN: &[u8] = b"ntske/1";

/// Exporter label for NTS session keys.
pub const NTS_EXPORTER_LABEL: &[u8] = b"EXPORTER-network-time-security/1";

/// Protocol id for NTPv4 in Next Protocol records.
pub const NTP_V4_PROTOCOL_ID: u16 = 0;

/// What the engine needs from an established secured channel.
pub trait SecureChannel {
    /// Application protocol the handshake selected, if any.
    fn negotiated_protocol(&self) -> Option<&[u8]>;

    /// Whether the handshake has finished.
    fn is_handshake_complete(&self) -> bool;

    /// Fill `out` from the channel's keying-material exporter.
    fn export_keying_material(
        &self,
        label: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> Result<(), CryptoError>;
}

/// Key direction, encoded as the last byte of the exporter context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Direction {
    /// Client to server.
    ClientToServer = 0x00,
    /// Server to client.
    ServerToClient = 0x01,
}

/// Exporter context: `protocol id (00 00) || algorithm (BE) || direction`.
pub fn exporter_context(algorithm: u16, direction: Direction) -> [u8; 5] {
    let alg = algorithm.to_be_bytes();
    [0x00, 0x00, alg[0], alg[1], direction as u8]
}

/// Fail unless the channel negotiated `ntske/1`.
pub fn require_ntske_protocol<C: SecureChannel + ?Sized>(channel: &C) -> Result<(), ChannelError> {
    match channel.negotiated_protocol() {
        Some(p) if p == NTS_KE_ALPN => Ok(()),
        other => Err(ChannelError::ProtocolMismatch {
            negotiated: other.map(|p| String::from_utf8_lossy(p).into_owned()),
        }),
    }
}

/// The two directional session keys.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Client-to-server key.
    pub c2s: [u8; KEY_LEN],
    /// Server-to-client key.
    pub s2c: [u8; KEY_LEN],
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys { .. }")
    }
}

/// Derive both directional keys for `algorithm` from the channel.
///
/// Calling this twice on the same channel yields the same keys.
pub fn derive_session_keys<C: SecureChannel + ?Sized>(
    channel: &C,
    algorithm: u16,
) -> Result<SessionKeys, crate::error::NtsKeError> {
    if aead_key_length(algorithm) != Some(KEY_LEN) {
        return Err(NegotiationError::UnsupportedAlgorithm { algorithm }.into());
    }
    if !channel.is_handshake_complete() {
        return Err(CryptoError::ChannelNotReady.into());
    }

    let mut keys = SessionKeys {
        c2s: [0u8; KEY_LEN],
        s2c: [0u8; KEY_LEN],
    };
    channel.export_keying_material(
        NTS_EXPORTER_LABEL,
        &exporter_context(algorithm, Direction::ClientToServer),
        &mut keys.c2s,
    )?;
    channel.export_keying_material(
        NTS_EXPORTER_LABEL,
        &exporter_context(algorithm, Direction::ServerToClient),
        &mut keys.s2c,
    )?;
    trace!(algorithm, "exported session keys");
    Ok(keys)
}

#[cfg(feature = "tls")]
mod tls {
    use super::SecureChannel;
    use crate::error::CryptoError;

    macro_rules! impl_secure_channel {
        ($conn:ty) => {
            impl SecureChannel for $conn {
                fn negotiated_protocol(&self) -> Option<&[u8]> {
                    self.alpn_protocol()
                }

                fn is_handshake_complete(&self) -> bool {
                    !self.is_handshaking()
                }

                fn export_keying_material(
                    &self,
                    label: &[u8],
                    context: &[u8],
                    out: &mut [u8],
                ) -> Result<(), CryptoError> {
                    (**self)
                        .export_keying_material(out, label, Some(context))
                        .map(|_| ())
                        .map_err(|e| CryptoError::KeyExport {
                            detail: e.to_string(),
                        })
                }
            }
        };
    }

    impl_secure_channel!(rustls::ClientConnection);
    impl_secure_channel!(rustls::ServerConnection);
}
