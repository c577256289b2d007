// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tests for error type downcasting through the io::Error boundary.

use std::io;

use ntske_client::error::{
    ChannelError, ConfigError, CryptoError, NegotiationError, NtsKeError, ProtocolError,
};

fn inner(io_err: &io::Error) -> &NtsKeError {
    io_err
        .get_ref()
        .unwrap()
        .downcast_ref::<NtsKeError>()
        .unwrap()
}

#[test]
fn test_protocol_error_roundtrip() {
    let io_err: io::Error = NtsKeError::from(ProtocolError::BufferOverrun {
        declared: 100,
        available: 4,
    })
    .into();

    assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    assert!(matches!(
        inner(&io_err),
        NtsKeError::Protocol(ProtocolError::BufferOverrun {
            declared: 100,
            available: 4
        })
    ));
}

#[test]
fn test_negotiation_error_roundtrip() {
    let io_err: io::Error = NtsKeError::from(NegotiationError::NoCookies).into();

    assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    assert!(matches!(
        inner(&io_err),
        NtsKeError::Negotiation(NegotiationError::NoCookies)
    ));
}

#[test]
fn test_protocol_mismatch_roundtrip() {
    let io_err: io::Error = NtsKeError::from(ChannelError::ProtocolMismatch {
        negotiated: Some("h2".into()),
    })
    .into();

    assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    assert_eq!(
        inner(&io_err).to_string(),
        "NTS-KE channel error: peer not speaking ntske/1 (negotiated \"h2\")"
    );
}

#[test]
fn test_connect_error_keeps_kind() {
    let io_err: io::Error = NtsKeError::from(ChannelError::Connect(io::Error::from(
        io::ErrorKind::ConnectionRefused,
    )))
    .into();
    assert_eq!(io_err.kind(), io::ErrorKind::ConnectionRefused);
}

#[test]
fn test_crypto_error_roundtrip() {
    let io_err: io::Error = NtsKeError::from(CryptoError::KeyExport {
        detail: "handshake incomplete".into(),
    })
    .into();

    assert_eq!(io_err.kind(), io::ErrorKind::Other);
    assert!(matches!(
        inner(&io_err),
        NtsKeError::Crypto(CryptoError::KeyExport { .. })
    ));
}

#[test]
fn test_config_error_roundtrip() {
    let io_err: io::Error = ConfigError::InvalidCaBundle {
        detail: "no certificates found".into(),
    }
    .into();

    assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    let cfg = io_err
        .get_ref()
        .unwrap()
        .downcast_ref::<ConfigError>()
        .unwrap();
    assert!(matches!(cfg, ConfigError::InvalidCaBundle { .. }));
}
