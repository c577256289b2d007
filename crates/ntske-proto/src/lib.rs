// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTS-KE (Network Time Security Key Establishment) handshake engine.
//!
//! This crate holds the runtime-free parts of NTS-KE: the record codec,
//! client and server session state machines, session key export, and the
//! sealed cookies a server hands out so it can stay stateless until the
//! time-transfer phase.

#![warn(missing_docs)]

/// Error taxonomy for the engine and its `io::Error` bridge.
pub mod error;

/// NTS-KE record encoding and decoding.
pub mod record;

/// AES-SIV-CMAC-256 seal/open helpers.
pub mod aead;

/// Cookie sealing, opening, and the rotating cookie keyring.
pub mod cookie;

/// Secured-channel abstraction and session key derivation.
pub mod exporter;

/// Negotiated parameters and the client handoff document.
pub mod params;

/// Client and server handshake state machines.
pub mod session;

/// Async record reading for tokio drivers.
#[cfg(feature = "tokio")]
pub mod stream;

pub use error::NtsKeError;
pub use exporter::SecureChannel;
pub use params::{HandoffDocument, NegotiatedParameters};
pub use record::{Record, RecordBody};
pub use session::{ClientSession, ClientState, ReplyOptions, ServerSession, ServerState};
