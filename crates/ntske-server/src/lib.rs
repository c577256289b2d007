// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio NTS-KE server (RFC 8915 section 4).
//!
//! Listens for TLS 1.3 connections on port 4430, negotiates NTPv4 and
//! AES-SIV-CMAC-256, and hands each client a batch of cookies sealed with a
//! rotating server-side keyring.

#![warn(missing_docs)]

/// Server configuration.
pub mod config;

/// Server error types.
pub mod error;

/// Shared cookie keyring and periodic rotation.
pub mod keyring;

/// Tokio NTS-KE listener and per-connection handshake driver.
pub mod nts_ke_server;

/// TLS server configuration for NTS-KE.
mod tls_config;

pub use config::NtsKeServerConfig;
pub use keyring::{SharedKeyring, spawn_rotation_task};
pub use nts_ke_server::NtsKeServer;

/// Default listen address for `port`: `[::]` (dual-stack).
pub(crate) fn default_listen_addr(port: u16) -> String {
    format!("[::]:{port}")
}
