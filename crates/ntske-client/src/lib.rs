// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio NTS-KE client (RFC 8915 section 4).
//!
//! Performs the TLS 1.3 key exchange with an NTS-KE server and returns the
//! negotiated parameters: two 32-byte session keys, the AEAD algorithm, the
//! NTP server and port to use, and the cookies for the time-transfer phase.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use ntske_client::{ClientOptions, key_exchange, write_handoff};
//!
//! let options = ClientOptions::new().with_ca_file("ca.pem")?;
//! let params = key_exchange("localhost:4430", &options).await?;
//! write_handoff("ke.json", &params, "localhost")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Client error types.
pub mod error;

/// Handoff document file helpers.
pub mod handoff;

/// Key exchange driver and client options.
pub mod ke;

/// TLS client configuration.
pub mod tls_config;

pub use handoff::{read_handoff, write_handoff};
pub use ke::{ClientOptions, key_exchange, parse_server_addr};
pub use ntske_proto::params::{HandoffDocument, NegotiatedParameters};
pub use tls_config::RootCertificates;
