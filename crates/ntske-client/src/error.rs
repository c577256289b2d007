// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the NTS-KE client.
//!
//! Public APIs return `io::Result<T>`. Handshake failures carry an
//! [`NtsKeError`] and configuration failures a [`ConfigError`]; both can be
//! recovered with `io::Error::get_ref()`:
//!
//! ```no_run
//! use ntske_client::ClientOptions;
//! use ntske_client::error::{NegotiationError, NtsKeError};
//!
//! # async fn example() {
//! match ntske_client::key_exchange("localhost:4430", &ClientOptions::new()).await {
//!     Ok(params) => println!("{} cookies", params.cookies.len()),
//!     Err(e) => match e.get_ref().and_then(|inner| inner.downcast_ref::<NtsKeError>()) {
//!         Some(NtsKeError::Negotiation(NegotiationError::ServerError { code })) => {
//!             eprintln!("server refused: {code}")
//!         }
//!         Some(other) => eprintln!("NTS-KE failed: {other}"),
//!         None => eprintln!("I/O error: {e}"),
//!     },
//! }
//! # }
//! ```

// Re-export engine error types so callers need only this crate.
pub use ntske_proto::error::{
    ChannelError, CryptoError, NegotiationError, NtsKeError, ProtocolError,
};

use std::fmt;
use std::io;

/// Invalid client configuration.
#[derive(Clone, Debug)]
pub enum ConfigError {
    /// Address resolved to no socket addresses.
    NoAddresses {
        /// The address that failed to resolve.
        address: String,
    },
    /// The CA bundle could not be read or held no usable certificate.
    InvalidCaBundle {
        /// Detail about the failure.
        detail: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoAddresses { address } => {
                write!(f, "address resolved to no socket addresses: {address}")
            }
            ConfigError::InvalidCaBundle { detail } => write!(f, "invalid CA bundle: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for io::Error {
    fn from(err: ConfigError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_downcast() {
        let err: io::Error = ConfigError::NoAddresses {
            address: "nowhere:4430".into(),
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let inner = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<ConfigError>())
            .unwrap();
        assert!(matches!(inner, ConfigError::NoAddresses { .. }));
        assert_eq!(
            inner.to_string(),
            "address resolved to no socket addresses: nowhere:4430"
        );
    }
}
