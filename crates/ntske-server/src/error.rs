// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the NTS-KE server.
//!
//! Public APIs return `io::Result<T>`. Start-up problems carry a
//! [`ConfigError`]; per-connection failures carry an [`NtsKeError`] and are
//! only logged, since one bad client must not stop the listener.
//!
//! ```no_run
//! use ntske_server::config::NtsKeServerConfig;
//! use ntske_server::error::ConfigError;
//!
//! match NtsKeServerConfig::from_pem_files("server.crt", "server.key") {
//!     Ok(_) => println!("credentials loaded"),
//!     Err(e) => match e.get_ref().and_then(|inner| inner.downcast_ref::<ConfigError>()) {
//!         Some(cfg) => eprintln!("bad configuration: {cfg}"),
//!         None => eprintln!("I/O error: {e}"),
//!     },
//! }
//! ```

// Re-export engine error types so callers need only this crate.
pub use ntske_proto::error::{
    ChannelError, CryptoError, NegotiationError, NtsKeError, ProtocolError,
};

use std::fmt;
use std::io;

/// Invalid server configuration.
#[derive(Clone, Debug)]
pub enum ConfigError {
    /// A credential file could not be read.
    Unreadable {
        /// Path that failed.
        path: String,
        /// Underlying error text.
        detail: String,
    },
    /// The certificate chain is empty or not valid PEM.
    InvalidCertificate {
        /// Detail about the failure.
        detail: String,
    },
    /// The private key is missing or not valid PEM.
    InvalidPrivateKey {
        /// Detail about the failure.
        detail: String,
    },
    /// rustls refused the certificate/key pair.
    Tls {
        /// Detail from rustls.
        detail: String,
    },
    /// The listen address does not parse or resolve.
    InvalidListenAddress {
        /// The rejected address.
        address: String,
    },
    /// Cookies per reply must be between 1 and `MAX_COOKIE_COUNT`.
    InvalidCookieCount {
        /// The rejected count.
        count: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Unreadable { path, detail } => write!(f, "cannot read {path}: {detail}"),
            ConfigError::InvalidCertificate { detail } => {
                write!(f, "invalid certificate chain: {detail}")
            }
            ConfigError::InvalidPrivateKey { detail } => write!(f, "invalid private key: {detail}"),
            ConfigError::Tls { detail } => write!(f, "TLS config error: {detail}"),
            ConfigError::InvalidListenAddress { address } => {
                write!(f, "invalid listen address: {address}")
            }
            ConfigError::InvalidCookieCount { count } => {
                write!(f, "invalid cookie count: {count}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for io::Error {
    fn from(err: ConfigError) -> io::Error {
        let kind = match &err {
            ConfigError::Unreadable { .. } => io::ErrorKind::NotFound,
            ConfigError::InvalidListenAddress { .. } | ConfigError::InvalidCookieCount { .. } => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}
