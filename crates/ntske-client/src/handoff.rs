// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Persisting the key-exchange result for the time-transfer phase.

use std::io;
use std::path::Path;

use ntske_proto::params::{HandoffDocument, NegotiatedParameters};
use tracing::debug;

/// Write `params` as a JSON handoff document.
///
/// `ke_host` names the NTP server when the NTS-KE server sent no override.
pub fn write_handoff(
    path: impl AsRef<Path>,
    params: &NegotiatedParameters,
    ke_host: &str,
) -> io::Result<()> {
    let path = path.as_ref();
    let json = params
        .to_handoff(ke_host)
        .to_json()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), cookies = params.cookies.len(), "wrote handoff document");
    Ok(())
}

/// Read a handoff document written by [`write_handoff`].
pub fn read_handoff(path: impl AsRef<Path>) -> io::Result<HandoffDocument> {
    let json = std::fs::read_to_string(path)?;
    HandoffDocument::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
