// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Negotiated session parameters and the JSON handoff document a client
//! persists for the time-transfer phase.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::KEY_LEN;

/// Default NTP port when the server sends no port record.
pub const DEFAULT_NTP_PORT: u16 = 123;

/// Default NTS-KE port.
pub const DEFAULT_NTS_KE_PORT: u16 = 4430;

/// Everything a client needs after a successful key exchange.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct NegotiatedParameters {
    /// Negotiated next protocol (0 = NTPv4).
    pub next_protocol: u16,
    /// Negotiated AEAD algorithm.
    pub algorithm_id: u16,
    /// Opaque cookies in the order received.
    pub cookies: Vec<Vec<u8>>,
    /// NTP server override, if the server sent one.
    pub ntp_server: Option<String>,
    /// NTP port (123 unless overridden).
    pub ntp_port: u16,
    /// Client-to-server key.
    pub c2s_key: [u8; KEY_LEN],
    /// Server-to-client key.
    pub s2c_key: [u8; KEY_LEN],
    /// Warning codes the server sent.
    pub warnings: Vec<u16>,
}

impl fmt::Debug for NegotiatedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiatedParameters")
            .field("next_protocol", &self.next_protocol)
            .field("algorithm_id", &self.algorithm_id)
            .field("cookies", &self.cookies.len())
            .field("ntp_server", &self.ntp_server)
            .field("ntp_port", &self.ntp_port)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl NegotiatedParameters {
    /// Build the handoff document. `fallback_server` is the NTS-KE host,
    /// used when the server did not name a separate NTP server.
    pub fn to_handoff(&self, fallback_server: &str) -> HandoffDocument {
        HandoffDocument {
            c2s_key: self.c2s_key,
            s2c_key: self.s2c_key,
            server: self
                .ntp_server
                .clone()
                .unwrap_or_else(|| fallback_server.to_string()),
            port: self.ntp_port,
            cookie: self.cookies.clone(),
            algo: self.algorithm_id,
        }
    }
}

/// Client-side record of a completed key exchange.
///
/// Serialized as JSON with hex-encoded byte fields:
///
/// ```json
/// {"c2s_key":"…","s2c_key":"…","server":"ntp.example.com","port":123,"cookie":["…"],"algo":15}
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct HandoffDocument {
    /// Client-to-server key.
    #[serde(with = "hex_key")]
    pub c2s_key: [u8; KEY_LEN],
    /// Server-to-client key.
    #[serde(with = "hex_key")]
    pub s2c_key: [u8; KEY_LEN],
    /// NTP server to contact.
    pub server: String,
    /// NTP port.
    pub port: u16,
    /// Unused cookies.
    #[serde(with = "hex_list")]
    pub cookie: Vec<Vec<u8>>,
    /// AEAD algorithm.
    pub algo: u16,
}

impl fmt::Debug for HandoffDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffDocument")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("cookie", &self.cookie.len())
            .field("algo", &self.algo)
            .finish_non_exhaustive()
    }
}

impl HandoffDocument {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse JSON, rejecting bad hex and wrong key lengths.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

mod hex_key {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::aead::KEY_LEN;

    pub fn serialize<S: Serializer>(key: &[u8; KEY_LEN], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; KEY_LEN], D::Error> {
        let text = String::deserialize(d)?;
        let mut key = [0u8; KEY_LEN];
        hex::decode_to_slice(&text, &mut key).map_err(D::Error::custom)?;
        Ok(key)
    }
}

mod hex_list {
    use serde::de::Error;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&hex::encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|s| hex::decode(s).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NegotiatedParameters {
        NegotiatedParameters {
            next_protocol: 0,
            algorithm_id: 15,
            cookies: vec![vec![0xDE, 0xAD], vec![0xBE, 0xEF]],
            ntp_server: None,
            ntp_port: DEFAULT_NTP_PORT,
            c2s_key: [0x11; KEY_LEN],
            s2c_key: [0x22; KEY_LEN],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_handoff_uses_fallback_server() {
        let doc = params().to_handoff("time.example.net");
        assert_eq!(doc.server, "time.example.net");
        assert_eq!(doc.port, 123);

        let mut p = params();
        p.ntp_server = Some("ntp1.example.net".into());
        p.ntp_port = 1123;
        let doc = p.to_handoff("time.example.net");
        assert_eq!(doc.server, "ntp1.example.net");
        assert_eq!(doc.port, 1123);
    }

    #[test]
    fn test_handoff_json_fields() {
        let json = params().to_handoff("localhost").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["c2s_key"], "11".repeat(KEY_LEN));
        assert_eq!(value["s2c_key"], "22".repeat(KEY_LEN));
        assert_eq!(value["server"], "localhost");
        assert_eq!(value["port"], 123);
        assert_eq!(value["cookie"], serde_json::json!(["dead", "beef"]));
        assert_eq!(value["algo"], 15);

        let back = HandoffDocument::from_json(&json).unwrap();
        assert_eq!(back, params().to_handoff("localhost"));
    }

    #[test]
    fn test_handoff_rejects_short_key() {
        let json = r#"{"c2s_key":"00","s2c_key":"00","server":"x","port":123,"cookie":[],"algo":15}"#;
        assert!(HandoffDocument::from_json(json).is_err());
    }

    #[test]
    fn test_handoff_rejects_bad_hex() {
        let key = "00".repeat(KEY_LEN);
        let json = format!(
            r#"{{"c2s_key":"{key}","s2c_key":"{key}","server":"x","port":123,"cookie":["zz"],"algo":15}}"#
        );
        assert!(HandoffDocument::from_json(&json).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let dbg = format!("{:?}", params());
        assert!(dbg.contains("cookies: 2"));
        assert!(!dbg.contains("17, 17"));
    }
}
