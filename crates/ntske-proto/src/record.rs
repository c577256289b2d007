// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTS-KE record codec.
//!
//! Every record on the wire is:
//!
//! ```text
//! [C|type: 2 bytes BE][body_len: 2 bytes BE][body: body_len bytes]
//! ```
//!
//! Bit 15 of the first field is the critical bit. A receiver that does not
//! recognize a record type must fail when the critical bit is set and must
//! skip exactly `body_len` bytes when it is clear.

use tracing::trace;

use crate::error::ProtocolError;

/// End of Message record type.
pub const NTS_KE_END_OF_MESSAGE: u16 = 0;
/// Next Protocol Negotiation record type.
pub const NTS_KE_NEXT_PROTOCOL: u16 = 1;
/// Warning record type.
pub const NTS_KE_WARNING: u16 = 2;
/// Error record type.
pub const NTS_KE_ERROR: u16 = 3;
/// AEAD Algorithm Negotiation record type.
pub const NTS_KE_AEAD_ALGORITHM: u16 = 4;
/// New Cookie record type (may repeat).
pub const NTS_KE_NEW_COOKIE: u16 = 5;
/// NTP Server Negotiation record type.
pub const NTS_KE_SERVER: u16 = 6;
/// NTP Port Negotiation record type.
pub const NTS_KE_PORT: u16 = 7;

const CRITICAL_BIT: u16 = 0x8000;
const TYPE_MASK: u16 = 0x7FFF;

/// The fixed 4-byte prefix of every record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    /// Critical bit.
    pub critical: bool,
    /// 15-bit record type.
    pub record_type: u16,
    /// Declared body length.
    pub body_len: u16,
}

impl RecordHeader {
    /// Size of the header on the wire.
    pub const LEN: usize = 4;

    /// Split a raw header into critical bit, type and body length.
    pub fn parse(bytes: [u8; 4]) -> Self {
        let raw_type = u16::from_be_bytes([bytes[0], bytes[1]]);
        RecordHeader {
            critical: raw_type & CRITICAL_BIT != 0,
            record_type: raw_type & TYPE_MASK,
            body_len: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Serialize the header.
    pub fn to_bytes(self) -> [u8; 4] {
        let raw_type = if self.critical {
            self.record_type | CRITICAL_BIT
        } else {
            self.record_type
        };
        let t = raw_type.to_be_bytes();
        let l = self.body_len.to_be_bytes();
        [t[0], t[1], l[0], l[1]]
    }
}

/// Typed body of an NTS-KE record.
///
/// `Unknown` carries any type this codec does not recognize. Only
/// non-critical unknown records ever come out of the decoder, and encoding
/// an `Unknown` whose type is a known code or does not fit in 15 bits fails.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecordBody {
    /// End of Message (empty body).
    EndOfMessage,
    /// Next Protocol Negotiation: list of protocol ids.
    NextProtocol(Vec<u16>),
    /// Warning code.
    Warning(u16),
    /// Error code.
    Error(u16),
    /// AEAD Algorithm Negotiation: list of algorithm ids.
    AeadAlgorithm(Vec<u16>),
    /// New Cookie (opaque).
    Cookie(Vec<u8>),
    /// NTP server hostname or address literal.
    NtpServer(String),
    /// NTP port.
    NtpPort(u16),
    /// Unrecognized record type.
    Unknown {
        /// 15-bit record type.
        record_type: u16,
        /// Raw body.
        body: Vec<u8>,
    },
}

/// An NTS-KE record: critical bit plus typed body.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Record {
    /// Critical bit.
    pub critical: bool,
    /// Typed body.
    pub body: RecordBody,
}

impl Record {
    /// Create a record.
    pub fn new(critical: bool, body: RecordBody) -> Self {
        Record { critical, body }
    }

    /// Critical End of Message record.
    pub fn end_of_message() -> Self {
        Record::new(true, RecordBody::EndOfMessage)
    }

    /// Whether this is an End of Message record.
    pub fn is_end_of_message(&self) -> bool {
        matches!(self.body, RecordBody::EndOfMessage)
    }

    /// The 15-bit record type code.
    pub fn record_type(&self) -> u16 {
        match &self.body {
            RecordBody::EndOfMessage => NTS_KE_END_OF_MESSAGE,
            RecordBody::NextProtocol(_) => NTS_KE_NEXT_PROTOCOL,
            RecordBody::Warning(_) => NTS_KE_WARNING,
            RecordBody::Error(_) => NTS_KE_ERROR,
            RecordBody::AeadAlgorithm(_) => NTS_KE_AEAD_ALGORITHM,
            RecordBody::Cookie(_) => NTS_KE_NEW_COOKIE,
            RecordBody::NtpServer(_) => NTS_KE_SERVER,
            RecordBody::NtpPort(_) => NTS_KE_PORT,
            RecordBody::Unknown { record_type, .. } => *record_type,
        }
    }

    fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            RecordBody::EndOfMessage => Vec::new(),
            RecordBody::NextProtocol(ids) | RecordBody::AeadAlgorithm(ids) => {
                ids.iter().flat_map(|id| id.to_be_bytes()).collect()
            }
            RecordBody::Warning(code) | RecordBody::Error(code) | RecordBody::NtpPort(code) => {
                code.to_be_bytes().to_vec()
            }
            RecordBody::Cookie(cookie) => cookie.clone(),
            RecordBody::NtpServer(server) => server.as_bytes().to_vec(),
            RecordBody::Unknown { body, .. } => body.clone(),
        }
    }

    /// Append the wire form of this record to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if let RecordBody::Unknown { record_type, .. } = self.body {
            if record_type <= NTS_KE_PORT || record_type & CRITICAL_BIT != 0 {
                return Err(ProtocolError::InvalidRecordType { record_type });
            }
        }
        let body = self.body_bytes();
        let body_len =
            u16::try_from(body.len()).map_err(|_| ProtocolError::BodyTooLong { len: body.len() })?;
        let header = RecordHeader {
            critical: self.critical,
            record_type: self.record_type(),
            body_len,
        };
        buf.reserve(RecordHeader::LEN + body.len());
        buf.extend_from_slice(&header.to_bytes());
        buf.extend_from_slice(&body);
        Ok(())
    }

    /// Wire form of this record.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Build a record from a header and exactly `header.body_len` body bytes.
    pub fn from_parts(header: RecordHeader, body: Vec<u8>) -> Result<Record, ProtocolError> {
        if body.len() != header.body_len as usize {
            return Err(ProtocolError::BufferOverrun {
                declared: header.body_len as usize,
                available: body.len(),
            });
        }
        let record_type = header.record_type;
        let typed = match record_type {
            NTS_KE_END_OF_MESSAGE => {
                if !body.is_empty() {
                    return Err(malformed(record_type, "end of message must be empty"));
                }
                RecordBody::EndOfMessage
            }
            NTS_KE_NEXT_PROTOCOL => RecordBody::NextProtocol(parse_u16_list(record_type, &body)?),
            NTS_KE_WARNING => RecordBody::Warning(parse_u16(record_type, &body)?),
            NTS_KE_ERROR => RecordBody::Error(parse_u16(record_type, &body)?),
            NTS_KE_AEAD_ALGORITHM => {
                RecordBody::AeadAlgorithm(parse_u16_list(record_type, &body)?)
            }
            NTS_KE_NEW_COOKIE => RecordBody::Cookie(body),
            NTS_KE_SERVER => RecordBody::NtpServer(
                String::from_utf8(body)
                    .map_err(|_| malformed(record_type, "server name is not valid UTF-8"))?,
            ),
            NTS_KE_PORT => RecordBody::NtpPort(parse_u16(record_type, &body)?),
            _ => {
                if header.critical {
                    return Err(ProtocolError::UnrecognizedCritical { record_type });
                }
                RecordBody::Unknown { record_type, body }
            }
        };
        Ok(Record::new(header.critical, typed))
    }

    /// Decode one record from the front of `buf`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Record, usize), ProtocolError> {
        if buf.len() < RecordHeader::LEN {
            return Err(ProtocolError::BufferOverrun {
                declared: RecordHeader::LEN,
                available: buf.len(),
            });
        }
        let header = RecordHeader::parse([buf[0], buf[1], buf[2], buf[3]]);
        let rest = &buf[RecordHeader::LEN..];
        let body_len = header.body_len as usize;
        if body_len > rest.len() {
            return Err(ProtocolError::BufferOverrun {
                declared: body_len,
                available: rest.len(),
            });
        }
        let record = Record::from_parts(header, rest[..body_len].to_vec())?;
        Ok((record, RecordHeader::LEN + body_len))
    }
}

fn malformed(record_type: u16, detail: &'static str) -> ProtocolError {
    ProtocolError::MalformedBody {
        record_type,
        detail,
    }
}

fn parse_u16(record_type: u16, body: &[u8]) -> Result<u16, ProtocolError> {
    match body {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(malformed(record_type, "expected a 2-byte body")),
    }
}

fn parse_u16_list(record_type: u16, body: &[u8]) -> Result<Vec<u16>, ProtocolError> {
    if body.len() % 2 != 0 {
        return Err(malformed(record_type, "odd-length u16 list"));
    }
    Ok(body
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

/// Decode a complete message from a buffer.
///
/// Returns the records up to and including End of Message (non-critical
/// unknown records dropped) and the number of bytes consumed.
pub fn decode_message(buf: &[u8]) -> Result<(Vec<Record>, usize), ProtocolError> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let (record, used) = Record::decode(&buf[offset..])?;
        offset += used;
        if let Some(record) = keep(record) {
            let done = record.is_end_of_message();
            records.push(record);
            if done {
                return Ok((records, offset));
            }
        }
    }
    Err(ProtocolError::MissingEndOfMessage)
}

/// Encode records back to back.
pub fn encode_message(records: &[Record]) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    for record in records {
        record.encode(&mut buf)?;
    }
    Ok(buf)
}

fn keep(record: Record) -> Option<Record> {
    if let RecordBody::Unknown { record_type, body } = &record.body {
        trace!(record_type, len = body.len(), "skipping non-critical record");
        return None;
    }
    Some(record)
}
