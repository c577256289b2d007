// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Async record reading and deadlines shared by the tokio client and server
//! drivers.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ChannelError, NtsKeError};
use crate::record::{Record, RecordHeader};

/// Read one record: the 4-byte header, then exactly `body_len` bytes.
pub async fn read_record<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Record, NtsKeError> {
    let mut hdr = [0u8; RecordHeader::LEN];
    reader.read_exact(&mut hdr).await?;
    let header = RecordHeader::parse(hdr);

    let mut body = vec![0u8; header.body_len as usize];
    reader.read_exact(&mut body).await?;
    Ok(Record::from_parts(header, body)?)
}

/// Run `fut` under `limit`, reporting `phase` if the deadline passes.
pub async fn with_deadline<T, E, F>(
    limit: Duration,
    phase: &'static str,
    fut: F,
) -> Result<T, NtsKeError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<NtsKeError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ChannelError::Timeout { phase }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::record::{RecordBody, encode_message};

    #[tokio::test]
    async fn test_read_records_in_sequence() {
        let bytes = encode_message(&[
            Record::new(true, RecordBody::NextProtocol(vec![0])),
            Record::new(false, RecordBody::Cookie(vec![42])),
            Record::end_of_message(),
        ])
        .unwrap();
        let mut reader = &bytes[..];
        assert_eq!(
            read_record(&mut reader).await.unwrap().body,
            RecordBody::NextProtocol(vec![0])
        );
        assert_eq!(
            read_record(&mut reader).await.unwrap().body,
            RecordBody::Cookie(vec![42])
        );
        assert!(read_record(&mut reader).await.unwrap().is_end_of_message());
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_read_critical_unknown() {
        let mut reader: &[u8] = &[0x80, 0x30, 0x00, 0x00];
        assert!(matches!(
            read_record(&mut reader).await,
            Err(NtsKeError::Protocol(ProtocolError::UnrecognizedCritical { record_type: 0x30 }))
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_body() {
        let mut reader: &[u8] = &[0x00, 0x05, 0x00, 0x08, 1, 2];
        match read_record(&mut reader).await {
            Err(NtsKeError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), NtsKeError> = with_deadline(
            Duration::from_millis(20),
            "read",
            std::future::pending::<Result<(), NtsKeError>>(),
        )
        .await;
        assert!(matches!(
            result,
            Err(NtsKeError::Channel(ChannelError::Timeout { phase: "read" }))
        ));
    }

    #[tokio::test]
    async fn test_deadline_passes_io_error() {
        let result = with_deadline(Duration::from_secs(1), "write", async {
            Err::<(), _>(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        })
        .await;
        match result {
            Err(NtsKeError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
