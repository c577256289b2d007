// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! End-to-end NTS-KE handshakes over real TLS on loopback.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ntske_client::RootCertificates;
use ntske_client::error::{CryptoError, NegotiationError, NtsKeError};
use ntske_client::tls_config::nts_ke_client_config;
use ntske_proto::cookie::{EncryptedCookie, decrypt, decrypt_bytes};
use ntske_proto::record::{Record, RecordBody, decode_message, encode_message};
use ntske_proto::session::MAX_MESSAGE_RECORDS;
use ntske_server::error::ConfigError;
use ntske_server::{NtsKeServer, NtsKeServerConfig, SharedKeyring};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

#[tokio::test]
async fn test_handshake_cookies_carry_exported_keys() {
    let cert = common::generate_test_cert();
    let (addr, keyring) = common::spawn_test_server(&cert, |_| {}).await;

    let params = ntske_client::key_exchange(&addr.to_string(), &common::client_options(&cert))
        .await
        .unwrap();

    assert_eq!(params.next_protocol, 0);
    assert_eq!(params.algorithm_id, 15);
    assert_eq!(params.cookies.len(), 8);
    assert_eq!(params.ntp_server, None);
    assert_eq!(params.ntp_port, 123);
    assert_ne!(params.c2s_key, params.s2c_key);

    let snapshot = keyring.snapshot();
    for cookie in &params.cookies {
        let plain = decrypt_bytes(cookie, &snapshot).unwrap();
        assert_eq!(plain.algorithm_id, 15);
        assert_eq!(plain.c2s_key, params.c2s_key);
        assert_eq!(plain.s2c_key, params.s2c_key);
    }
}

#[tokio::test]
async fn test_handshake_advertises_server_and_port() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |c| {
        c.ntp_server = Some("ntp.example.com".to_string());
        c.ntp_port = Some(1123);
        c.cookie_count = 2;
    })
    .await;

    let params = ntske_client::key_exchange(&addr.to_string(), &common::client_options(&cert))
        .await
        .unwrap();
    assert_eq!(params.ntp_server.as_deref(), Some("ntp.example.com"));
    assert_eq!(params.ntp_port, 1123);
    assert_eq!(params.cookies.len(), 2);

    let doc = params.to_handoff("127.0.0.1");
    assert_eq!(doc.server, "ntp.example.com");
    assert_eq!(doc.port, 1123);
}

#[tokio::test]
async fn test_sessions_get_distinct_keys() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;
    let opts = common::client_options(&cert);

    let a = ntske_client::key_exchange(&addr.to_string(), &opts).await.unwrap();
    let b = ntske_client::key_exchange(&addr.to_string(), &opts).await.unwrap();
    assert_ne!(a.c2s_key, b.c2s_key);
    assert_ne!(a.s2c_key, b.s2c_key);
}

#[tokio::test]
async fn test_rotation_keeps_old_cookies_until_eviction() {
    let cert = common::generate_test_cert();
    let (addr, keyring) = common::spawn_test_server(&cert, |_| {}).await;
    let opts = common::client_options(&cert);

    let before = ntske_client::key_exchange(&addr.to_string(), &opts).await.unwrap();
    let old_cookie = EncryptedCookie::from_bytes(&before.cookies[0]).unwrap();
    let old_key_id = keyring.snapshot().current_key_id();
    assert_eq!(old_cookie.key_id, old_key_id);

    let new_key_id = keyring.rotate(Duration::ZERO);
    assert_ne!(new_key_id, old_key_id);

    // Still decryptable by the retained key.
    let plain = decrypt(&old_cookie, &keyring.snapshot()).unwrap();
    assert_eq!(plain.c2s_key, before.c2s_key);

    // New sessions mint under the new key.
    let after = ntske_client::key_exchange(&addr.to_string(), &opts).await.unwrap();
    let new_cookie = EncryptedCookie::from_bytes(&after.cookies[0]).unwrap();
    assert_eq!(new_cookie.key_id, new_key_id);

    assert_eq!(keyring.evict_expired(), 1);
    assert_eq!(
        decrypt(&old_cookie, &keyring.snapshot()),
        Err(CryptoError::UnknownKeyId { key_id: old_key_id })
    );
    assert!(decrypt(&new_cookie, &keyring.snapshot()).is_ok());
}

#[tokio::test]
async fn test_untrusted_certificate_rejected() {
    let cert = common::generate_test_cert();
    let other = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;

    let result =
        ntske_client::key_exchange(&addr.to_string(), &common::client_options(&other)).await;
    assert!(result.is_err());

    // The same server is accepted when verification is disabled.
    let insecure = common::client_options(&other).danger_accept_invalid_certs(true);
    let params = ntske_client::key_exchange(&addr.to_string(), &insecure)
        .await
        .unwrap();
    assert_eq!(params.cookies.len(), 8);
}

/// Open a raw NTS-KE TLS stream so tests can send hand-built requests.
async fn raw_connect(
    addr: std::net::SocketAddr,
    cert: &common::TestCert,
) -> tokio_rustls::client::TlsStream<TcpStream> {
    let config = nts_ke_client_config(&RootCertificates::Pem(cert.cert_pem.clone()), false).unwrap();
    let connector = TlsConnector::from(Arc::new(config));
    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("127.0.0.1").unwrap();
    connector.connect(name, tcp).await.unwrap()
}

#[tokio::test]
async fn test_critical_unknown_record_gets_error_reply() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;
    let mut stream = raw_connect(addr, &cert).await;

    let mut request = vec![0x80, 0x40, 0x00, 0x00]; // critical type 0x40, empty body
    request.extend_from_slice(&Record::end_of_message().to_bytes().unwrap());
    stream.write_all(&request).await.unwrap();
    stream.flush().await.unwrap();

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    let (records, _) = decode_message(&reply).unwrap();
    assert_eq!(records[0], Record::new(true, RecordBody::Error(0)));
    assert!(records[1].is_end_of_message());
}

#[tokio::test]
async fn test_non_critical_unknown_record_ignored() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;
    let mut stream = raw_connect(addr, &cert).await;

    let request = encode_message(&[
        Record::new(false, RecordBody::Unknown {
            record_type: 0x4321,
            body: vec![1, 2, 3],
        }),
        Record::new(true, RecordBody::NextProtocol(vec![0])),
        Record::new(true, RecordBody::AeadAlgorithm(vec![15])),
        Record::end_of_message(),
    ])
    .unwrap();
    stream.write_all(&request).await.unwrap();
    stream.flush().await.unwrap();

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    let (records, _) = decode_message(&reply).unwrap();
    let cookies = records
        .iter()
        .filter(|r| matches!(r.body, RecordBody::Cookie(_)))
        .count();
    assert_eq!(cookies, 8);
}

fn filler_record() -> Record {
    Record::new(false, RecordBody::Unknown {
        record_type: 0x1234,
        body: vec![],
    })
}

fn cookie_count(reply: &[u8]) -> usize {
    decode_message(reply)
        .map(|(records, _)| {
            records
                .iter()
                .filter(|r| matches!(r.body, RecordBody::Cookie(_)))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_trickled_request_hits_one_deadline() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |c| {
        c.io_timeout = Duration::from_millis(300);
    })
    .await;
    let mut stream = raw_connect(addr, &cert).await;

    // Every record lands well inside the deadline; the request as a whole
    // takes about a second.
    let filler = filler_record().to_bytes().unwrap();
    for _ in 0..10 {
        if stream.write_all(&filler).await.is_err() || stream.flush().await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let tail = encode_message(&[
        Record::new(true, RecordBody::NextProtocol(vec![0])),
        Record::new(true, RecordBody::AeadAlgorithm(vec![15])),
        Record::end_of_message(),
    ])
    .unwrap();
    let _ = stream.write_all(&tail).await;
    let _ = stream.flush().await;

    let mut reply = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply)).await;
    assert_eq!(cookie_count(&reply), 0);
}

#[tokio::test]
async fn test_oversized_request_gets_bad_request() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;
    let mut stream = raw_connect(addr, &cert).await;

    let records = vec![filler_record(); MAX_MESSAGE_RECORDS + 1];
    stream.write_all(&encode_message(&records).unwrap()).await.unwrap();
    stream.flush().await.unwrap();

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    let (records, _) = decode_message(&reply).unwrap();
    assert_eq!(records[0], Record::new(true, RecordBody::Error(1)));
    assert!(records[1].is_end_of_message());
}

#[tokio::test]
async fn test_request_at_record_limit_accepted() {
    let cert = common::generate_test_cert();
    let (addr, _) = common::spawn_test_server(&cert, |_| {}).await;
    let mut stream = raw_connect(addr, &cert).await;

    let mut records = vec![filler_record(); MAX_MESSAGE_RECORDS - 3];
    records.push(Record::new(true, RecordBody::NextProtocol(vec![0])));
    records.push(Record::new(true, RecordBody::AeadAlgorithm(vec![15])));
    records.push(Record::end_of_message());
    stream.write_all(&encode_message(&records).unwrap()).await.unwrap();
    stream.flush().await.unwrap();

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    assert_eq!(cookie_count(&reply), 8);
}

#[tokio::test]
async fn test_bind_rejects_zero_cookie_count() {
    let cert = common::generate_test_cert();
    let mut config = NtsKeServerConfig::from_pem(&cert.cert_pem, &cert.key_pem)
        .unwrap()
        .listen("127.0.0.1:0");
    config.cookie_count = 0;

    let err = match NtsKeServer::bind(config, SharedKeyring::default()).await {
        Ok(_) => panic!("bind accepted cookie_count = 0"),
        Err(e) => e,
    };
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    assert!(matches!(
        err.get_ref().and_then(|e| e.downcast_ref::<ConfigError>()),
        Some(ConfigError::InvalidCookieCount { count: 0 })
    ));
}

#[tokio::test]
async fn test_server_error_surfaces_to_client() {
    // A server that answers every request with error(1).
    let cert = common::generate_test_cert();
    let tls = ntske_server_error_stub(&cert).await;

    let err = ntske_client::key_exchange(&tls.to_string(), &common::client_options(&cert))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<NtsKeError>())
        .unwrap();
    assert!(matches!(
        inner,
        NtsKeError::Negotiation(NegotiationError::ServerError { code: 1 })
    ));
}

/// Minimal TLS endpoint that reads anything and replies `error(1), EOM`.
async fn ntske_server_error_stub(cert: &common::TestCert) -> std::net::SocketAddr {
    use rustls::pki_types::{CertificateDer, PrivateKeyDer};
    use rustls_pki_types::pem::PemObject;

    let certs = CertificateDer::pem_slice_iter(&cert.cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(&cert.key_pem).unwrap();
    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .unwrap();
    config.alpn_protocols = vec![b"ntske/1".to_vec()];
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut tls = acceptor.accept(tcp).await.unwrap();
        let mut buf = [0u8; 64];
        let _ = tls.read(&mut buf).await;
        let reply = encode_message(&[
            Record::new(true, RecordBody::Error(1)),
            Record::end_of_message(),
        ])
        .unwrap();
        tls.write_all(&reply).await.unwrap();
        let _ = tls.shutdown().await;
    });
    addr
}
