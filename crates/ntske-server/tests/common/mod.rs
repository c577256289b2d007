// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers for NTS-KE server integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use ntske_server::{NtsKeServer, NtsKeServerConfig, SharedKeyring};

/// Self-signed certificate for `localhost` and `127.0.0.1`, as PEM.
pub(crate) struct TestCert {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

pub(crate) fn generate_test_cert() -> TestCert {
    let cert = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .expect("failed to generate certificate");
    TestCert {
        cert_pem: cert.cert.pem().into_bytes(),
        key_pem: cert.key_pair.serialize_pem().into_bytes(),
    }
}

/// Spawn a test server on an ephemeral loopback port.
///
/// `customize` can adjust the config before binding. Returns the bound
/// address and the server's keyring handle.
pub(crate) async fn spawn_test_server(
    cert: &TestCert,
    customize: impl FnOnce(&mut NtsKeServerConfig),
) -> (SocketAddr, SharedKeyring) {
    let mut config = NtsKeServerConfig::from_pem(&cert.cert_pem, &cert.key_pem)
        .expect("invalid test credentials")
        .listen("127.0.0.1:0");
    customize(&mut config);

    let server = NtsKeServer::bind(config, SharedKeyring::default())
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("failed to get local addr");
    let keyring = server.keyring();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    // Small yield to ensure the server task is running.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, keyring)
}

/// Client options trusting only the test certificate.
pub(crate) fn client_options(cert: &TestCert) -> ntske_client::ClientOptions {
    ntske_client::ClientOptions::new()
        .with_ca_pem(cert.cert_pem.clone())
        .with_io_timeout(Duration::from_secs(5))
}
