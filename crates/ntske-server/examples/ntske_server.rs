// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Example NTS-KE server.
//!
//! Defaults to `server.crt` / `server.key` in the working directory and
//! port 4430:
//!
//! ```sh
//! RUST_LOG=debug cargo run -p ntske-server --example ntske_server -- \
//!     --cert server.crt --key server.key --listen [::]:4430 --ntp-server ntp.example.com
//! ```

use std::time::Duration;

use ntske_server::{NtsKeServer, NtsKeServerConfig, SharedKeyring, spawn_rotation_task};

struct Args {
    cert: String,
    key: String,
    listen: Option<String>,
    ntp_server: Option<String>,
    ntp_port: Option<u16>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let args = parse_args(std::env::args().skip(1));

    let mut config = NtsKeServerConfig::from_pem_files(&args.cert, &args.key)?;
    if let Some(listen) = args.listen {
        config = config.listen(listen);
    }
    config.ntp_server = args.ntp_server;
    config.ntp_port = args.ntp_port;

    // New cookie key every hour; retired keys decrypt for another day.
    let keyring = SharedKeyring::default();
    let _rotation = spawn_rotation_task(
        keyring.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(86400),
    );

    let server = NtsKeServer::bind(config, keyring).await?;
    println!("NTS-KE server listening on {}", server.local_addr()?);
    server.run().await
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Args {
    let mut args = Args {
        cert: "server.crt".to_string(),
        key: "server.key".to_string(),
        listen: None,
        ntp_server: None,
        ntp_port: None,
    };
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--cert" => args.cert = it.next().unwrap_or(args.cert),
            "--key" => args.key = it.next().unwrap_or(args.key),
            "--listen" => args.listen = it.next(),
            "--ntp-server" => args.ntp_server = it.next(),
            "--ntp-port" => args.ntp_port = it.next().and_then(|p| p.parse().ok()),
            other => eprintln!("ignoring unknown argument {}", other),
        }
    }
    args
}
