// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTS-KE client example.
//!
//! Runs a key exchange and writes the result to a JSON handoff file.
//!
//! Usage:
//!   cargo run -p ntske-client --example ntske_client -- [host[:port]] [--ca-file PATH] [--insecure] [--out PATH]
//!
//! Set `RUST_LOG=debug` for handshake details.

use ntske_client::{ClientOptions, key_exchange, parse_server_addr, write_handoff};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut server = "localhost:4430".to_string();
    let mut ca_file = None;
    let mut insecure = false;
    let mut out = "ke.json".to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ca-file" => ca_file = args.next(),
            "--insecure" => insecure = true,
            "--out" => out = args.next().unwrap_or(out),
            _ => server = arg,
        }
    }

    let mut options = ClientOptions::new().danger_accept_invalid_certs(insecure);
    if let Some(path) = ca_file {
        options = match options.with_ca_file(&path) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("Cannot load CA file: {}", e);
                std::process::exit(1);
            }
        };
    }

    println!("Performing NTS-KE with {}...", server);
    let params = match key_exchange(&server, &options).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("NTS-KE failed: {}", e);
            std::process::exit(1);
        }
    };

    let (ke_host, _) = parse_server_addr(&server);
    println!("AEAD algorithm: {}", params.algorithm_id);
    println!(
        "NTP server:     {}:{}",
        params.ntp_server.as_deref().unwrap_or(ke_host),
        params.ntp_port
    );
    println!("Cookies:        {}", params.cookies.len());

    if let Err(e) = write_handoff(&out, &params, ke_host) {
        eprintln!("Cannot write {}: {}", out, e);
        std::process::exit(1);
    }
    println!("Wrote {}", out);
}
