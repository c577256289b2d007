// Benchmarks for NTS-KE record encoding/decoding and cookie minting.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ntske_proto::cookie::{CookieKeyring, PlainCookie, decrypt_bytes, mint};
use ntske_proto::record::{Record, RecordBody, decode_message, encode_message};

fn server_reply() -> Vec<Record> {
    let mut records = vec![
        Record::new(true, RecordBody::NextProtocol(vec![0])),
        Record::new(true, RecordBody::AeadAlgorithm(vec![15])),
    ];
    for i in 0..8u8 {
        records.push(Record::new(false, RecordBody::Cookie(vec![i; 100])));
    }
    records.push(Record::new(false, RecordBody::NtpServer("ntp.example.com".into())));
    records.push(Record::new(false, RecordBody::NtpPort(123)));
    records.push(Record::end_of_message());
    records
}

fn bench_encode_reply(c: &mut Criterion) {
    let records = server_reply();
    c.bench_function("ntske_encode_reply", |b| {
        b.iter(|| encode_message(black_box(&records)).unwrap())
    });
}

fn bench_decode_reply(c: &mut Criterion) {
    let bytes = encode_message(&server_reply()).unwrap();
    c.bench_function("ntske_decode_reply", |b| {
        b.iter(|| decode_message(black_box(&bytes)).unwrap())
    });
}

fn sample_cookie() -> PlainCookie {
    PlainCookie {
        algorithm_id: 15,
        s2c_key: [0xAB; 32],
        c2s_key: [0xCD; 32],
    }
}

fn bench_mint_cookie(c: &mut Criterion) {
    let ring = CookieKeyring::new();
    let plain = sample_cookie();
    c.bench_function("ntske_mint_cookie", |b| {
        b.iter(|| mint(black_box(&plain), &ring).unwrap())
    });
}

fn bench_decrypt_cookie(c: &mut Criterion) {
    let ring = CookieKeyring::new();
    let bytes = mint(&sample_cookie(), &ring).unwrap().to_bytes();
    c.bench_function("ntske_decrypt_cookie", |b| {
        b.iter(|| decrypt_bytes(black_box(&bytes), &ring).unwrap())
    });
}

criterion_group!(
    benches,
    bench_encode_reply,
    bench_decode_reply,
    bench_mint_cookie,
    bench_decrypt_cookie
);
criterion_main!(benches);
