//! Benchmarks for the Autocrypt core.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pqautocrypt::{armor, AutocryptHeader, CryptoEngine, Identity, Keyring};

fn bench_key_generation(c: &mut Criterion) {
    let engine = CryptoEngine::new();
    let mut group = c.benchmark_group("key_generation");
    group.bench_function("create_keypair", |b| {
        b.iter(|| engine.create_keypair(black_box("bench@example.org")))
    });
    group.finish();
}

fn bench_header_codec(c: &mut Criterion) {
    let engine = CryptoEngine::new();
    let identity = Identity::generate(&engine, "bench@example.org").unwrap();
    let header = identity.autocrypt_header();
    let rendered = header.render();

    let mut group = c.benchmark_group("header_codec");
    group.bench_function("render", |b| b.iter(|| black_box(&header).render()));
    group.bench_function("parse", |b| {
        b.iter(|| AutocryptHeader::parse(black_box(&rendered)))
    });
    group.bench_function("structural_validation", |b| {
        b.iter(|| engine.is_structurally_valid(black_box(&header.public_key)))
    });
    group.finish();
}

fn bench_encryption(c: &mut Criterion) {
    let engine = CryptoEngine::new();
    let alice = Identity::generate(&engine, "alice@example.org").unwrap();
    let bob = Identity::generate(&engine, "bob@example.org").unwrap();
    let recipients: Keyring = [alice.public_key.clone(), bob.public_key.clone()]
        .into_iter()
        .collect();
    let own: Keyring = [bob.private_key.clone()].into_iter().collect();

    let mut group = c.benchmark_group("encryption");
    for size in [64usize, 1024, 64 * 1024] {
        let message = vec![0u8; size];
        let ciphertext = engine
            .encrypt(&message, &recipients, Some(&alice.private_key))
            .unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encrypt_signed", size), &message, |b, m| {
            b.iter(|| engine.encrypt(black_box(m), &recipients, Some(&alice.private_key)))
        });
        group.bench_with_input(BenchmarkId::new("decrypt_verify", size), &ciphertext, |b, ct| {
            b.iter(|| engine.decrypt(black_box(ct), &own, Some(&alice.public_key)))
        });
    }
    group.finish();
}

fn bench_armor(c: &mut Criterion) {
    let data = vec![0xA5u8; 64 * 1024];
    let armored = armor::encode(&data, armor::ArmorType::Message);

    let mut group = c.benchmark_group("armor");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("encode_64kb", |b| {
        b.iter(|| armor::encode(black_box(&data), armor::ArmorType::Message))
    });
    group.bench_function("split_decode_64kb", |b| {
        b.iter(|| {
            armor::split(black_box(&armored))
                .and_then(|block| block.decode_payload())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_key_generation,
    bench_header_codec,
    bench_encryption,
    bench_armor
);
criterion_main!(benches);
