//! Cryptographic operation benchmarks.
//!
//! Measures the per-connection key schedule and the steady-state chunk
//! sealing/opening throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use umbra::crypto::{
    derive_session_key, evp_bytes_to_key, CipherKind, CipherState, SessionKey, LENGTH_BLOCK_SIZE,
};
use umbra::darkstar::{EphemeralSecret, PersistentSecret, PublicKey};

fn bench_evp_bytes_to_key(c: &mut Criterion) {
    c.bench_function("evp_bytes_to_key_32", |b| {
        b.iter(|| black_box(evp_bytes_to_key(black_box("correct horse battery staple"), 32)))
    });
}

fn bench_session_key_derive(c: &mut Criterion) {
    let psk = evp_bytes_to_key("correct horse battery staple", 32);
    let salt = [0x42u8; 32];

    c.bench_function("hkdf_sha1_session_key", |b| {
        b.iter(|| black_box(derive_session_key(&psk, &salt).unwrap()))
    });
}

fn bench_p256_keygen(c: &mut Criterion) {
    c.bench_function("p256_compact_keygen", |b| {
        b.iter(|| {
            let secret = EphemeralSecret::random();
            black_box(PublicKey::from(&secret))
        })
    });
}

fn bench_p256_dh(c: &mut Criterion) {
    let server = PersistentSecret::random();
    let server_public = PublicKey::from(&server);
    let client = EphemeralSecret::random();

    c.bench_function("p256_dh", |b| {
        b.iter(|| black_box(client.diffie_hellman(&server_public)))
    });
}

fn bench_chunk_seal(c: &mut Criterion) {
    let payload = vec![0u8; 16384];
    let key = SessionKey::from_bytes(&[0x42u8; 32]);

    let mut group = c.benchmark_group("chunk_seal");
    group.throughput(Throughput::Bytes(16384));

    for kind in [CipherKind::Aes256Gcm, CipherKind::ChaCha20Poly1305] {
        let mut state = CipherState::new(kind, &key).unwrap();
        group.bench_function(format!("{kind:?}_16384"), |b| {
            b.iter(|| black_box(state.seal_chunk(&payload).unwrap()))
        });
    }

    group.finish();
}

fn bench_chunk_open(c: &mut Criterion) {
    let payload = vec![0u8; 16384];
    let key = SessionKey::from_bytes(&[0x42u8; 32]);

    let mut group = c.benchmark_group("chunk_open");
    group.throughput(Throughput::Bytes(16384));

    for kind in [CipherKind::Aes256Gcm, CipherKind::ChaCha20Poly1305] {
        group.bench_function(format!("{kind:?}_16384"), |b| {
            b.iter_batched(
                || {
                    let mut seal = CipherState::new(kind, &key).unwrap();
                    (
                        CipherState::new(kind, &key).unwrap(),
                        seal.seal_chunk(&payload).unwrap(),
                    )
                },
                |(mut open, chunk)| {
                    let len = open.open_length(&chunk[..LENGTH_BLOCK_SIZE]).unwrap();
                    black_box(open.open_payload(&chunk[LENGTH_BLOCK_SIZE..]).unwrap());
                    black_box(len)
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_evp_bytes_to_key,
    bench_session_key_derive,
    bench_p256_keygen,
    bench_p256_dh,
    bench_chunk_seal,
    bench_chunk_open,
);

criterion_main!(benches);
