use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gf2he::gates;
use gf2he::{PrivateKey, PublicKey};
use rand::prelude::*;

const CIPHER_BITS: usize = 128;
const PLAIN_BITS: usize = 64;

const GATE_CIPHER_BITS: usize = 16;
const GATE_PLAIN_BITS: usize = 8;

fn key_gen_benchmark(c: &mut Criterion) {
    c.bench_function("key_gen", |b| {
        b.iter(|| {
            let mut rng = rand::rng();
            PrivateKey::generate(black_box(CIPHER_BITS), black_box(PLAIN_BITS), &mut rng)
        })
    });
}

fn public_key_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let private = PrivateKey::generate(CIPHER_BITS, PLAIN_BITS, &mut rng).unwrap();

    c.bench_function("public_key", |b| {
        b.iter(|| {
            let mut rng = rand::rng();
            PublicKey::new(black_box(&private), &mut rng)
        })
    });
}

fn encrypt_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let private = PrivateKey::generate(CIPHER_BITS, PLAIN_BITS, &mut rng).unwrap();
    let public = PublicKey::new(&private, &mut rng).unwrap();
    let plaintext: Vec<u8> = (0..1024).map(|_| rng.random()).collect();

    c.bench_function("encrypt", |b| {
        b.iter(|| public.encrypt(black_box(&plaintext)))
    });
}

fn decrypt_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let private = PrivateKey::generate(CIPHER_BITS, PLAIN_BITS, &mut rng).unwrap();
    let public = PublicKey::new(&private, &mut rng).unwrap();
    let plaintext: Vec<u8> = (0..1024).map(|_| rng.random()).collect();
    let ciphertext = public.encrypt(&plaintext).unwrap();

    c.bench_function("decrypt", |b| {
        b.iter(|| private.decrypt(black_box(&ciphertext)))
    });
}

fn xor_gate_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let private = PrivateKey::generate(GATE_CIPHER_BITS, GATE_PLAIN_BITS, &mut rng).unwrap();

    c.bench_function("xor_gate", |b| {
        b.iter(|| {
            let mut rng = rand::rng();
            gates::binary_homomorphic_xor(black_box(GATE_PLAIN_BITS), &private, &mut rng)
        })
    });
}

fn efficient_and_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let private = PrivateKey::generate(GATE_CIPHER_BITS, GATE_PLAIN_BITS, &mut rng).unwrap();

    c.bench_function("efficient_and", |b| {
        b.iter(|| {
            let mut rng = rand::rng();
            gates::efficient_and(&private, &mut rng)
        })
    });
}

criterion_group!(
    benches,
    key_gen_benchmark,
    public_key_benchmark,
    encrypt_benchmark,
    decrypt_benchmark,
    xor_gate_benchmark,
    efficient_and_benchmark
);
criterion_main!(benches);
