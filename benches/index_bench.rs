use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rsa::RsaPublicKey;
use tinfoil_index::codec::{compress, CompressionId};
use tinfoil_index::crypto::generate_keypair;
use tinfoil_index::{generate, parse, Encryption, FieldValue, FileEntry, IndexDocument};

fn large_doc() -> IndexDocument {
    let mut doc = IndexDocument::new();
    for i in 0..2000u64 {
        doc.push_file(FileEntry::record([
            ("url", FieldValue::from(format!("https://example.org/titles/{i:016x}.nsz"))),
            ("size", FieldValue::from(i * 1_048_576)),
        ]));
    }
    doc.add_success_message("Loaded index successfully!");
    doc
}

fn bench_compression(c: &mut Criterion) {
    let raw = large_doc().to_json().unwrap();
    c.bench_function("zstd22_compress_index_json", |b| b.iter(|| compress(black_box(&raw), CompressionId::Zstd)));
    c.bench_function("zlib9_compress_index_json", |b| b.iter(|| compress(black_box(&raw), CompressionId::Zlib)));
}

fn bench_generate_parse(c: &mut Criterion) {
    let doc = large_doc();
    let private = generate_keypair().unwrap();
    let public = RsaPublicKey::from(&private);
    let blob = vec![0x5Au8; 256 * 1024];

    c.bench_function("generate_encrypted_zstd", |b| {
        b.iter(|| generate(black_box(&doc), Encryption::Encrypted, CompressionId::Zstd, Some(&public), Some(&blob)).unwrap())
    });

    let bytes = generate(&doc, Encryption::Encrypted, CompressionId::Zstd, Some(&public), Some(&blob)).unwrap();
    c.bench_function("parse_encrypted_zstd", |b| {
        b.iter(|| parse(black_box(&bytes), Some(&private)).unwrap())
    });

    let plain = generate(&doc, Encryption::Unencrypted, CompressionId::None, None, None).unwrap();
    c.bench_function("parse_plain_none", |b| b.iter(|| parse(black_box(&plain), None).unwrap()));
}

criterion_group!(benches, bench_compression, bench_generate_parse);
criterion_main!(benches);
