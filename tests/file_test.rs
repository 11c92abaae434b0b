use std::fs;
use tempfile::tempdir;
use tinfoil_index::archive::{read_blob_source, read_index_file, write_index_file};
use tinfoil_index::crypto::{generate_keypair, load_private_key_pem, load_public_key_pem, write_keypair_pem};
use tinfoil_index::{CompressionId, Encryption, IndexCodec, IndexDocument, IndexError};

#[test]
fn test_encrypted_index_on_disk_with_pem_keys() {
    let dir = tempdir().unwrap();
    let (public_path, private_path) = write_keypair_pem(dir.path(), &generate_keypair().unwrap()).unwrap();
    let blob_path = dir.path().join("aux.bin");
    let index_path = dir.path().join("index.tfl");
    let export_path = dir.path().join("aux.out");
    fs::write(&blob_path, b"auxiliary executable payload").unwrap();

    let mut doc = IndexDocument::new();
    doc.set_files(["sdmc:/switch/game.nsp"]).add_success_message("Loaded index successfully!");

    let codec = IndexCodec::with_public_key(load_public_key_pem(&public_path).unwrap())
        .with_compression(CompressionId::Zlib);
    let blob = read_blob_source(&blob_path).unwrap();
    let bytes = codec.generate(&doc, blob.as_deref()).unwrap();
    write_index_file(&index_path, &bytes).unwrap();

    assert!(matches!(
        read_index_file(&index_path, None, Some(&export_path)),
        Err(IndexError::MissingCredential(_))
    ));
    assert!(!export_path.exists());

    let private = load_private_key_pem(&private_path).unwrap();
    let parsed = read_index_file(&index_path, Some(&private), Some(&export_path)).unwrap();
    assert_eq!(parsed.document, doc);
    assert_eq!(fs::read(&export_path).unwrap(), b"auxiliary executable payload");
}

#[test]
fn test_missing_blob_source_generates_plain_index() {
    let dir = tempdir().unwrap();
    let blob = read_blob_source(&dir.path().join("absent.bin")).unwrap();
    assert!(blob.is_none());

    let codec = IndexCodec::new().with_encryption(Encryption::Unencrypted);
    let bytes = codec.generate(&IndexDocument::new(), blob.as_deref()).unwrap();
    let index_path = dir.path().join("index.tfl");
    write_index_file(&index_path, &bytes).unwrap();

    let parsed = read_index_file(&index_path, None, None).unwrap();
    assert_eq!(parsed.document, IndexDocument::new());
    assert_eq!(parsed.blob, None);
}
