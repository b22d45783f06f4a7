//! End-to-end file pipeline: large inputs, progress reporting, detached
//! metadata on disk and pairing by id.

use lockbox::crypto::{KdfParams, TAG_SIZE};
use lockbox::file::{FileMetadata, MetadataIndex, MetadataLookup};
use lockbox::records::FileInfo;
use lockbox::{Config, Engine, Error};
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;
use zeroize::Zeroizing;

const FIVE_MB: usize = 5 * 1024 * 1024;

fn engine() -> Engine {
    Engine::default().with_kdf(KdfParams::with_iterations(1_000))
}

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn assert_monotonic(progress: &[f64]) {
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn five_megabyte_roundtrip_through_disk() {
    let dir = TempDir::new().unwrap();
    let engine = engine();
    let data = make_data(FIVE_MB);

    let mut enc_progress = Vec::new();
    let encrypted = engine
        .encrypt_file(&data, "file password", |p| enc_progress.push(p))
        .unwrap()
        .with_file_info(FileInfo {
            original_file_name: Some("big.bin".to_string()),
            file_size: Some(FIVE_MB as u64),
            mime_type: Some("application/octet-stream".to_string()),
        });

    assert_monotonic(&enc_progress);
    assert_eq!(enc_progress.last(), Some(&1.0));
    assert_eq!(encrypted.blob.len(), FIVE_MB + TAG_SIZE);

    let blob_path = dir.path().join("big.bin.encrypted");
    let meta_path = dir.path().join("big.bin.encrypted.meta.json");
    fs::write(&blob_path, &encrypted.blob).unwrap();
    fs::write(&meta_path, encrypted.metadata.to_json().unwrap()).unwrap();

    let metadata = FileMetadata::from_json(&fs::read_to_string(&meta_path).unwrap()).unwrap();
    assert_eq!(metadata.id, encrypted.id());
    assert!(metadata.payload.ciphertext.is_empty());
    assert_eq!(
        metadata.file.as_ref().and_then(|f| f.file_size),
        Some(FIVE_MB as u64)
    );

    let blob = fs::read(&blob_path).unwrap();
    let mut dec_progress = Vec::new();
    let plaintext = engine
        .decrypt_file(&blob, &metadata, "file password", |p| dec_progress.push(p))
        .unwrap();

    assert_monotonic(&dec_progress);
    assert_eq!(dec_progress.last(), Some(&1.0));
    assert!(plaintext == data, "decrypted bytes differ");
}

#[test]
fn metadata_json_carries_pairing_fields() {
    let encrypted = engine().encrypt_file(b"pairing".as_slice(), "pw", |_| {}).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&encrypted.metadata.to_json().unwrap()).unwrap();

    assert_eq!(json["id"], encrypted.id().to_string());
    assert_eq!(json["algorithm"], "AES-GCM");
    assert!(json["iv"].is_string());
    assert!(json["salt"].is_string());
}

#[test]
fn wrong_password_stops_before_completion() {
    let engine = engine();
    let encrypted = engine.encrypt_file(b"secret file".as_slice(), "right", |_| {}).unwrap();

    let mut progress = Vec::new();
    let result = engine.decrypt_file(&encrypted.blob, &encrypted.metadata, "wrong", |p| {
        progress.push(p)
    });

    assert!(matches!(result, Err(Error::Authentication)));
    assert!(!progress.contains(&1.0));
}

#[test]
fn tampered_blob_rejected() {
    let engine = engine();
    let mut encrypted = engine.encrypt_file(make_data(4096).as_slice(), "pw", |_| {}).unwrap();
    encrypted.blob[2048] ^= 0x01;

    assert!(matches!(
        engine.decrypt_file(&encrypted.blob, &encrypted.metadata, "pw", |_| {}),
        Err(Error::Authentication)
    ));
}

#[test]
fn blobs_pair_with_their_own_metadata() {
    let engine = engine();
    let first = engine.encrypt_file(b"first".as_slice(), "pw", |_| {}).unwrap();
    let second = engine.encrypt_file(b"second".as_slice(), "pw", |_| {}).unwrap();
    assert_ne!(first.id(), second.id());

    let mut index = MetadataIndex::new();
    index.insert(first.metadata.clone());
    index.insert(second.metadata.clone());
    assert_eq!(index.len(), 2);

    let plain = engine
        .decrypt_file_by_id(&second.blob, &second.id(), &index, "pw", |_| {})
        .unwrap();
    assert_eq!(plain, b"second");

    // Mismatched pairing fails authentication rather than returning garbage
    assert!(engine
        .decrypt_file_by_id(&second.blob, &first.id(), &index, "pw", |_| {})
        .is_err());
}

#[test]
fn unknown_id_reports_missing_metadata() {
    let engine = engine();
    let encrypted = engine.encrypt_file(b"orphan".as_slice(), "pw", |_| {}).unwrap();
    let index = MetadataIndex::new();
    let id = Uuid::new_v4();

    assert!(index.find(&id).is_none());
    let err = engine
        .decrypt_file_by_id(&encrypted.blob, &id, &index, "pw", |_| {})
        .unwrap_err();
    assert!(matches!(err, Error::MissingMetadata(_)));
    assert!(err.user_message().contains("metadata"));
}

#[test]
fn config_iterations_drive_the_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.kdf.iterations = 2_000;
    config.save(&path).unwrap();

    let engine = Engine::new(&Config::load(&path).unwrap());
    assert_eq!(engine.kdf_params().iterations, 2_000);

    let payload = engine.encrypt_text("configured", "pw").unwrap();
    assert_eq!(engine.decrypt_text(&payload, "pw").unwrap(), "configured");

    let other = Engine::default().with_kdf(KdfParams::with_iterations(1_000));
    assert!(other.decrypt_text(&payload, "pw").is_err());
}

#[test]
fn raising_configured_iterations_keeps_old_files_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.kdf.iterations = 1_000;
    config.save(&path).unwrap();
    let before = Engine::new(&Config::load(&path).unwrap());
    let encrypted = before.encrypt_file(b"archived".as_slice(), "pw", |_| {}).unwrap();
    let meta_json = encrypted.metadata.to_json().unwrap();

    config.kdf.iterations = 4_000;
    config.save(&path).unwrap();
    let after = Engine::new(&Config::load(&path).unwrap());
    assert_eq!(after.kdf_params().iterations, 4_000);

    let metadata = FileMetadata::from_json(&meta_json).unwrap();
    assert_eq!(metadata.iterations, Some(1_000));
    let plain = after.decrypt_file(&encrypted.blob, &metadata, "pw", |_| {}).unwrap();
    assert_eq!(plain, b"archived");
}

#[tokio::test]
async fn offloaded_large_file_streams_progress() {
    let engine = engine();
    let data = make_data(FIVE_MB);

    let (handle, mut rx) = engine.encrypt_file_task(data.clone(), Zeroizing::new("pw".to_string()));
    let encrypted = handle.await.unwrap().unwrap();

    let mut progress = Vec::new();
    while let Some(p) = rx.recv().await {
        progress.push(p);
    }
    assert_monotonic(&progress);
    assert_eq!(progress.last(), Some(&1.0));

    let (handle, _rx) = engine.decrypt_file_task(
        encrypted.blob,
        encrypted.metadata,
        Zeroizing::new("pw".to_string()),
    );
    assert!(handle.await.unwrap().unwrap() == data);
}
