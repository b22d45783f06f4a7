//! Whole-file encryption pipeline
//!
//! One call walks `Idle -> ReadingInput -> DerivingKey -> Transforming ->
//! Packaging -> Done` (or `Failed`), reporting progress 0.1 / 0.3 / 0.8 / 1.0
//! at the stage boundaries. The output is a pair: the raw ciphertext-with-tag
//! blob and a metadata record holding nonce, salt and algorithm with an
//! empty ciphertext. Both carry the same pairing id so storage can keep
//! them together without relying on file names.

use crate::crypto::kdf::{derive_key_with, KdfParams};
use crate::crypto::symmetric::{self, EncryptedPayload};
use crate::error::{Error, Result};
use crate::records::FileInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Progress after the input has been read
pub const PROGRESS_READ: f64 = 0.1;
/// Progress after the key has been derived
pub const PROGRESS_KEY_DERIVED: f64 = 0.3;
/// Progress after the cipher transform
pub const PROGRESS_TRANSFORMED: f64 = 0.8;
/// Progress on completion
pub const PROGRESS_DONE: f64 = 1.0;

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Idle,
    ReadingInput,
    DerivingKey,
    Transforming,
    Packaging,
    Done,
    Failed,
}

/// Detached encryption metadata for a file blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Pairing id shared with the blob
    pub id: Uuid,
    /// `{ ciphertext: "", iv, salt, algorithm }`
    #[serde(flatten)]
    pub payload: EncryptedPayload,
    /// PBKDF2 iteration count the blob was encrypted with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
}

impl FileMetadata {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Result of [`FileCipher::encrypt`]
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    /// Raw AES-GCM ciphertext with appended tag
    pub blob: Vec<u8>,
    pub metadata: FileMetadata,
}

impl EncryptedFile {
    pub fn id(&self) -> Uuid {
        self.metadata.id
    }

    pub fn with_file_info(mut self, info: FileInfo) -> Self {
        self.metadata.file = Some(info);
        self
    }
}

/// Source of metadata for a blob, keyed by pairing id
pub trait MetadataLookup {
    fn find(&self, id: &Uuid) -> Option<FileMetadata>;
}

/// In-memory [`MetadataLookup`]
#[derive(Debug, Default)]
pub struct MetadataIndex {
    entries: HashMap<Uuid, FileMetadata>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metadata: FileMetadata) -> Option<FileMetadata> {
        self.entries.insert(metadata.id, metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataLookup for MetadataIndex {
    fn find(&self, id: &Uuid) -> Option<FileMetadata> {
        self.entries.get(id).cloned()
    }
}

/// Tracks stage and reported progress for one call
struct Pipeline<P: FnMut(f64)> {
    state: FileState,
    progress: f64,
    on_progress: P,
}

impl<P: FnMut(f64)> Pipeline<P> {
    fn new(on_progress: P) -> Self {
        Pipeline {
            state: FileState::Idle,
            progress: 0.0,
            on_progress,
        }
    }

    fn enter(&mut self, state: FileState) {
        debug!(from = ?self.state, to = ?state, "file pipeline transition");
        self.state = state;
    }

    fn report(&mut self, progress: f64) {
        debug_assert!(progress >= self.progress, "progress must not go backwards");
        self.progress = progress.clamp(self.progress, PROGRESS_DONE);
        (self.on_progress)(self.progress);
    }

    /// Run `f` in `state`, moving to `Failed` on error
    fn stage<T>(&mut self, state: FileState, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.enter(state);
        f().map_err(|e| {
            self.enter(FileState::Failed);
            e
        })
    }
}

/// Password-based whole-file encryption
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCipher {
    params: KdfParams,
}

impl FileCipher {
    pub fn new(params: KdfParams) -> Self {
        FileCipher { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt everything readable from `input` under `password`.
    ///
    /// A fresh salt and nonce are generated for every call.
    pub fn encrypt<R, P>(
        &self,
        mut input: R,
        password: &str,
        on_progress: P,
    ) -> Result<EncryptedFile>
    where
        R: Read,
        P: FnMut(f64),
    {
        let mut pipeline = Pipeline::new(on_progress);

        let plaintext = pipeline.stage(FileState::ReadingInput, || {
            let mut buf = Zeroizing::new(Vec::new());
            input.read_to_end(&mut buf)?;
            Ok(buf)
        })?;
        pipeline.report(PROGRESS_READ);

        let derived = pipeline.stage(FileState::DerivingKey, || {
            derive_key_with(password, None, &self.params)
        })?;
        pipeline.report(PROGRESS_KEY_DERIVED);

        let mut payload = pipeline.stage(FileState::Transforming, || {
            symmetric::encrypt(&plaintext, derived.key())
        })?;
        pipeline.report(PROGRESS_TRANSFORMED);

        pipeline.enter(FileState::Packaging);
        drop(plaintext);
        let blob = std::mem::take(&mut payload.ciphertext);
        payload.salt = Some(derived.salt().to_vec());
        let metadata = FileMetadata {
            id: Uuid::new_v4(),
            payload,
            iterations: Some(self.params.iterations),
            file: None,
        };

        pipeline.enter(FileState::Done);
        pipeline.report(PROGRESS_DONE);

        debug!(id = %metadata.id, size = blob.len(), "file encrypted");
        Ok(EncryptedFile { blob, metadata })
    }

    /// Decrypt a blob with its paired metadata.
    ///
    /// Uses the iteration count recorded in `metadata` when present.
    /// Fails with [`Error::MissingSalt`] if the metadata has no salt and with
    /// [`Error::Authentication`] on tampering or a wrong password.
    pub fn decrypt<R, P>(
        &self,
        mut blob: R,
        metadata: &FileMetadata,
        password: &str,
        on_progress: P,
    ) -> Result<Vec<u8>>
    where
        R: Read,
        P: FnMut(f64),
    {
        let mut pipeline = Pipeline::new(on_progress);

        let ciphertext = pipeline.stage(FileState::ReadingInput, || {
            let mut buf = Vec::new();
            blob.read_to_end(&mut buf)?;
            Ok(buf)
        })?;
        pipeline.report(PROGRESS_READ);

        let derived = pipeline.stage(FileState::DerivingKey, || {
            let salt = metadata.payload.salt.as_deref().ok_or(Error::MissingSalt)?;
            let params = self.params.for_recorded(metadata.iterations);
            derive_key_with(password, Some(salt), &params)
        })?;
        pipeline.report(PROGRESS_KEY_DERIVED);

        let plaintext = pipeline.stage(FileState::Transforming, || {
            let payload = metadata.payload.with_ciphertext(ciphertext);
            symmetric::decrypt(&payload, derived.key())
        })?;
        pipeline.report(PROGRESS_TRANSFORMED);

        pipeline.enter(FileState::Packaging);
        pipeline.enter(FileState::Done);
        pipeline.report(PROGRESS_DONE);

        Ok(plaintext)
    }

    /// Decrypt a blob whose metadata is looked up by pairing id.
    ///
    /// Fails with [`Error::MissingMetadata`] when `lookup` has no entry.
    pub fn decrypt_by_id<R, L, P>(
        &self,
        blob: R,
        id: &Uuid,
        lookup: &L,
        password: &str,
        on_progress: P,
    ) -> Result<Vec<u8>>
    where
        R: Read,
        L: MetadataLookup + ?Sized,
        P: FnMut(f64),
    {
        let metadata = lookup
            .find(id)
            .ok_or_else(|| Error::MissingMetadata(id.to_string()))?;
        self.decrypt(blob, &metadata, password, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::symmetric::Algorithm;
    use crate::crypto::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

    fn cipher() -> FileCipher {
        FileCipher::new(KdfParams::with_iterations(1_000))
    }

    #[test]
    fn test_encrypt_produces_detached_metadata() {
        let data = b"file contents".to_vec();
        let encrypted = cipher().encrypt(data.as_slice(), "pw", |_| {}).unwrap();

        assert_eq!(encrypted.blob.len(), data.len() + TAG_SIZE);
        assert!(encrypted.metadata.payload.ciphertext.is_empty());
        assert_eq!(encrypted.metadata.payload.nonce.len(), NONCE_SIZE);
        assert_eq!(
            encrypted.metadata.payload.salt.as_ref().map(Vec::len),
            Some(SALT_SIZE)
        );
        assert_eq!(encrypted.metadata.payload.algorithm, Algorithm::AesGcm);
    }

    #[test]
    fn test_progress_milestones() {
        let mut seen = Vec::new();
        let encrypted = cipher()
            .encrypt(&b"abc"[..], "pw", |p| seen.push(p))
            .unwrap();
        assert_eq!(seen, vec![0.1, 0.3, 0.8, 1.0]);

        let mut seen = Vec::new();
        cipher()
            .decrypt(encrypted.blob.as_slice(), &encrypted.metadata, "pw", |p| {
                seen.push(p)
            })
            .unwrap();
        assert_eq!(seen, vec![0.1, 0.3, 0.8, 1.0]);
    }

    #[test]
    fn test_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let encrypted = cipher().encrypt(data.as_slice(), "pw", |_| {}).unwrap();
        let decrypted = cipher()
            .decrypt(encrypted.blob.as_slice(), &encrypted.metadata, "pw", |_| {})
            .unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn test_empty_file() {
        let encrypted = cipher().encrypt(&b""[..], "pw", |_| {}).unwrap();
        assert_eq!(encrypted.blob.len(), TAG_SIZE);
        let decrypted = cipher()
            .decrypt(encrypted.blob.as_slice(), &encrypted.metadata, "pw", |_| {})
            .unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_wrong_password_stops_before_transform_milestone() {
        let encrypted = cipher().encrypt(&b"data"[..], "pw", |_| {}).unwrap();
        let mut seen = Vec::new();
        let result = cipher().decrypt(
            encrypted.blob.as_slice(),
            &encrypted.metadata,
            "other",
            |p| seen.push(p),
        );
        assert!(matches!(result, Err(Error::Authentication)));
        assert_eq!(seen, vec![0.1, 0.3]);
    }

    #[test]
    fn test_missing_salt() {
        let mut encrypted = cipher().encrypt(&b"data"[..], "pw", |_| {}).unwrap();
        encrypted.metadata.payload.salt = None;
        let result = cipher().decrypt(encrypted.blob.as_slice(), &encrypted.metadata, "pw", |_| {});
        assert!(matches!(result, Err(Error::MissingSalt)));
    }

    #[test]
    fn test_empty_password_fails_in_derivation() {
        let mut seen = Vec::new();
        let result = cipher().encrypt(&b"data"[..], "", |p| seen.push(p));
        assert!(matches!(result, Err(Error::Derivation(_))));
        assert_eq!(seen, vec![0.1]);
    }

    #[test]
    fn test_lookup_by_id() {
        let encrypted = cipher().encrypt(&b"paired"[..], "pw", |_| {}).unwrap();
        let mut index = MetadataIndex::new();
        index.insert(encrypted.metadata.clone());

        let decrypted = cipher()
            .decrypt_by_id(encrypted.blob.as_slice(), &encrypted.id(), &index, "pw", |_| {})
            .unwrap();
        assert_eq!(decrypted, b"paired");

        let unknown = Uuid::new_v4();
        let result =
            cipher().decrypt_by_id(encrypted.blob.as_slice(), &unknown, &index, "pw", |_| {});
        assert!(matches!(result, Err(Error::MissingMetadata(_))));
    }

    #[test]
    fn test_recorded_iterations_survive_a_raised_default() {
        let encrypted = cipher().encrypt(&b"old file"[..], "pw", |_| {}).unwrap();
        assert_eq!(encrypted.metadata.iterations, Some(1_000));

        let raised = FileCipher::new(KdfParams::with_iterations(2_000));
        let decrypted = raised
            .decrypt(encrypted.blob.as_slice(), &encrypted.metadata, "pw", |_| {})
            .unwrap();
        assert_eq!(decrypted, b"old file");
    }

    #[test]
    fn test_metadata_without_iterations_uses_configured_count() {
        let mut encrypted = cipher().encrypt(&b"legacy"[..], "pw", |_| {}).unwrap();
        encrypted.metadata.iterations = None;

        let json = encrypted.metadata.to_json().unwrap();
        assert!(!json.contains("iterations"));
        let metadata = FileMetadata::from_json(&json).unwrap();

        let decrypted = cipher()
            .decrypt(encrypted.blob.as_slice(), &metadata, "pw", |_| {})
            .unwrap();
        assert_eq!(decrypted, b"legacy");

        let raised = FileCipher::new(KdfParams::with_iterations(2_000));
        let result = raised.decrypt(encrypted.blob.as_slice(), &metadata, "pw", |_| {});
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_pairing_ids_are_unique() {
        let a = cipher().encrypt(&b"x"[..], "pw", |_| {}).unwrap();
        let b = cipher().encrypt(&b"x"[..], "pw", |_| {}).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.metadata.payload.salt, b.metadata.payload.salt);
    }

    #[test]
    fn test_metadata_json() {
        let encrypted = cipher()
            .encrypt(&b"x"[..], "pw", |_| {})
            .unwrap()
            .with_file_info(FileInfo {
                original_file_name: Some("report.pdf".to_string()),
                file_size: Some(1),
                mime_type: Some("application/pdf".to_string()),
            });

        let json = encrypted.metadata.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ciphertext"], "");
        assert_eq!(value["algorithm"], "AES-GCM");
        assert!(value["iv"].is_string());
        assert!(value["salt"].is_string());
        assert_eq!(value["id"], encrypted.id().to_string());
        assert_eq!(value["iterations"], 1_000);
        assert_eq!(value["file"]["originalFileName"], "report.pdf");

        let restored = FileMetadata::from_json(&json).unwrap();
        assert_eq!(restored, encrypted.metadata);
    }
}
