//! Engine facade
//!
//! Bundles the configured parameters and exposes every operation over
//! explicit key-material values. Key handles are imported inside each call
//! and dropped (and wiped) before it returns.

use crate::codec;
use crate::config::Config;
use crate::crypto::asymmetric::{self, KeyPairMaterial, PrivateKey, PublicKey, RsaKeySize};
use crate::crypto::hash::{self, HashAlgorithm};
use crate::crypto::kdf::{self, DerivedKey, KdfParams};
use crate::crypto::password;
use crate::crypto::symmetric::{self, AesKeySize, EncryptedPayload, SymmetricKey};
use crate::error::{Error, Result};
use crate::file::{EncryptedFile, FileCipher, FileMetadata, MetadataLookup};
use crate::records::{EncryptedRecord, RecordKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Progress events from an offloaded file operation
pub type ProgressReceiver = mpsc::UnboundedReceiver<f64>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    kdf: KdfParams,
    aes_key_size: AesKeySize,
    rsa_key_size: RsaKeySize,
    hash_algorithm: HashAlgorithm,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Engine {
            kdf: config.kdf_params(),
            aes_key_size: config.symmetric.key_size,
            rsa_key_size: config.asymmetric.key_size,
            hash_algorithm: config.hash.algorithm,
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    // Key derivation

    pub fn derive_key(&self, password: &str, salt: Option<&[u8]>) -> Result<DerivedKey> {
        kdf::derive_key_with(password, salt, &self.kdf)
    }

    // Symmetric

    /// Random AES key of the configured size
    pub fn generate_symmetric_key(&self) -> SymmetricKey {
        SymmetricKey::generate(self.aes_key_size)
    }

    pub fn encrypt(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedPayload> {
        symmetric::encrypt(plaintext, key)
    }

    pub fn decrypt(&self, payload: &EncryptedPayload, key: &SymmetricKey) -> Result<Vec<u8>> {
        symmetric::decrypt(payload, key)
    }

    // Password-based

    pub fn encrypt_with_password(
        &self,
        data: &[u8],
        password: &str,
        salt: Option<&[u8]>,
    ) -> Result<EncryptedPayload> {
        password::encrypt_with_password(data, password, salt, &self.kdf)
    }

    pub fn decrypt_with_password(
        &self,
        payload: &EncryptedPayload,
        password: &str,
    ) -> Result<Vec<u8>> {
        password::decrypt_with_password(payload, password, &self.kdf)
    }

    pub fn encrypt_text(&self, text: &str, password: &str) -> Result<EncryptedPayload> {
        self.encrypt_with_password(&codec::text_to_bytes(text), password, None)
    }

    pub fn decrypt_text(&self, payload: &EncryptedPayload, password: &str) -> Result<String> {
        codec::bytes_to_text(self.decrypt_with_password(payload, password)?)
    }

    /// Encrypt text into a named record that carries its iteration count
    pub fn encrypt_text_record(
        &self,
        name: &str,
        text: &str,
        password: &str,
    ) -> Result<EncryptedRecord> {
        let payload = self.encrypt_text(text, password)?;
        Ok(EncryptedRecord::new(name, RecordKind::Text, payload)?
            .with_iterations(self.kdf.iterations))
    }

    /// Decrypt a text record with the iteration count it recorded, if any
    pub fn decrypt_text_record(&self, record: &EncryptedRecord, password: &str) -> Result<String> {
        let params = self.kdf.for_recorded(record.iterations);
        let plaintext = password::decrypt_with_password(&record.data, password, &params)?;
        codec::bytes_to_text(plaintext)
    }

    // Asymmetric

    /// Generate a key pair; `None` uses the configured size
    pub fn generate_key_pair(&self, size: Option<RsaKeySize>) -> Result<KeyPairMaterial> {
        asymmetric::generate_key_pair(size.unwrap_or(self.rsa_key_size))
    }

    /// Encrypt text to a PEM public key, returning base64 ciphertext
    pub fn rsa_encrypt(&self, plaintext: &str, public_key_pem: &str) -> Result<String> {
        let public = PublicKey::from_pem(public_key_pem)?;
        asymmetric::encrypt(plaintext, &public)
    }

    /// Decrypt base64 ciphertext with a PEM private key
    pub fn rsa_decrypt(&self, ciphertext: &str, private_key_pem: &str) -> Result<String> {
        let private = PrivateKey::from_pem(private_key_pem)?;
        asymmetric::decrypt(ciphertext, &private)
    }

    // Hashing

    /// Base64 digest with the configured algorithm
    pub fn hash(&self, data: &str) -> String {
        hash::hash(data, self.hash_algorithm)
    }

    pub fn hash_with(&self, data: &str, algorithm: &str) -> Result<String> {
        hash::hash_named(data, algorithm)
    }

    // Files

    pub fn file_cipher(&self) -> FileCipher {
        FileCipher::new(self.kdf)
    }

    pub fn encrypt_file<P: FnMut(f64)>(
        &self,
        data: &[u8],
        password: &str,
        on_progress: P,
    ) -> Result<EncryptedFile> {
        self.file_cipher().encrypt(data, password, on_progress)
    }

    pub fn decrypt_file<P: FnMut(f64)>(
        &self,
        blob: &[u8],
        metadata: &FileMetadata,
        password: &str,
        on_progress: P,
    ) -> Result<Vec<u8>> {
        self.file_cipher().decrypt(blob, metadata, password, on_progress)
    }

    pub fn decrypt_file_by_id<L, P>(
        &self,
        blob: &[u8],
        id: &Uuid,
        lookup: &L,
        password: &str,
        on_progress: P,
    ) -> Result<Vec<u8>>
    where
        L: MetadataLookup + ?Sized,
        P: FnMut(f64),
    {
        self.file_cipher()
            .decrypt_by_id(blob, id, lookup, password, on_progress)
    }

    // Offloaded variants; must be called from within a Tokio runtime

    /// Encrypt on a blocking worker, streaming progress in call order
    pub fn encrypt_file_task(
        &self,
        data: Vec<u8>,
        password: Zeroizing<String>,
    ) -> (JoinHandle<Result<EncryptedFile>>, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cipher = self.file_cipher();
        let data = Zeroizing::new(data);
        let handle = tokio::task::spawn_blocking(move || {
            cipher.encrypt(data.as_slice(), &password, |p| {
                let _ = tx.send(p);
            })
        });
        (handle, rx)
    }

    /// Decrypt on a blocking worker, streaming progress in call order
    pub fn decrypt_file_task(
        &self,
        blob: Vec<u8>,
        metadata: FileMetadata,
        password: Zeroizing<String>,
    ) -> (JoinHandle<Result<Vec<u8>>>, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cipher = self.file_cipher();
        let handle = tokio::task::spawn_blocking(move || {
            cipher.decrypt(blob.as_slice(), &metadata, &password, |p| {
                let _ = tx.send(p);
            })
        });
        (handle, rx)
    }

    /// Generate a key pair on a blocking worker
    pub async fn generate_key_pair_async(
        &self,
        size: Option<RsaKeySize>,
    ) -> Result<KeyPairMaterial> {
        let size = size.unwrap_or(self.rsa_key_size);
        tokio::task::spawn_blocking(move || asymmetric::generate_key_pair(size))
            .await
            .map_err(|e| Error::Internal(format!("key generation task failed: {}", e)))?
    }
}
