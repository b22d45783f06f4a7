//! Record shapes exchanged with the storage API
//!
//! The engine never talks to storage itself; these are the values it hands
//! over and accepts back. Field names follow the JSON the storage API uses.

use crate::codec;
use crate::crypto::asymmetric::{KeyPairMaterial, RsaKeySize};
use crate::crypto::kdf::KdfParams;
use crate::crypto::password::{decrypt_with_password, encrypt_with_password};
use crate::crypto::symmetric::EncryptedPayload;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an encrypted record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Text,
    File,
    Rsa,
}

/// Descriptive information about an encrypted file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A named encrypted artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub data: EncryptedPayload,
    /// PBKDF2 iteration count for password-derived `data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileInfo>,
    pub created_at: DateTime<Utc>,
}

impl EncryptedRecord {
    pub fn new(name: &str, kind: RecordKind, data: EncryptedPayload) -> Result<Self> {
        Ok(EncryptedRecord {
            name: validate_name(name)?,
            kind,
            data,
            iterations: None,
            metadata: None,
            created_at: Utc::now(),
        })
    }

    /// Record the iteration count `data` was derived with
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_metadata(mut self, metadata: FileInfo) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A key pair whose private half is protected by a password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedKeyPair {
    pub name: String,
    pub public_key: String,
    pub encrypted_private_key: EncryptedPayload,
    pub key_size: RsaKeySize,
    /// PBKDF2 iteration count the private key was sealed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl SealedKeyPair {
    /// Encrypt the private key of `material` under `password`
    pub fn seal(
        name: &str,
        material: &KeyPairMaterial,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self> {
        let name = validate_name(name)?;
        let encrypted_private_key =
            encrypt_with_password(material.private_key.as_bytes(), password, None, params)?;

        Ok(SealedKeyPair {
            name,
            public_key: material.public_key.clone(),
            encrypted_private_key,
            key_size: material.key_size,
            iterations: Some(params.iterations),
            created_at: Utc::now(),
        })
    }

    /// Recover the full key pair, using the recorded iteration count when present
    pub fn open(&self, password: &str, params: &KdfParams) -> Result<KeyPairMaterial> {
        let params = params.for_recorded(self.iterations);
        let private_key = decrypt_with_password(&self.encrypted_private_key, password, &params)?;
        let private_key = codec::bytes_to_text(private_key)?;

        Ok(KeyPairMaterial {
            public_key: self.public_key.clone(),
            private_key,
            key_size: self.key_size,
        })
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRecord("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}
