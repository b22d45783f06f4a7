//! AES-GCM Encryption Implementation
//!
//! All data is encrypted using AES-GCM which provides:
//! - Confidentiality: Data is encrypted
//! - Integrity: Any tampering is detected
//! - Authentication: Verifies the data came from the key holder
//!
//! A fresh 96-bit nonce is drawn from the OS generator for every call.

use crate::codec::{self, base64_serde, base64_serde_opt};
use crate::crypto::{random, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Cipher mode tag carried by every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "AES-GCM")]
    AesGcm,
    #[serde(rename = "AES-CBC")]
    AesCbc,
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::AesGcm => "AES-GCM",
            Algorithm::AesCbc => "AES-CBC",
            Algorithm::RsaOaep => "RSA-OAEP",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AES-GCM" => Ok(Algorithm::AesGcm),
            "AES-CBC" => Ok(Algorithm::AesCbc),
            "RSA-OAEP" => Ok(Algorithm::RsaOaep),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// AES key sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AesKeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl AesKeySize {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(AesKeySize::Aes128),
            192 => Ok(AesKeySize::Aes192),
            256 => Ok(AesKeySize::Aes256),
            other => Err(Error::UnsupportedAlgorithm(format!("AES-{}", other))),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            AesKeySize::Aes128 => 128,
            AesKeySize::Aes192 => 192,
            AesKeySize::Aes256 => 256,
        }
    }

    /// Key length in bytes
    pub fn byte_len(&self) -> usize {
        self.bits() as usize / 8
    }

    fn from_len(len: usize) -> Result<Self> {
        match len {
            16 => Ok(AesKeySize::Aes128),
            24 => Ok(AesKeySize::Aes192),
            32 => Ok(AesKeySize::Aes256),
            got => Err(Error::InvalidKeyLength {
                expected: "16, 24 or 32".to_string(),
                got,
            }),
        }
    }
}

impl Default for AesKeySize {
    fn default() -> Self {
        AesKeySize::Aes256
    }
}

impl TryFrom<u32> for AesKeySize {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        AesKeySize::from_bits(bits)
    }
}

impl From<AesKeySize> for u32 {
    fn from(size: AesKeySize) -> u32 {
        size.bits()
    }
}

/// Raw AES key material.
///
/// Not `Clone`; the bytes are wiped when the key is dropped.
pub struct SymmetricKey {
    bytes: Zeroizing<Vec<u8>>,
    size: AesKeySize,
}

impl SymmetricKey {
    /// Generate a random key of the given size
    pub fn generate(size: AesKeySize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; size.byte_len()]);
        random::fill(&mut bytes);
        SymmetricKey { bytes, size }
    }

    /// Wrap existing key bytes (16, 24 or 32 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let size = AesKeySize::from_len(bytes.len())?;
        Ok(SymmetricKey {
            bytes: Zeroizing::new(bytes.to_vec()),
            size,
        })
    }

    /// Import a raw key from base64
    pub fn import(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(codec::from_base64(encoded)?);
        Self::from_bytes(&bytes)
    }

    /// Export the raw key as base64
    pub fn export(&self) -> Zeroizing<String> {
        Zeroizing::new(codec::to_base64(&self.bytes))
    }

    pub fn size(&self) -> AesKeySize {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("size", &self.size)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Output of any symmetric encryption.
///
/// Serializes to `{ ciphertext, iv, salt?, algorithm }` with base64 fields.
/// `salt` is present only when the key was derived from a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Ciphertext with appended authentication tag; empty when carried out-of-band
    #[serde(with = "base64_serde")]
    pub ciphertext: Vec<u8>,
    /// Nonce used for encryption (unique per encryption)
    #[serde(rename = "iv", with = "base64_serde")]
    pub nonce: Vec<u8>,
    /// PBKDF2 salt
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_serde_opt"
    )]
    pub salt: Option<Vec<u8>>,
    pub algorithm: Algorithm,
}

impl EncryptedPayload {
    /// Copy of this payload with the ciphertext removed
    pub fn detached(&self) -> Self {
        EncryptedPayload {
            ciphertext: Vec::new(),
            nonce: self.nonce.clone(),
            salt: self.salt.clone(),
            algorithm: self.algorithm,
        }
    }

    /// Reattach out-of-band ciphertext to detached metadata
    pub fn with_ciphertext(&self, ciphertext: Vec<u8>) -> Self {
        EncryptedPayload {
            ciphertext,
            ..self.detached()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Encrypt `plaintext` under `key` with AES-GCM and a fresh random nonce.
///
/// The returned payload has no salt; [`crate::crypto::password`] fills it in.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedPayload> {
    let nonce: [u8; NONCE_SIZE] = random::bytes();
    let ciphertext = seal(key, &nonce, plaintext)?;

    Ok(EncryptedPayload {
        ciphertext,
        nonce: nonce.to_vec(),
        salt: None,
        algorithm: Algorithm::AesGcm,
    })
}

/// Decrypt a payload produced by [`encrypt`].
///
/// Any verification problem, including a malformed nonce or truncated
/// ciphertext, yields [`Error::Authentication`].
pub fn decrypt(payload: &EncryptedPayload, key: &SymmetricKey) -> Result<Vec<u8>> {
    if payload.algorithm != Algorithm::AesGcm {
        return Err(Error::UnsupportedAlgorithm(payload.algorithm.to_string()));
    }

    if payload.nonce.len() != NONCE_SIZE || payload.ciphertext.len() < TAG_SIZE {
        return Err(Error::Authentication);
    }

    open(key, &payload.nonce, &payload.ciphertext)
}

fn seal(key: &SymmetricKey, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::<U12>::from_slice(nonce);
    let result = match key.size() {
        AesKeySize::Aes128 => cipher::<Aes128Gcm>(key)?.encrypt(nonce, plaintext),
        AesKeySize::Aes192 => cipher::<Aes192Gcm>(key)?.encrypt(nonce, plaintext),
        AesKeySize::Aes256 => cipher::<Aes256Gcm>(key)?.encrypt(nonce, plaintext),
    };
    result.map_err(|_| Error::Encryption("Encryption failed".to_string()))
}

fn open(key: &SymmetricKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::<U12>::from_slice(nonce);
    let result = match key.size() {
        AesKeySize::Aes128 => cipher::<Aes128Gcm>(key)?.decrypt(nonce, ciphertext),
        AesKeySize::Aes192 => cipher::<Aes192Gcm>(key)?.decrypt(nonce, ciphertext),
        AesKeySize::Aes256 => cipher::<Aes256Gcm>(key)?.decrypt(nonce, ciphertext),
    };
    result.map_err(|_| Error::Authentication)
}

fn cipher<C: KeyInit>(key: &SymmetricKey) -> Result<C> {
    C::new_from_slice(key.as_bytes()).map_err(|_| Error::InvalidKeyLength {
        expected: key.size().byte_len().to_string(),
        got: key.as_bytes().len(),
    })
}
