//! Password-based encryption: PBKDF2 key derivation composed with AES-GCM

use crate::crypto::kdf::{derive_key_with, KdfParams};
use crate::crypto::symmetric::{self, EncryptedPayload};
use crate::error::{Error, Result};

/// Encrypt `data` under a key derived from `password`.
///
/// A fresh salt is generated unless one is supplied. The returned payload
/// always carries the salt.
pub fn encrypt_with_password(
    data: &[u8],
    password: &str,
    salt: Option<&[u8]>,
    params: &KdfParams,
) -> Result<EncryptedPayload> {
    let derived = derive_key_with(password, salt, params)?;
    let mut payload = symmetric::encrypt(data, derived.key())?;
    payload.salt = Some(derived.salt().to_vec());
    Ok(payload)
}

/// Decrypt a password-encrypted payload.
///
/// Fails with [`Error::MissingSalt`] without attempting derivation when the
/// payload has no salt.
pub fn decrypt_with_password(
    payload: &EncryptedPayload,
    password: &str,
    params: &KdfParams,
) -> Result<Vec<u8>> {
    let salt = payload.salt.as_deref().ok_or(Error::MissingSalt)?;
    let derived = derive_key_with(password, Some(salt), params)?;
    symmetric::decrypt(payload, derived.key())
}
