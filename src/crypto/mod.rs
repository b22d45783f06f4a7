//! Cryptography module for lockbox
//!
//! Provides PBKDF2-HMAC-SHA256 key derivation, AES-GCM authenticated
//! encryption, RSA-OAEP (SHA-256) single-block encryption and SHA-2 digests.
//! Primitives come from `ring`, `aes-gcm` and `rsa`; this module only
//! composes them and fixes the data format.

pub mod asymmetric;
pub mod hash;
pub mod kdf;
pub mod password;
pub mod random;
pub mod symmetric;

pub use asymmetric::{KeyPairMaterial, PrivateKey, PublicKey, RsaKeySize};
pub use hash::HashAlgorithm;
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use password::{decrypt_with_password, encrypt_with_password};
pub use symmetric::{decrypt, encrypt, AesKeySize, Algorithm, EncryptedPayload, SymmetricKey};

/// Size of the key produced by password derivation (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of a freshly generated salt for key derivation
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;
