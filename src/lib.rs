//! lockbox - Client-side encryption engine
//!
//! Password-based and key-based encryption of text, files and key material.
//! Everything here works on values handed in by the caller; persistence of
//! the resulting records is left to the caller's storage layer.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod file;
pub mod records;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crypto::{
        AesKeySize, EncryptedPayload, HashAlgorithm, KdfParams, KeyPairMaterial, RsaKeySize,
        SymmetricKey,
    };
    pub use crate::engine::Engine;
    pub use crate::error::{Error, Result};
    pub use crate::file::{EncryptedFile, FileMetadata, MetadataIndex, MetadataLookup};
    pub use crate::records::{EncryptedRecord, FileInfo, RecordKind, SealedKeyPair};
}
