//! Error types for lockbox

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lockbox
#[derive(Error, Debug)]
pub enum Error {
    // Key derivation errors
    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Salt is required for password-based decryption")]
    MissingSalt,

    // Symmetric errors
    #[error("Decryption failed - data corrupted or wrong key")]
    Authentication,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: String, got: usize },

    // Asymmetric errors
    #[error("Key generation error: {0}")]
    KeyGen(String),

    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    #[error("Payload too large: {len} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Decryption error: {0}")]
    Decryption(String),

    // Algorithm selection
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // File pipeline errors
    #[error("Encryption metadata not found: {0}")]
    MissingMetadata(String),

    // Record errors
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // Codec errors
    #[error("Encoding error: {0}")]
    Encoding(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Text safe to show an end user.
    ///
    /// Wrong passwords and corrupted ciphertext collapse into the same message,
    /// and internal details are never included.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Authentication | Error::Decryption(_) => {
                "Decryption failed. Check the password or key and try again."
            }
            Error::Derivation(_) => "Key derivation failed. Check the password and parameters.",
            Error::MissingSalt => "The encrypted data is missing its salt.",
            Error::MissingMetadata(_) => {
                "Encryption metadata not found. Please provide the original encryption metadata."
            }
            Error::PayloadTooLarge { .. } => "The text is too long for this key size.",
            Error::KeyFormat(_) | Error::InvalidKeyLength { .. } => "The key is not valid.",
            Error::KeyGen(_) => "Key generation failed.",
            Error::UnsupportedAlgorithm(_) => "This algorithm is not supported.",
            Error::Encoding(_) => "The input is not correctly encoded.",
            Error::InvalidRecord(_) => "The record is not valid.",
            Error::Config(_) | Error::InvalidConfig(_) => "The configuration is not valid.",
            Error::Io(_) => "A file could not be read or written.",
            Error::Encryption(_) | Error::Serialization(_) | Error::Internal(_) => {
                "An internal error occurred."
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::Encoding(e.to_string())
    }
}
