//! SHA-2 digests

use crate::codec;
use crate::error::{Error, Result};
use ring::digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        self.ring_algorithm().output_len()
    }

    fn ring_algorithm(&self) -> &'static digest::Algorithm {
        match self {
            HashAlgorithm::Sha256 => &digest::SHA256,
            HashAlgorithm::Sha384 => &digest::SHA384,
            HashAlgorithm::Sha512 => &digest::SHA512,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA-384" | "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA-512" | "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Raw digest of `data`
pub fn digest(data: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    digest::digest(algorithm.ring_algorithm(), data)
        .as_ref()
        .to_vec()
}

/// Digest of UTF-8 `data`, base64-encoded
pub fn hash(data: &str, algorithm: HashAlgorithm) -> String {
    codec::to_base64(&digest(data.as_bytes(), algorithm))
}

/// [`hash`] with the algorithm given by name, e.g. `"SHA-384"`
pub fn hash_named(data: &str, algorithm: &str) -> Result<String> {
    Ok(hash(data, algorithm.parse()?))
}

/// Digest of UTF-8 `data`, hex-encoded
pub fn hash_hex(data: &str, algorithm: HashAlgorithm) -> String {
    hex::encode(digest(data.as_bytes(), algorithm))
}
