//! Configuration management for lockbox

use crate::crypto::asymmetric::RsaKeySize;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::kdf::KdfParams;
use crate::crypto::symmetric::AesKeySize;
use crate::crypto::DEFAULT_ITERATIONS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key derivation configuration.
///
/// Salts are always 16 bytes; unknown keys are rejected so a stale
/// `salt_len` entry cannot silently change the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdfConfig {
    /// PBKDF2 iteration count for new data. Files and sealed key pairs
    /// record the count they were encrypted with and decrypt with that one;
    /// bare text payloads carry no count and fall back to this value.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Iteration counts below this are accepted with a warning
    #[serde(default = "default_iterations")]
    pub min_recommended_iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// Symmetric cipher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymmetricConfig {
    /// AES key size in bits for generated raw keys (128, 192 or 256)
    #[serde(rename = "key_bits")]
    pub key_size: AesKeySize,
}

/// Asymmetric cipher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsymmetricConfig {
    /// RSA modulus size in bits (1024, 2048 or 4096)
    pub key_size: RsaKeySize,
}

/// Hash configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashConfig {
    pub algorithm: HashAlgorithm,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kdf: KdfConfig,

    #[serde(default)]
    pub symmetric: SymmetricConfig,

    #[serde(default)]
    pub asymmetric: AsymmetricConfig,

    #[serde(default)]
    pub hash: HashConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for KdfConfig {
    fn default() -> Self {
        KdfConfig {
            iterations: DEFAULT_ITERATIONS,
            min_recommended_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockbox")
            .join("config.json")
    }

    /// Load configuration from a file, with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("Failed to read config file: {}", e))
        })?;

        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(iterations) = std::env::var("LOCKBOX_KDF_ITERATIONS") {
            if let Ok(n) = iterations.trim().parse::<u32>() {
                self.kdf.iterations = n;
            }
        }

        if let Ok(bits) = std::env::var("LOCKBOX_RSA_KEY_SIZE") {
            match bits.trim().parse::<u32>().map(RsaKeySize::from_bits) {
                Ok(Ok(size)) => self.asymmetric.key_size = size,
                _ => warn!("Ignoring invalid LOCKBOX_RSA_KEY_SIZE={}", bits),
            }
        }

        if let Ok(level) = std::env::var("LOCKBOX_LOG_LEVEL") {
            let level = level.trim().to_string();
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            Error::Config(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path.as_ref(), content).map_err(|e| {
            Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.kdf.iterations == 0 {
            return Err(Error::InvalidConfig(
                "KDF iterations must be greater than 0".to_string(),
            ));
        }

        if self.kdf.iterations < self.kdf.min_recommended_iterations {
            warn!(
                "KDF iterations ({}) below the recommended {}; passwords are easier to guess",
                self.kdf.iterations, self.kdf.min_recommended_iterations
            );
        }

        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(Error::InvalidConfig(format!("Unknown log level: {}", other)));
            }
        }

        Ok(())
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf.iterations,
            min_recommended_iterations: self.kdf.min_recommended_iterations,
        }
    }
}
