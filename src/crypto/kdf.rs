//! Password-based key derivation (PBKDF2-HMAC-SHA256)
//!
//! Derivation is deterministic for a given `(password, salt, iterations)`;
//! decryption must reuse the salt stored in the payload and the iteration
//! count the data was encrypted with.

use crate::crypto::random;
use crate::crypto::symmetric::SymmetricKey;
use crate::crypto::{DEFAULT_ITERATIONS, KEY_SIZE, SALT_SIZE};
use crate::error::{Error, Result};
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use tracing::warn;
use zeroize::Zeroizing;

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Iteration count
    pub iterations: u32,
    /// Counts below this are accepted but logged as weak
    pub min_recommended_iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            iterations: DEFAULT_ITERATIONS,
            min_recommended_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn with_iterations(iterations: u32) -> Self {
        KdfParams {
            iterations,
            ..Default::default()
        }
    }

    /// True when the iteration count is under the recommended floor
    pub fn is_weak(&self) -> bool {
        self.iterations < self.min_recommended_iterations
    }

    /// Parameters for decrypting data that recorded its own iteration count.
    ///
    /// Falls back to the configured count when nothing was recorded.
    pub fn for_recorded(&self, recorded: Option<u32>) -> Self {
        KdfParams {
            iterations: recorded.unwrap_or(self.iterations),
            ..*self
        }
    }
}

/// A 256-bit key together with the salt that produced it.
///
/// Lives only for the duration of one operation and is never serialized.
pub struct DerivedKey {
    key: SymmetricKey,
    salt: Vec<u8>,
}

impl DerivedKey {
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("salt", &hex::encode(&self.salt))
            .finish()
    }
}

/// Derive an AES-256 key from a password.
///
/// When `salt` is `None` a fresh 16-byte salt is generated. Fails with
/// [`Error::Derivation`] on an empty password or zero iterations.
pub fn derive_key(password: &str, salt: Option<&[u8]>, iterations: u32) -> Result<DerivedKey> {
    derive_key_with(
        password,
        salt,
        &KdfParams {
            iterations,
            ..Default::default()
        },
    )
}

/// [`derive_key`] with explicit parameters
pub fn derive_key_with(
    password: &str,
    salt: Option<&[u8]>,
    params: &KdfParams,
) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::Derivation("password must not be empty".to_string()));
    }

    let iterations = NonZeroU32::new(params.iterations)
        .ok_or_else(|| Error::Derivation("iteration count must be positive".to_string()))?;

    if params.is_weak() {
        warn!(
            iterations = params.iterations,
            recommended = params.min_recommended_iterations,
            "PBKDF2 iteration count is below the recommended default"
        );
    }

    let salt = match salt {
        Some(s) => s.to_vec(),
        None => {
            let mut s = vec![0u8; SALT_SIZE];
            random::fill(&mut s);
            s
        }
    };

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        key.as_mut(),
    );

    Ok(DerivedKey {
        key: SymmetricKey::from_bytes(key.as_ref())?,
        salt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn test_derive_generates_salt() {
        let derived = derive_key("password", None, FAST).unwrap();
        assert_eq!(derived.salt().len(), SALT_SIZE);
        assert_eq!(derived.key().as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn test_derive_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let a = derive_key("password", Some(&salt), FAST).unwrap();
        let b = derive_key("password", Some(&salt), FAST).unwrap();
        assert_eq!(a.key().as_bytes(), b.key().as_bytes());
        assert_eq!(a.salt(), &salt);
    }

    #[test]
    fn test_salt_and_iterations_change_key() {
        let salt = [7u8; SALT_SIZE];
        let base = derive_key("password", Some(&salt), FAST).unwrap();
        let other_salt = derive_key("password", Some(&[8u8; SALT_SIZE]), FAST).unwrap();
        let other_iter = derive_key("password", Some(&salt), FAST + 1).unwrap();
        assert_ne!(base.key().as_bytes(), other_salt.key().as_bytes());
        assert_ne!(base.key().as_bytes(), other_iter.key().as_bytes());
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 vector, first 32 bytes
        let derived = derive_key("passwd", Some(b"salt"), 1).unwrap();
        assert_eq!(
            hex::encode(derived.key().as_bytes()),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            derive_key("", None, FAST),
            Err(Error::Derivation(_))
        ));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            derive_key("password", None, 0),
            Err(Error::Derivation(_))
        ));
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.iterations, 100_000);
        assert!(!params.is_weak());
        assert!(KdfParams::with_iterations(10).is_weak());
    }

    #[test]
    fn test_generated_salt_is_always_wire_size() {
        let derived = derive_key_with("password", None, &KdfParams::with_iterations(FAST)).unwrap();
        assert_eq!(derived.salt().len(), SALT_SIZE);
    }

    #[test]
    fn test_for_recorded_prefers_recorded_count() {
        let configured = KdfParams::with_iterations(2_000);
        assert_eq!(configured.for_recorded(Some(1_000)).iterations, 1_000);
        assert_eq!(configured.for_recorded(None).iterations, 2_000);
        assert_eq!(
            configured.for_recorded(Some(1_000)).min_recommended_iterations,
            configured.min_recommended_iterations
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let derived = derive_key("password", None, FAST).unwrap();
        assert!(format!("{:?}", derived).contains("[REDACTED]"));
    }
}
