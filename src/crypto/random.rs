//! Cryptographically secure randomness
//!
//! All key material, nonces and salts are drawn from the operating system
//! generator. Non-secret identifiers (pairing ids) are produced elsewhere
//! with `uuid` and never through this module.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use zeroize::Zeroizing;

/// Characters used by [`generate_password`]
pub const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()_+";

/// Default length of a generated password
pub const DEFAULT_PASSWORD_LEN: usize = 16;

/// Fill `buf` with OS randomness
pub fn fill(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// Fixed-size array of OS randomness
pub fn bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    fill(&mut out);
    out
}

/// Random password drawn uniformly from [`PASSWORD_ALPHABET`]
pub fn generate_password(len: usize) -> Zeroizing<String> {
    let mut password = Zeroizing::new(String::with_capacity(len));
    for _ in 0..len {
        let idx = OsRng.gen_range(0..PASSWORD_ALPHABET.len());
        password.push(PASSWORD_ALPHABET[idx] as char);
    }
    password
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_differ() {
        let a: [u8; 16] = bytes();
        let b: [u8; 16] = bytes();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_password() {
        let password = generate_password(DEFAULT_PASSWORD_LEN);
        assert_eq!(password.len(), DEFAULT_PASSWORD_LEN);
        assert!(password.bytes().all(|c| PASSWORD_ALPHABET.contains(&c)));
    }

    #[test]
    fn test_generate_password_empty() {
        assert!(generate_password(0).is_empty());
    }
}
