//! Base64 and UTF-8 conversions
//!
//! Every binary field that crosses the engine boundary travels as standard
//! (padded) base64. Text is always UTF-8.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Encode bytes as standard base64
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 into bytes
pub fn from_base64(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim())?)
}

/// UTF-8 text to bytes
pub fn text_to_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Bytes to UTF-8 text, failing on invalid sequences
pub fn bytes_to_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(Error::from)
}

/// Serde adapter storing `Vec<u8>` as a base64 string
pub mod base64_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Vec::new());
        }
        super::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for an optional base64 field, omitted when `None`
pub mod base64_serde_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&super::to_base64(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) if !s.is_empty() => super::from_base64(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_known_value() {
        assert_eq!(to_base64(b"hello"), "aGVsbG8=");
        assert_eq!(from_base64("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_base64_ignores_surrounding_whitespace() {
        assert_eq!(from_base64("  aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(from_base64("not base64!"), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_text_roundtrip_multibyte() {
        let text = "clé secrète ✓";
        assert_eq!(bytes_to_text(text_to_bytes(text)).unwrap(), text);
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(
            bytes_to_text(vec![0xff, 0xfe]),
            Err(Error::Encoding(_))
        ));
    }
}
