//! BIP32 key origin data as it appears in PSBT derivation fields.
//!
//! Only the wire representation is modeled here (master fingerprint plus a
//! path of child numbers); key derivation itself is out of scope.

use crate::{PsbtError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BIP32_HARDENED_KEY_LIMIT: u32 = 0x80000000;

/// Key fingerprint (first 4 bytes of HASH160 of the master public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 4]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Builds a fingerprint from the leading 4 bytes of a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = bytes
            .get(0..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                PsbtError::InvalidValue("fingerprint requires 4 bytes".to_string())
            })?;
        Ok(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Derivation path for BIP32 key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationPath {
    path: Vec<u32>,
}

impl DerivationPath {
    pub fn new(path: Vec<u32>) -> Self {
        DerivationPath { path }
    }

    /// Master path (empty).
    pub fn master() -> Self {
        DerivationPath { path: Vec::new() }
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    pub fn is_hardened(child_number: u32) -> bool {
        child_number >= BIP32_HARDENED_KEY_LIMIT
    }

    pub fn hardened(index: u32) -> u32 {
        index + BIP32_HARDENED_KEY_LIMIT
    }

    pub fn depth(&self) -> u8 {
        self.path.len() as u8
    }

    pub fn child(&self, child_number: u32) -> DerivationPath {
        let mut new_path = self.path.clone();
        new_path.push(child_number);
        DerivationPath::new(new_path)
    }
}

impl FromStr for DerivationPath {
    type Err = PsbtError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "m" {
            return Ok(DerivationPath::master());
        }

        if !s.starts_with("m/") {
            return Err(PsbtError::InvalidValue(
                "derivation path must start with 'm' or 'm/'".to_string(),
            ));
        }

        let path_str = &s[2..];
        if path_str.is_empty() {
            return Ok(DerivationPath::master());
        }

        let mut path = Vec::new();
        for component in path_str.split('/') {
            if component.is_empty() {
                return Err(PsbtError::InvalidValue(
                    "empty derivation path component".to_string(),
                ));
            }

            let (index_str, is_hardened) = if component.ends_with('\'') || component.ends_with('h')
            {
                (&component[..component.len() - 1], true)
            } else {
                (component, false)
            };

            let index: u32 = index_str.parse().map_err(|_| {
                PsbtError::InvalidValue(format!("invalid path component: {}", component))
            })?;

            if index >= BIP32_HARDENED_KEY_LIMIT {
                return Err(PsbtError::InvalidValue(format!(
                    "path component index too large: {}",
                    index
                )));
            }

            path.push(if is_hardened {
                DerivationPath::hardened(index)
            } else {
                index
            });
        }

        Ok(DerivationPath::new(path))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &child_number in &self.path {
            if DerivationPath::is_hardened(child_number) {
                write!(f, "/{}'", child_number - BIP32_HARDENED_KEY_LIMIT)?;
            } else {
                write!(f, "/{}", child_number)?;
            }
        }
        Ok(())
    }
}

/// Decodes the PSBT key-origin value layout: a 4-byte master fingerprint
/// followed by zero or more u32 little-endian child numbers.
pub fn decode_key_source(value: &[u8]) -> Result<(Fingerprint, DerivationPath)> {
    if value.len() < 4 || value.len() % 4 != 0 {
        return Err(PsbtError::InvalidValue(format!(
            "key origin value must be a fingerprint plus whole u32 path elements, got {} bytes",
            value.len()
        )));
    }

    let fingerprint = Fingerprint::from_slice(&value[0..4])?;
    let path = value[4..]
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok((fingerprint, DerivationPath::new(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_string_roundtrip() {
        let path = DerivationPath::from_str("m/44'/0'/0'/0/5").unwrap();
        assert_eq!(path.depth(), 5);
        assert_eq!(path.path()[0], DerivationPath::hardened(44));
        assert_eq!(path.path()[4], 5);
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/5");
    }

    #[test]
    fn master_path() {
        assert_eq!(DerivationPath::from_str("m").unwrap(), DerivationPath::master());
        assert_eq!(DerivationPath::master().to_string(), "m");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(DerivationPath::from_str("44'/0'").is_err());
        assert!(DerivationPath::from_str("m/x").is_err());
        assert!(DerivationPath::from_str("m//1").is_err());
    }

    #[test]
    fn key_source_layout() {
        let mut value = vec![0xde, 0xad, 0xbe, 0xef];
        value.extend_from_slice(&44u32.to_le_bytes());
        value.extend_from_slice(&1u32.to_le_bytes());
        let (fingerprint, path) = decode_key_source(&value).unwrap();
        assert_eq!(fingerprint, Fingerprint([0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(path.path(), &[44, 1]);
    }

    #[test]
    fn key_source_rejects_bad_lengths() {
        assert!(decode_key_source(&[1, 2, 3]).is_err());
        assert!(decode_key_source(&[1, 2, 3, 4, 5]).is_err());
        // A bare fingerprint with an empty path is valid.
        assert!(decode_key_source(&[1, 2, 3, 4]).is_ok());
    }
}
