//! Bitcoin script byte sequences.
//!
//! The decoder treats scripts as opaque payloads; no parsing or execution
//! happens here.

use super::encode::{read_compact_size, write_compact_size, Decodable, Encodable, MAX_VEC_SIZE};
use crate::{PsbtError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Script(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Encodable for Script {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = write_compact_size(writer, self.0.len() as u64)?;
        written += writer.write(&self.0)?;
        Ok(written)
    }
}

impl Decodable for Script {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_compact_size(reader)?;
        if len > MAX_VEC_SIZE {
            return Err(PsbtError::InvalidValue(format!(
                "declared script length {} exceeds limit",
                len
            )));
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf)?;
        Ok(Script(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_codec_roundtrip() {
        let script = Script::from_bytes(vec![0x76, 0xa9, 0x14, 0x00, 0x01]);
        let encoded = script.consensus_encode_to_vec().unwrap();
        assert_eq!(encoded[0], 5);
        assert_eq!(Script::consensus_decode_from_slice(&encoded).unwrap(), script);
    }

    #[test]
    fn empty_script_display() {
        assert_eq!(Script::new().to_string(), "");
        assert!(Script::new().is_empty());
    }
}
