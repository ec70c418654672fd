//! Bitcoin transaction data structures.

use super::encode::{read_compact_size, Decodable, Encodable};
use super::script::Script;
use crate::{PsbtError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// A witness stack: zero or more byte pushes per input.
pub type Witness = Vec<Vec<u8>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        OutPoint { txid, vout }
    }
}

impl Encodable for OutPoint {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.txid.consensus_encode(writer)?;
        written += self.vout.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for OutPoint {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(OutPoint {
            txid: <[u8; 32]>::consensus_decode(reader)?,
            vout: u32::consensus_decode(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Witness,
}

impl TxIn {
    pub fn new(previous_output: OutPoint, script_sig: Script, sequence: u32) -> Self {
        TxIn {
            previous_output,
            script_sig,
            sequence,
            witness: Vec::new(),
        }
    }
}

// The witness stack is serialized at the transaction level, not here.
impl Encodable for TxIn {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.previous_output.consensus_encode(writer)?;
        written += self.script_sig.consensus_encode(writer)?;
        written += self.sequence.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for TxIn {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxIn {
            previous_output: OutPoint::consensus_decode(reader)?,
            script_sig: Script::consensus_decode(reader)?,
            sequence: u32::consensus_decode(reader)?,
            witness: Vec::new(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Script) -> Self {
        TxOut {
            value,
            script_pubkey,
        }
    }
}

impl Encodable for TxOut {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.value.consensus_encode(writer)?;
        written += self.script_pubkey.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for TxOut {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(TxOut {
            value: u64::consensus_decode(reader)?,
            script_pubkey: Script::consensus_decode(reader)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub lock_time: u32,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.input.iter().any(|txin| !txin.witness.is_empty())
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = self.version.consensus_encode(writer)?;
        if self.has_witness() {
            // Segwit marker and flag.
            written += writer.write(&[0x00, 0x01])?;
            written += self.input.consensus_encode(writer)?;
            written += self.output.consensus_encode(writer)?;
            for txin in &self.input {
                written += txin.witness.consensus_encode(writer)?;
            }
        } else {
            written += self.input.consensus_encode(writer)?;
            written += self.output.consensus_encode(writer)?;
        }
        written += self.lock_time.consensus_encode(writer)?;
        Ok(written)
    }
}

impl Decodable for Transaction {
    fn consensus_decode<R: Read>(reader: &mut R) -> Result<Self> {
        let version = i32::consensus_decode(reader)?;
        let input_count = read_compact_size(reader)?;

        // A zero input count marks a segwit serialization; the next byte is
        // the flag and the real input vector follows.
        let (mut input, output, segwit) = if input_count == 0 {
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag)?;
            let flag = flag[0];
            if flag != 0x01 {
                return Err(PsbtError::InvalidValue(format!(
                    "unsupported segwit flag {:#04x}",
                    flag
                )));
            }
            let input = Vec::<TxIn>::consensus_decode(reader)?;
            let output = Vec::<TxOut>::consensus_decode(reader)?;
            (input, output, true)
        } else {
            let mut input = Vec::new();
            for _ in 0..input_count {
                input.push(TxIn::consensus_decode(reader)?);
            }
            let output = Vec::<TxOut>::consensus_decode(reader)?;
            (input, output, false)
        };

        if segwit {
            for txin in &mut input {
                txin.witness = Witness::consensus_decode(reader)?;
            }
        }

        let lock_time = u32::consensus_decode(reader)?;

        Ok(Transaction {
            version,
            lock_time,
            input,
            output,
        })
    }
}
