//! Partially Signed Bitcoin Transactions (BIP 174).
//!
//! A PSBT is composed of three kinds of key-value maps: one global map, one
//! map per input, and one map per output. Each map is a sequence of
//! `<keypair>*` terminated by a single `0x00` byte. Every pair is preserved
//! raw in its map's `key_vals`, in arrival order; typed fields are a
//! best-effort overlay on top of that list, each carrying the position of
//! the pair it was decoded from.

use super::bip32::{decode_key_source, DerivationPath, Fingerprint};
use super::encode::{write_compact_size, Decodable};
use super::script::Script;
use super::transaction::{Transaction, TxOut, Witness};
use crate::error::MapId;
use crate::{PsbtError, Result};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// PSBT key type constants as defined in BIP 174.
const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;

const PSBT_IN_NON_WITNESS_UTXO: u8 = 0x00;
const PSBT_IN_WITNESS_UTXO: u8 = 0x01;
const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
const PSBT_IN_SIGHASH_TYPE: u8 = 0x03;
const PSBT_IN_REDEEM_SCRIPT: u8 = 0x04;
const PSBT_IN_WITNESS_SCRIPT: u8 = 0x05;
const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
const PSBT_IN_FINAL_SCRIPTSIG: u8 = 0x07;
const PSBT_IN_FINAL_SCRIPTWITNESS: u8 = 0x08;
const PSBT_IN_POR_COMMITMENT: u8 = 0x09;

const PSBT_OUT_REDEEM_SCRIPT: u8 = 0x00;
const PSBT_OUT_WITNESS_SCRIPT: u8 = 0x01;
const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;

/// "psbt" in ASCII, read big-endian.
const PSBT_MAGIC: u32 = 0x70736274;
const PSBT_SEPARATOR: u8 = 0xff;

/// A cursor over an immutable byte slice. Reads return views into the
/// original buffer and only advance the offset; nothing is copied here.
struct SliceReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SliceReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        SliceReader { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(PsbtError::TruncatedInput {
                offset: self.offset,
                needed: (len - self.remaining()) as u64,
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_compact_size(&mut self) -> Result<u64> {
        match self.read_u8()? {
            0xfd => {
                let b = self.read_bytes(2)?;
                Ok(u16::from_le_bytes([b[0], b[1]]) as u64)
            }
            0xfe => {
                let b = self.read_bytes(4)?;
                Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            0xff => {
                let b = self.read_bytes(8)?;
                Ok(u64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            n => Ok(n as u64),
        }
    }

    /// Reads a CompactSize length followed by that many bytes.
    fn read_var_slice(&mut self) -> Result<&'a [u8]> {
        let len = self.read_compact_size()?;
        if len > self.remaining() as u64 {
            return Err(PsbtError::TruncatedInput {
                offset: self.offset,
                needed: len - self.remaining() as u64,
            });
        }
        self.read_bytes(len as usize)
    }

    /// Reads one key-value pair. The returned pair owns its bytes, so it
    /// outlives the source buffer.
    fn read_key_value(&mut self) -> Result<KeyValue> {
        let key = self.read_var_slice()?.to_vec();
        let value = self.read_var_slice()?.to_vec();
        Ok(KeyValue { key, value })
    }

    /// Peeks one byte. A `0x00` is the section terminator and is consumed;
    /// anything else is left in place for the next pair read. An exhausted
    /// buffer where a terminator was still expected is an error.
    fn end_of_section(&mut self) -> Result<bool> {
        match self.data.get(self.offset) {
            None => Err(PsbtError::UnexpectedEnd),
            Some(0x00) => {
                self.offset += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}

/// One raw key-value pair. The first key byte is the type byte; any
/// remaining key bytes are key data (e.g. an embedded public key).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    /// The type byte, or `None` for a (non-canonically encoded) empty key.
    pub fn key_type(&self) -> Option<u8> {
        self.key.first().copied()
    }

    /// The key bytes after the type byte.
    pub fn key_data(&self) -> &[u8] {
        self.key.get(1..).unwrap_or(&[])
    }
}

/// A decoded field along with the position of the raw pair it came from in
/// its map's `key_vals`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Indexed<T> {
    pub value: T,
    pub index: usize,
}

impl<T> Indexed<T> {
    fn new(value: T, index: usize) -> Self {
        Indexed { value, index }
    }
}

/// One partial signature, keyed by the public key embedded in its pair's key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialSig {
    pub pubkey: PublicKey,
    pub signature: Vec<u8>,
    pub index: usize,
}

/// BIP32 key origin information for one public key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Bip32Derivation {
    pub pubkey: PublicKey,
    pub fingerprint: Fingerprint,
    pub path: DerivationPath,
    pub index: usize,
}

/// Global PSBT map. The unsigned transaction pair stays in `key_vals` like
/// every other pair; its decoded form lives on the top-level PSBT.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalMap {
    pub key_vals: Vec<KeyValue>,
}

/// Per-input PSBT map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PsbtInput {
    pub key_vals: Vec<KeyValue>,
    pub non_witness_utxo: Option<Indexed<Transaction>>,
    pub witness_utxo: Option<Indexed<TxOut>>,
    pub partial_sigs: Vec<PartialSig>,
    pub sighash_type: Option<Indexed<u32>>,
    pub redeem_script: Option<Indexed<Script>>,
    pub witness_script: Option<Indexed<Script>>,
    pub bip32_derivation: Vec<Bip32Derivation>,
    pub final_script_sig: Option<Indexed<Script>>,
    pub final_script_witness: Option<Indexed<Witness>>,
    pub por_commitment: Option<Indexed<String>>,
}

/// Per-output PSBT map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PsbtOutput {
    pub key_vals: Vec<KeyValue>,
    pub redeem_script: Option<Indexed<Script>>,
    pub witness_script: Option<Indexed<Script>>,
    pub bip32_derivation: Vec<Bip32Derivation>,
}

/// Partially Signed Bitcoin Transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartiallySignedTransaction {
    pub unsigned_tx: Transaction,
    pub global_map: GlobalMap,
    pub inputs: Vec<PsbtInput>,
    pub outputs: Vec<PsbtOutput>,
}

impl PartiallySignedTransaction {
    /// Decodes a PSBT from its full serialized byte sequence.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(data);

        if reader.read_u32_be()? != PSBT_MAGIC {
            return Err(PsbtError::BadMagic);
        }
        if reader.read_u8()? != PSBT_SEPARATOR {
            return Err(PsbtError::BadSeparator);
        }

        let global_map = decode_global_map(&mut reader)?;

        let mut unsigned_pairs = global_map
            .key_vals
            .iter()
            .filter(|key_val| key_val.key_type() == Some(PSBT_GLOBAL_UNSIGNED_TX));
        let unsigned_tx = match (unsigned_pairs.next(), unsigned_pairs.next()) {
            (None, _) => return Err(PsbtError::MissingUnsignedTx),
            (Some(_), Some(_)) => return Err(PsbtError::MultipleUnsignedTx),
            (Some(key_val), None) => Transaction::consensus_decode_from_slice(&key_val.value)?,
        };

        // Signatures live in the input maps, never in the transaction itself.
        let tx_is_unsigned = unsigned_tx
            .input
            .iter()
            .all(|txin| txin.script_sig.is_empty() && txin.witness.is_empty());
        if !tx_is_unsigned {
            return Err(PsbtError::UnsignedTxHasScriptOrWitness);
        }

        let mut inputs = Vec::with_capacity(unsigned_tx.input.len());
        for index in 0..unsigned_tx.input.len() {
            inputs.push(decode_input_map(&mut reader, index)?);
        }

        let mut outputs = Vec::with_capacity(unsigned_tx.output.len());
        for index in 0..unsigned_tx.output.len() {
            outputs.push(decode_output_map(&mut reader, index)?);
        }

        log::debug!(
            "decoded PSBT: {} global pairs, {} inputs, {} outputs",
            global_map.key_vals.len(),
            inputs.len(),
            outputs.len()
        );

        Ok(PartiallySignedTransaction {
            unsigned_tx,
            global_map,
            inputs,
            outputs,
        })
    }

    /// Serializes the PSBT back to bytes.
    ///
    /// Every pair of every map lives in that map's `key_vals`, so writing
    /// the raw lists reproduces the decoded byte sequence, unknown fields
    /// included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PSBT_MAGIC.to_be_bytes());
        buf.push(PSBT_SEPARATOR);

        write_map(&mut buf, &self.global_map.key_vals)?;
        for input in &self.inputs {
            write_map(&mut buf, &input.key_vals)?;
        }
        for output in &self.outputs {
            write_map(&mut buf, &output.key_vals)?;
        }

        Ok(buf)
    }
}

fn write_map(buf: &mut Vec<u8>, key_vals: &[KeyValue]) -> Result<()> {
    for key_val in key_vals {
        write_compact_size(buf, key_val.key.len() as u64)?;
        buf.extend_from_slice(&key_val.key);
        write_compact_size(buf, key_val.value.len() as u64)?;
        buf.extend_from_slice(&key_val.value);
    }
    buf.push(0x00);
    Ok(())
}

fn decode_global_map(reader: &mut SliceReader<'_>) -> Result<GlobalMap> {
    let mut seen_keys: HashSet<Vec<u8>> = HashSet::new();
    let mut key_vals = Vec::new();

    while !reader.end_of_section()? {
        let key_val = reader.read_key_value()?;
        if !seen_keys.insert(key_val.key.clone()) {
            return Err(PsbtError::DuplicateKey {
                map: MapId::Global,
                key: hex::encode(&key_val.key),
            });
        }
        key_vals.push(key_val);
    }

    Ok(GlobalMap { key_vals })
}

fn decode_input_map(reader: &mut SliceReader<'_>, index: usize) -> Result<PsbtInput> {
    let map = MapId::Input(index);
    let mut seen_keys: HashSet<Vec<u8>> = HashSet::new();
    let mut input = PsbtInput::default();

    while !reader.end_of_section()? {
        let key_val = reader.read_key_value()?;
        if !seen_keys.insert(key_val.key.clone()) {
            return Err(PsbtError::DuplicateKey {
                map,
                key: hex::encode(&key_val.key),
            });
        }
        let pos = input.key_vals.len();

        let pubkey = match key_val.key_type() {
            Some(PSBT_IN_PARTIAL_SIG) | Some(PSBT_IN_BIP32_DERIVATION) => {
                Some(pubkey_from_key(&key_val)?)
            }
            _ => None,
        };

        match key_val.key_type() {
            Some(PSBT_IN_NON_WITNESS_UTXO) => {
                if input.witness_utxo.is_some() {
                    return Err(PsbtError::ConflictingUtxoFields { index });
                }
                if input.non_witness_utxo.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "non-witness utxo",
                    });
                }
                let tx = Transaction::consensus_decode_from_slice(&key_val.value)?;
                input.non_witness_utxo = Some(Indexed::new(tx, pos));
            }
            Some(PSBT_IN_WITNESS_UTXO) => {
                if input.non_witness_utxo.is_some() {
                    return Err(PsbtError::ConflictingUtxoFields { index });
                }
                if input.witness_utxo.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "witness utxo",
                    });
                }
                let utxo = TxOut::consensus_decode_from_slice(&key_val.value)?;
                input.witness_utxo = Some(Indexed::new(utxo, pos));
            }
            Some(PSBT_IN_PARTIAL_SIG) => {
                let pubkey = pubkey.ok_or(PsbtError::MissingPubkeyContext {
                    field: "partial signature",
                })?;
                input.partial_sigs.push(PartialSig {
                    pubkey,
                    signature: key_val.value.clone(),
                    index: pos,
                });
            }
            Some(PSBT_IN_SIGHASH_TYPE) => {
                if input.sighash_type.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "sighash type",
                    });
                }
                let sighash = decode_sighash_type(&key_val.value)?;
                input.sighash_type = Some(Indexed::new(sighash, pos));
            }
            Some(PSBT_IN_REDEEM_SCRIPT) => {
                if input.redeem_script.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "redeem script",
                    });
                }
                let script = Script::from_bytes(key_val.value.clone());
                input.redeem_script = Some(Indexed::new(script, pos));
            }
            Some(PSBT_IN_WITNESS_SCRIPT) => {
                if input.witness_script.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "witness script",
                    });
                }
                let script = Script::from_bytes(key_val.value.clone());
                input.witness_script = Some(Indexed::new(script, pos));
            }
            Some(PSBT_IN_BIP32_DERIVATION) => {
                let pubkey = pubkey.ok_or(PsbtError::MissingPubkeyContext {
                    field: "bip32 derivation",
                })?;
                let (fingerprint, path) = decode_key_source(&key_val.value)?;
                input.bip32_derivation.push(Bip32Derivation {
                    pubkey,
                    fingerprint,
                    path,
                    index: pos,
                });
            }
            Some(PSBT_IN_FINAL_SCRIPTSIG) => {
                if input.final_script_sig.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "final script sig",
                    });
                }
                let script = Script::from_bytes(key_val.value.clone());
                input.final_script_sig = Some(Indexed::new(script, pos));
            }
            Some(PSBT_IN_FINAL_SCRIPTWITNESS) => {
                if input.final_script_witness.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "final script witness",
                    });
                }
                let witness = decode_witness_stack(&key_val.value)?;
                input.final_script_witness = Some(Indexed::new(witness, pos));
            }
            Some(PSBT_IN_POR_COMMITMENT) => {
                if input.por_commitment.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "proof-of-reserves commitment",
                    });
                }
                let commitment = decode_por_commitment(&key_val.value)?;
                input.por_commitment = Some(Indexed::new(commitment, pos));
            }
            // Unknown type bytes round-trip through key_vals untouched.
            _ => {}
        }

        input.key_vals.push(key_val);
    }

    log::trace!("input {}: {} pairs", index, input.key_vals.len());
    Ok(input)
}

fn decode_output_map(reader: &mut SliceReader<'_>, index: usize) -> Result<PsbtOutput> {
    let map = MapId::Output(index);
    let mut seen_keys: HashSet<Vec<u8>> = HashSet::new();
    let mut output = PsbtOutput::default();

    while !reader.end_of_section()? {
        let key_val = reader.read_key_value()?;
        if !seen_keys.insert(key_val.key.clone()) {
            return Err(PsbtError::DuplicateKey {
                map,
                key: hex::encode(&key_val.key),
            });
        }
        let pos = output.key_vals.len();

        let pubkey = match key_val.key_type() {
            Some(PSBT_OUT_BIP32_DERIVATION) => Some(pubkey_from_key(&key_val)?),
            _ => None,
        };

        match key_val.key_type() {
            Some(PSBT_OUT_REDEEM_SCRIPT) => {
                if output.redeem_script.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "redeem script",
                    });
                }
                let script = Script::from_bytes(key_val.value.clone());
                output.redeem_script = Some(Indexed::new(script, pos));
            }
            Some(PSBT_OUT_WITNESS_SCRIPT) => {
                if output.witness_script.is_some() {
                    return Err(PsbtError::MultipleSingletonField {
                        map,
                        field: "witness script",
                    });
                }
                let script = Script::from_bytes(key_val.value.clone());
                output.witness_script = Some(Indexed::new(script, pos));
            }
            Some(PSBT_OUT_BIP32_DERIVATION) => {
                let pubkey = pubkey.ok_or(PsbtError::MissingPubkeyContext {
                    field: "bip32 derivation",
                })?;
                let (fingerprint, path) = decode_key_source(&key_val.value)?;
                output.bip32_derivation.push(Bip32Derivation {
                    pubkey,
                    fingerprint,
                    path,
                    index: pos,
                });
            }
            _ => {}
        }

        output.key_vals.push(key_val);
    }

    log::trace!("output {}: {} pairs", index, output.key_vals.len());
    Ok(output)
}

/// Validates and parses the public key embedded in a pair's key data: 33 or
/// 65 bytes, prefix 0x02/0x03/0x04, and a point actually on the curve.
fn pubkey_from_key(key_val: &KeyValue) -> Result<PublicKey> {
    let data = key_val.key_data();
    let structurally_valid = (data.len() == 33 || data.len() == 65)
        && matches!(data.first().copied(), Some(0x02) | Some(0x03) | Some(0x04));
    if !structurally_valid {
        return Err(PsbtError::InvalidPubkey {
            key: hex::encode(&key_val.key),
        });
    }
    PublicKey::from_slice(data).map_err(|_| PsbtError::InvalidPubkey {
        key: hex::encode(&key_val.key),
    })
}

fn decode_sighash_type(value: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = value.try_into().map_err(|_| {
        PsbtError::InvalidValue(format!("sighash type must be 4 bytes, got {}", value.len()))
    })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Decodes a final script witness value: a CompactSize item count followed
/// by that many CompactSize-prefixed pushes.
fn decode_witness_stack(value: &[u8]) -> Result<Witness> {
    let mut reader = SliceReader::new(value);
    let count = reader.read_compact_size()?;
    let mut stack = Vec::new();
    for _ in 0..count {
        stack.push(reader.read_var_slice()?.to_vec());
    }
    Ok(stack)
}

fn decode_por_commitment(value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec()).map_err(|_| {
        PsbtError::InvalidValue("proof-of-reserves commitment is not valid UTF-8".to_string())
    })
}
