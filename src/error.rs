use std::fmt;
use thiserror::Error;

/// Which key-value map a format error was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapId {
    Global,
    Input(usize),
    Output(usize),
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapId::Global => write!(f, "global map"),
            MapId::Input(index) => write!(f, "input {}", index),
            MapId::Output(index) => write!(f, "output {}", index),
        }
    }
}

#[derive(Error, Debug)]
pub enum PsbtError {
    #[error("buffer ended at offset {offset}, {needed} more bytes needed")]
    TruncatedInput { offset: usize, needed: u64 },

    #[error("unexpected end of PSBT")]
    UnexpectedEnd,

    #[error("invalid magic number")]
    BadMagic,

    #[error("magic number must be followed by 0xff separator")]
    BadSeparator,

    #[error("keys must be unique for {map}: key 0x{key}")]
    DuplicateKey { map: MapId, key: String },

    #[error("global map must contain an unsigned transaction")]
    MissingUnsignedTx,

    #[error("only one unsigned transaction allowed per global map")]
    MultipleUnsignedTx,

    #[error("unsigned transaction must have empty script sigs and witness stacks")]
    UnsignedTxHasScriptOrWitness,

    #[error("invalid pubkey in key 0x{key}")]
    InvalidPubkey { key: String },

    #[error("{field} requires a pubkey in its key")]
    MissingPubkeyContext { field: &'static str },

    #[error("{map} has multiple {field}")]
    MultipleSingletonField { map: MapId, field: &'static str },

    #[error("input {index} has both witness and non-witness utxo")]
    ConflictingUtxoFields { index: usize },

    #[error("invalid field value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PsbtError>;
