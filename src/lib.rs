//! # psbt-rs
//!
//! A pure Rust decoder for Partially Signed Bitcoin Transactions
//! ([BIP 174](https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki)).
//!
//! The crate turns a serialized PSBT byte buffer into a structured,
//! strongly-typed representation: the global map, the decoded unsigned
//! transaction, and one map per input and output with their typed signing
//! fields. Framing and semantic constraints of the format are enforced
//! exactly — per-section key uniqueness, the single-unsigned-transaction
//! rule, UTXO mutual exclusion, and the embedded-public-key shape checks —
//! so a successfully decoded value is never an ambiguous signing target.
//! Unknown fields are preserved raw for opaque round-tripping.
//!
//! ## Quick start
//!
//! ```rust
//! use psbt_rs::PartiallySignedTransaction;
//!
//! // A minimal PSBT: one-input, one-output unsigned transaction and two
//! // empty per-input/per-output maps.
//! let tx_hex = concat!(
//!     "02000000",                                                         // version
//!     "01",                                                               // input count
//!     "0101010101010101010101010101010101010101010101010101010101010101", // txid
//!     "00000000",                                                         // vout
//!     "00",                                                               // empty script sig
//!     "ffffffff",                                                         // sequence
//!     "01",                                                               // output count
//!     "00e1f50500000000",                                                 // value
//!     "00",                                                               // empty script pubkey
//!     "00000000",                                                         // lock time
//! );
//! let bytes = hex::decode(format!("70736274ff01003c{}000000", tx_hex)).unwrap();
//!
//! let psbt = PartiallySignedTransaction::deserialize(&bytes)?;
//! assert_eq!(psbt.unsigned_tx.input.len(), 1);
//! assert_eq!(psbt.inputs.len(), 1);
//! assert_eq!(psbt.outputs.len(), 1);
//! assert_eq!(psbt.serialize()?, bytes);
//! # Ok::<(), psbt_rs::PsbtError>(())
//! ```
//!
//! ## Modules
//!
//! - [`primitives::psbt`]: the decoder core — cursor, key-value grammar,
//!   section decoders, field dispatch
//! - [`primitives::transaction`]: transaction consensus codec
//! - [`primitives::encode`]: CompactSize varints and codec traits
//! - [`primitives::bip32`]: key-origin payloads
//! - [`error`]: typed decode failures
//!
//! ## Error handling
//!
//! All public APIs return [`Result<T, PsbtError>`](error::PsbtError).
//! Malformed input is a permanent condition: a failed decode has no partial
//! result and retrying cannot succeed.
//!
//! ## Thread safety
//!
//! The decoder holds no global state; each decode call is independent and
//! re-entrant, so different buffers may be decoded concurrently from
//! multiple threads.

pub mod error;
pub mod primitives;

pub use error::{MapId, PsbtError, Result};
pub use primitives::psbt::PartiallySignedTransaction;

/// Initializes logging for the library. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    // It's ok if this fails, it just means logging was already initialized.
    let _ = env_logger::try_init();
    log::debug!("psbt-rs {} initialized", env!("CARGO_PKG_VERSION"));
}
