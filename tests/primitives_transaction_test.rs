use psbt_rs::primitives::encode::{Decodable, Encodable};
use psbt_rs::primitives::script::Script;
use psbt_rs::primitives::transaction::{OutPoint, Transaction, TxIn, TxOut};
use psbt_rs::PsbtError;

fn two_input_tx() -> Transaction {
    Transaction {
        version: 2,
        lock_time: 101,
        input: vec![
            TxIn::new(OutPoint::new([1u8; 32], 0), Script::new(), 0xffffffff),
            TxIn::new(
                OutPoint::new([2u8; 32], 3),
                Script::from_bytes(vec![0x51]),
                0xfffffffe,
            ),
        ],
        output: vec![
            TxOut::new(100_000, Script::from_bytes(vec![0x76, 0xa9, 0x14])),
            TxOut::new(250_000, Script::from_bytes(vec![0x00, 0x14])),
        ],
    }
}

#[test]
fn legacy_encoding_roundtrip() {
    let tx = two_input_tx();
    let encoded = tx.consensus_encode_to_vec().unwrap();
    // No witness data, so no segwit marker.
    assert_ne!(&encoded[4..6], &[0x00, 0x01]);
    assert_eq!(Transaction::consensus_decode_from_slice(&encoded).unwrap(), tx);
}

#[test]
fn segwit_encoding_roundtrip() {
    let mut tx = two_input_tx();
    tx.input[0].witness = vec![vec![0x30, 0x44, 0x02], vec![0x02, 0xaa]];
    // The second input keeps an empty stack; both must survive.
    let encoded = tx.consensus_encode_to_vec().unwrap();
    assert_eq!(&encoded[4..6], &[0x00, 0x01]);

    let decoded = Transaction::consensus_decode_from_slice(&encoded).unwrap();
    assert_eq!(decoded, tx);
    assert!(decoded.has_witness());
    assert!(decoded.input[1].witness.is_empty());
}

#[test]
fn known_vector_decodes() {
    // 1 input, 1 output, empty scripts, version 2.
    let bytes = hex::decode(concat!(
        "02000000",
        "01",
        "0101010101010101010101010101010101010101010101010101010101010101",
        "00000000",
        "00",
        "ffffffff",
        "01",
        "00e1f50500000000",
        "00",
        "00000000",
    ))
    .unwrap();

    let tx = Transaction::consensus_decode_from_slice(&bytes).unwrap();
    assert_eq!(tx.version, 2);
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output.txid, [1u8; 32]);
    assert_eq!(tx.output[0].value, 100_000_000);
    assert_eq!(tx.lock_time, 0);
    assert_eq!(tx.consensus_encode_to_vec().unwrap(), bytes);
}

#[test]
fn rejects_truncated_transaction() {
    let encoded = two_input_tx().consensus_encode_to_vec().unwrap();
    assert!(Transaction::consensus_decode_from_slice(&encoded[..encoded.len() - 1]).is_err());
}

#[test]
fn rejects_trailing_bytes() {
    let mut encoded = two_input_tx().consensus_encode_to_vec().unwrap();
    encoded.push(0x00);
    assert!(matches!(
        Transaction::consensus_decode_from_slice(&encoded).unwrap_err(),
        PsbtError::InvalidValue(_)
    ));
}
