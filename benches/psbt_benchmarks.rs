use criterion::{black_box, criterion_group, criterion_main, Criterion};
use psbt_rs::primitives::encode::{Decodable, Encodable, write_compact_size};
use psbt_rs::primitives::script::Script;
use psbt_rs::primitives::transaction::{OutPoint, Transaction, TxIn, TxOut};
use psbt_rs::PartiallySignedTransaction;
use secp256k1::{Secp256k1, SecretKey};

fn sample_psbt_bytes(inputs: usize, outputs: usize) -> Vec<u8> {
    let secp = Secp256k1::new();
    let pubkey = SecretKey::from_slice(&[7u8; 32])
        .unwrap()
        .public_key(&secp);

    let tx = Transaction {
        version: 2,
        lock_time: 0,
        input: (0..inputs)
            .map(|i| {
                TxIn::new(
                    OutPoint::new([i as u8 + 1; 32], 0),
                    Script::new(),
                    0xffffffff,
                )
            })
            .collect(),
        output: (0..outputs)
            .map(|i| TxOut::new(1_000 * (i as u64 + 1), Script::new()))
            .collect(),
    };

    let mut buf = b"psbt".to_vec();
    buf.push(0xff);

    let mut write_pair = |buf: &mut Vec<u8>, key: &[u8], value: &[u8]| {
        write_compact_size(buf, key.len() as u64).unwrap();
        buf.extend_from_slice(key);
        write_compact_size(buf, value.len() as u64).unwrap();
        buf.extend_from_slice(value);
    };

    write_pair(&mut buf, &[0x00], &tx.consensus_encode_to_vec().unwrap());
    buf.push(0x00);

    for _ in 0..inputs {
        let mut key = vec![0x02];
        key.extend_from_slice(&pubkey.serialize());
        write_pair(&mut buf, &key, &[0x30; 71]);
        write_pair(&mut buf, &[0x03], &1u32.to_le_bytes());
        buf.push(0x00);
    }
    for _ in 0..outputs {
        write_pair(&mut buf, &[0x00], &[0x51, 0x52, 0x53]);
        buf.push(0x00);
    }

    buf
}

fn bench_deserialize(c: &mut Criterion) {
    let small = sample_psbt_bytes(1, 1);
    let large = sample_psbt_bytes(50, 50);

    c.bench_function("psbt_deserialize_1in_1out", |b| {
        b.iter(|| PartiallySignedTransaction::deserialize(black_box(&small)).unwrap())
    });
    c.bench_function("psbt_deserialize_50in_50out", |b| {
        b.iter(|| PartiallySignedTransaction::deserialize(black_box(&large)).unwrap())
    });
}

fn bench_serialize(c: &mut Criterion) {
    let bytes = sample_psbt_bytes(10, 10);
    let psbt = PartiallySignedTransaction::deserialize(&bytes).unwrap();

    c.bench_function("psbt_serialize_10in_10out", |b| {
        b.iter(|| black_box(&psbt).serialize().unwrap())
    });
}

fn bench_transaction_decode(c: &mut Criterion) {
    let tx = Transaction {
        version: 2,
        lock_time: 0,
        input: (0..20)
            .map(|i| {
                TxIn::new(
                    OutPoint::new([i as u8; 32], 0),
                    Script::from_bytes(vec![0x51; 107]),
                    0xffffffff,
                )
            })
            .collect(),
        output: (0..20)
            .map(|i| TxOut::new(1_000 * (i as u64 + 1), Script::from_bytes(vec![0x51; 25])))
            .collect(),
    };
    let encoded = tx.consensus_encode_to_vec().unwrap();

    c.bench_function("transaction_decode_20in_20out", |b| {
        b.iter(|| Transaction::consensus_decode_from_slice(black_box(&encoded)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_deserialize,
    bench_serialize,
    bench_transaction_decode
);
criterion_main!(benches);
