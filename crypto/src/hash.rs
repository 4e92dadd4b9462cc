//! Blake2b hashing for headers and transactions.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sehat_types::{BlockHeader, Hash32, Transaction};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash of a block header; this is what `prev_hash` links to.
pub fn hash_header(header: &BlockHeader) -> Hash32 {
    Hash32::new(blake2b_256(&header.canonical_bytes()))
}

/// Hash binding a transaction's id, signed content and signature. Each
/// field is length-prefixed so field boundaries cannot shift.
pub fn hash_transaction(tx: &Transaction) -> Hash32 {
    let signing = tx.signing_bytes();
    let id_len = (tx.id.len() as u64).to_be_bytes();
    let signing_len = (signing.len() as u64).to_be_bytes();
    let sig_len = (tx.signature.len() as u64).to_be_bytes();
    Hash32::new(blake2b_256_multi(&[
        &id_len,
        tx.id.as_bytes(),
        &signing_len,
        &signing,
        &sig_len,
        tx.signature.as_bytes(),
    ]))
}

/// Root over the block's transaction hashes, in block order.
///
/// An empty transaction list has the zero root.
pub fn tx_root(txs: &[Transaction]) -> Hash32 {
    if txs.is_empty() {
        return Hash32::ZERO;
    }
    let mut hasher = Blake2b256::new();
    for tx in txs {
        hasher.update(hash_transaction(tx).as_bytes());
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    Hash32::new(output)
}
