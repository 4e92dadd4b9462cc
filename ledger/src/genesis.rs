//! Genesis block: the fixed first block every node starts from.
//!
//! The genesis block has height 0, all-zero hashes, proposer
//! `SYSTEM_INIT`, no transactions, and a certificate that carries only its
//! own header hash. It is identical on every node, so it is never
//! transmitted.

use sehat_crypto::hash_header;
use sehat_types::{Block, BlockHeader, Hash32, QuorumCertificate, Timestamp, GENESIS_PROPOSER};

/// 2025-11-20 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_763_596_800;

pub fn genesis_block() -> Block {
    let header = BlockHeader {
        height: 0,
        timestamp: Timestamp::new(GENESIS_TIMESTAMP),
        prev_hash: Hash32::ZERO,
        state_root: Hash32::ZERO,
        tx_root: Hash32::ZERO,
        proposer_id: GENESIS_PROPOSER.to_string(),
    };
    let certificate = QuorumCertificate {
        header_hash: hash_header(&header),
        signatures: Default::default(),
    };
    Block {
        header,
        transactions: Vec::new(),
        certificate,
    }
}

pub fn genesis_hash() -> Hash32 {
    hash_header(&genesis_block().header)
}
