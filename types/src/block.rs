//! Blocks, headers, and the quorum certificate.

use crate::{Hash32, Timestamp, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proposer id recorded in the genesis header.
pub const GENESIS_PROPOSER: &str = "SYSTEM_INIT";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: Timestamp,
    pub prev_hash: Hash32,
    /// World-state hash before this block's transactions are applied.
    pub state_root: Hash32,
    pub tx_root: Hash32,
    pub proposer_id: String,
}

impl BlockHeader {
    /// Fixed-order field encoding that the header hash is computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 32 * 3 + self.proposer_id.len());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.as_secs().to_be_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf.extend_from_slice(self.state_root.as_bytes());
        buf.extend_from_slice(self.tx_root.as_bytes());
        buf.extend_from_slice(self.proposer_id.as_bytes());
        buf
    }
}

/// Block-level proof of acceptance.
///
/// Only the proposer signs today, so `signatures` holds a single entry
/// keyed by the proposer id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCertificate {
    pub header_hash: Hash32,
    pub signatures: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub certificate: QuorumCertificate,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == 0
    }

    pub fn tx_ids(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().map(|tx| tx.id.as_str())
    }
}
