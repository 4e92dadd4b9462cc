use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sehat_crypto::hash_header;
use sehat_types::{Block, Hash32};

use crate::{genesis_block, LedgerError};

struct Chain {
    blocks: Vec<Block>,
    /// Header hash of the last block.
    tip_hash: Hash32,
    /// Ids of every committed transaction.
    committed: HashSet<String>,
}

/// The replicated chain. Internally synchronized; reads share the lock,
/// appends take it exclusively.
pub struct Ledger {
    chain: RwLock<Chain>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        let genesis = genesis_block();
        let tip_hash = hash_header(&genesis.header);
        Self {
            chain: RwLock::new(Chain {
                blocks: vec![genesis],
                tip_hash,
                committed: HashSet::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Chain> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `block` to the tail. A block that is not exactly one higher
    /// than the tail, or does not link to the tail's header hash, is
    /// rejected and the ledger is left unchanged.
    pub fn append(&self, block: Block) -> Result<(), LedgerError> {
        let mut chain = self.write();
        let tail_height = chain.blocks.len() as u64 - 1;

        let expected = tail_height + 1;
        if block.header.height != expected {
            return Err(LedgerError::InvalidHeight {
                expected,
                got: block.header.height,
            });
        }
        if block.header.prev_hash != chain.tip_hash {
            return Err(LedgerError::InvalidLinkage {
                height: block.header.height,
                expected: chain.tip_hash,
                got: block.header.prev_hash,
            });
        }

        chain.tip_hash = hash_header(&block.header);
        let ids: Vec<String> = block.tx_ids().map(str::to_string).collect();
        chain.committed.extend(ids);
        chain.blocks.push(block);
        Ok(())
    }

    pub fn get_block(&self, height: u64) -> Result<Block, LedgerError> {
        let chain = self.read();
        chain
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(LedgerError::HeightNotFound {
                height,
                latest: chain.blocks.len() as u64 - 1,
            })
    }

    pub fn latest_height(&self) -> u64 {
        self.read().blocks.len() as u64 - 1
    }

    pub fn latest_block(&self) -> Block {
        let chain = self.read();
        // The chain always holds at least the genesis block.
        chain
            .blocks
            .last()
            .cloned()
            .unwrap_or_else(genesis_block)
    }

    /// Height and header hash of the tail, read atomically.
    pub fn tip(&self) -> (u64, Hash32) {
        let chain = self.read();
        (chain.blocks.len() as u64 - 1, chain.tip_hash)
    }

    /// Whether a transaction with this id is already in a committed block.
    pub fn contains_tx(&self, tx_id: &str) -> bool {
        self.read().committed.contains(tx_id)
    }
}
