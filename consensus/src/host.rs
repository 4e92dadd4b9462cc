use sehat_types::{Block, Hash32};

use crate::ConsensusError;

/// Snapshot of the local chain tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: u64,
    pub header_hash: Hash32,
    /// World-state hash after applying the tail block.
    pub state_root: Hash32,
}

/// What the consensus engine needs from the node that runs it.
pub trait ConsensusHost: Send + Sync {
    fn node_id(&self) -> &str;

    fn chain_tip(&self) -> ChainTip;

    /// Assemble the next block from pending transactions, with an empty
    /// certificate. `None` when there is nothing to propose.
    fn create_block(&self) -> Option<Block>;

    /// Append, execute, and prune in one critical section. Fails without
    /// side effects if the block no longer extends the tip.
    fn commit_block(&self, block: Block) -> Result<(), ConsensusError>;

    fn broadcast_block(&self, block: &Block);

    fn sign(&self, data: &[u8]) -> String;
}
