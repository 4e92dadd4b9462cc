//! Round-robin engine: one proposal per height, committed immediately.

use sehat_crypto::tx_root;
use sehat_types::Block;

use crate::{Certifier, ChainTip, ConsensusError, ConsensusHost, LeaderCertifier, ValidatorSet};

pub struct RoundRobin {
    self_id: String,
    validators: ValidatorSet,
    certifier: Box<dyn Certifier>,
}

impl RoundRobin {
    pub fn new(self_id: impl Into<String>, validators: ValidatorSet) -> Self {
        Self::with_certifier(self_id, validators, Box::new(LeaderCertifier))
    }

    pub fn with_certifier(
        self_id: impl Into<String>,
        validators: ValidatorSet,
        certifier: Box<dyn Certifier>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            validators,
            certifier,
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn leader_for(&self, height: u64) -> &str {
        self.validators.leader_for(height)
    }

    pub fn is_validator(&self) -> bool {
        self.validators.contains(&self.self_id)
    }

    /// Whether this node proposes the block after `latest_height`.
    pub fn is_leader(&self, latest_height: u64) -> bool {
        self.leader_for(latest_height + 1) == self.self_id
    }

    /// Propose, commit, and broadcast the next block. Returns the committed
    /// height.
    pub fn start_round(&self, host: &dyn ConsensusHost) -> Result<u64, ConsensusError> {
        if !self.is_validator() {
            tracing::debug!(node = %self.self_id, "not a validator, skipping round");
            return Err(ConsensusError::NotValidator(self.self_id.clone()));
        }
        let tip = host.chain_tip();
        let height = tip.height + 1;
        let leader = self.leader_for(height);
        if leader != self.self_id {
            tracing::debug!(height, leader = %leader, "not the leader, skipping round");
            return Err(ConsensusError::NotLeader {
                height,
                leader: leader.to_string(),
            });
        }

        let mut block = host.create_block().ok_or(ConsensusError::NothingToPropose)?;
        block.certificate = self.certifier.certify(&block.header, host);
        let height = block.header.height;
        let tx_count = block.transactions.len();

        host.commit_block(block.clone())?;
        host.broadcast_block(&block);
        tracing::info!(height, txs = tx_count, "proposed block");
        Ok(height)
    }

    /// Follower path for a block pushed by a peer. Accepted blocks are
    /// relayed onward.
    pub fn handle_incoming_block(
        &self,
        host: &dyn ConsensusHost,
        block: Block,
    ) -> Result<(), ConsensusError> {
        self.accept(host, block, true)
    }

    /// Same checks and commit as [`RoundRobin::handle_incoming_block`], without
    /// relaying. Used by catch-up sync and block import.
    pub fn accept_synced_block(
        &self,
        host: &dyn ConsensusHost,
        block: Block,
    ) -> Result<(), ConsensusError> {
        self.accept(host, block, false)
    }

    fn accept(
        &self,
        host: &dyn ConsensusHost,
        block: Block,
        relay: bool,
    ) -> Result<(), ConsensusError> {
        let tip = host.chain_tip();
        let result = self
            .validate(&block, &tip)
            .and_then(|()| host.commit_block(block.clone()));

        match &result {
            Ok(()) => {
                tracing::info!(
                    height = block.header.height,
                    proposer = %block.header.proposer_id,
                    txs = block.transactions.len(),
                    "accepted block"
                );
                if relay {
                    host.broadcast_block(&block);
                }
            }
            Err(e @ ConsensusError::StateRootDivergence { .. }) => {
                tracing::error!(error = %e, "state root divergence, refusing block");
            }
            Err(e) if e.is_stale() => {
                tracing::debug!(height = block.header.height, error = %e, "ignoring stale block");
            }
            Err(e) => {
                tracing::warn!(height = block.header.height, error = %e, "rejected block");
            }
        }
        result
    }

    /// Checks, in order: height, linkage, proposer, tx root, certificate,
    /// state root.
    pub fn validate(&self, block: &Block, tip: &ChainTip) -> Result<(), ConsensusError> {
        let header = &block.header;
        let expected = tip.height + 1;
        if header.height != expected {
            return Err(ConsensusError::HeightMismatch {
                expected,
                got: header.height,
            });
        }
        if header.prev_hash != tip.header_hash {
            return Err(ConsensusError::PrevHashMismatch {
                height: header.height,
            });
        }
        let leader = self.leader_for(header.height);
        if header.proposer_id != leader {
            return Err(ConsensusError::WrongProposer {
                height: header.height,
                expected: leader.to_string(),
                got: header.proposer_id.clone(),
            });
        }
        if header.tx_root != tx_root(&block.transactions) {
            return Err(ConsensusError::TxRootMismatch {
                height: header.height,
            });
        }
        self.certifier.verify(block, &self.validators)?;
        if header.state_root != tip.state_root {
            return Err(ConsensusError::StateRootDivergence {
                height: header.height,
                expected: tip.state_root,
                got: header.state_root,
            });
        }
        Ok(())
    }
}
