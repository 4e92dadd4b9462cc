//! State shared by the node's tasks, and the commit path consensus drives.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, PoisonError};

use sehat_consensus::{ChainTip, ConsensusError, ConsensusHost, RoundRobin};
use sehat_crypto::{tx_root, Credential};
use sehat_ledger::{Ledger, LedgerError};
use sehat_mempool::Mempool;
use sehat_network::Transport;
use sehat_protocol::{BlockPayload, Message, MessageBody, TxGossipPayload};
use sehat_state::Executor;
use sehat_types::{Block, BlockHeader, QuorumCertificate, Timestamp, Transaction};

use crate::tracing_spans::block_commit_span;
use crate::NodeConfig;

pub(crate) struct NodeCore {
    pub(crate) config: NodeConfig,
    credential: Credential,
    pub(crate) transport: Transport,
    pub(crate) ledger: Ledger,
    pub(crate) mempool: Mempool,
    pub(crate) executor: Executor,
    pub(crate) engine: RoundRobin,
    /// Serializes ledger append, execution and mempool pruning.
    commit_lock: Mutex<()>,
    /// Advertised in handshakes; set once the listener is bound.
    listen_port: AtomicU16,
}

impl NodeCore {
    pub(crate) fn new(
        config: NodeConfig,
        transport: Transport,
        executor: Executor,
        engine: RoundRobin,
    ) -> Self {
        let credential = Credential::new(&config.secret);
        let listen_port = AtomicU16::new(config.port);
        Self {
            config,
            credential,
            transport,
            ledger: Ledger::new(),
            mempool: Mempool::new(),
            executor,
            engine,
            commit_lock: Mutex::new(()),
            listen_port,
        }
    }

    pub(crate) fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub(crate) fn listen_port(&self) -> u16 {
        self.listen_port.load(Ordering::Relaxed)
    }

    pub(crate) fn set_listen_port(&self, port: u16) {
        self.listen_port.store(port, Ordering::Relaxed);
    }

    /// Add a transaction to the mempool and gossip it. Returns false if it
    /// was already pending or already committed.
    pub(crate) fn accept_transaction(&self, tx: Transaction) -> bool {
        if self.ledger.contains_tx(&tx.id) {
            tracing::debug!(tx = %tx.id, "transaction already committed");
            return false;
        }
        if !self.mempool.add(tx.clone()) {
            tracing::trace!(tx = %tx.id, "transaction already pending");
            return false;
        }
        tracing::debug!(tx = %tx.id, kind = %tx.kind(), pool = self.mempool.len(), "transaction pooled");
        let gossip = Message::new(
            self.node_id(),
            MessageBody::TxGossip(TxGossipPayload { transaction: tx }),
        );
        self.transport.broadcast(&gossip);
        self.maybe_start_round();
        true
    }

    /// Propose while this node leads the next height and the mempool holds a
    /// full block. Also called after every commit so that a leader whose
    /// pool filled while it was following does not stall.
    pub(crate) fn maybe_start_round(&self) {
        loop {
            if !self.engine.is_validator()
                || self.mempool.len() < self.config.max_block_txs
                || !self.engine.is_leader(self.ledger.latest_height())
            {
                return;
            }
            match self.engine.start_round(self) {
                Ok(_) => continue,
                Err(ConsensusError::NothingToPropose) => return,
                Err(e) if e.is_stale() => {
                    tracing::debug!(error = %e, "round lost to a concurrent commit");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "round failed");
                    return;
                }
            }
        }
    }

    fn map_ledger_error(e: LedgerError) -> ConsensusError {
        match e {
            LedgerError::InvalidHeight { expected, got } if got < expected => {
                ConsensusError::Stale { height: got }
            }
            LedgerError::InvalidHeight { expected, got } => {
                ConsensusError::HeightMismatch { expected, got }
            }
            LedgerError::InvalidLinkage { height, .. } => {
                ConsensusError::PrevHashMismatch { height }
            }
            other => ConsensusError::Commit(other.to_string()),
        }
    }
}

impl ConsensusHost for NodeCore {
    fn node_id(&self) -> &str {
        &self.config.node_id
    }

    /// Read under the commit lock so the height and the state root describe
    /// the same tip.
    fn chain_tip(&self) -> ChainTip {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (height, header_hash) = self.ledger.tip();
        ChainTip {
            height,
            header_hash,
            state_root: self.executor.state().state_hash(),
        }
    }

    fn create_block(&self) -> Option<Block> {
        let mut txs = self.mempool.extract(self.config.max_block_txs);
        txs.retain(|tx| !self.ledger.contains_tx(&tx.id));
        if txs.is_empty() {
            return None;
        }
        let tip = self.ledger.latest_block();
        let prev_hash = sehat_crypto::hash_header(&tip.header);
        // Keep block time monotonic even if the local clock lags the proposer
        // of the previous block.
        let timestamp = Timestamp::now().max(tip.header.timestamp);
        let header = BlockHeader {
            height: tip.header.height + 1,
            timestamp,
            prev_hash,
            state_root: self.executor.state().state_hash(),
            tx_root: tx_root(&txs),
            proposer_id: self.config.node_id.clone(),
        };
        Some(Block {
            header,
            transactions: txs,
            certificate: QuorumCertificate::default(),
        })
    }

    fn commit_block(&self, block: Block) -> Result<(), ConsensusError> {
        let span = block_commit_span(block.header.height, &block.header.proposer_id);
        let _enter = span.enter();
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let height = block.header.height;
        let latest = self.ledger.latest_height();
        if height <= latest {
            return Err(ConsensusError::Stale { height });
        }
        // Re-checked under the lock: validation ran against a tip snapshot.
        let local_root = self.executor.state().state_hash();
        if block.header.state_root != local_root {
            tracing::error!(height, local = %local_root, block = %block.header.state_root, "state root divergence at commit");
            return Err(ConsensusError::StateRootDivergence {
                height,
                expected: local_root,
                got: block.header.state_root,
            });
        }

        if let Err(e) = self.ledger.append(block.clone()) {
            tracing::error!(height, error = %e, "ledger rejected a validated block");
            return Err(Self::map_ledger_error(e));
        }
        let outcomes = self.executor.apply_block(&block);
        self.mempool.remove(&block.transactions);

        tracing::info!(
            height,
            txs = block.transactions.len(),
            state_root = %self.executor.state().state_hash(),
            "block committed"
        );
        tracing::debug!(height, ?outcomes, "execution outcomes");
        Ok(())
    }

    fn broadcast_block(&self, block: &Block) {
        let message = Message::new(
            self.node_id(),
            MessageBody::BlockSend(BlockPayload {
                latest_height: self.ledger.latest_height(),
                block: block.clone(),
            }),
        );
        self.transport.broadcast(&message);
    }

    fn sign(&self, data: &[u8]) -> String {
        self.credential.sign(data)
    }
}
