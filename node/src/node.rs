//! The running node: owns the shared core and the background tasks.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sehat_consensus::{RoundRobin, ValidatorSet};
use sehat_network::{ConnectionRegistry, Inbound, Transport};
use sehat_protocol::{Message, MessageBody};
use sehat_state::{ClaimEligibility, ClaimStatusSink, Executor, WorldState};
use sehat_types::{Block, ClaimAsset, Hash32, ReferralAsset, Transaction, Visit};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::node_core::NodeCore;
use crate::intake::TransactionFactory;
use crate::{bootstrap, peer_connector, router, NodeConfig, NodeError, ShutdownController};

/// Capacity of the transport → router channel.
const INBOUND_QUEUE: usize = 1024;

/// A Sehat node, validator or light.
///
/// Lifecycle: [`SehatNode::new`], then [`SehatNode::start`] (or the
/// individual steps [`listen`](SehatNode::listen),
/// [`connect_to_network`](SehatNode::connect_to_network) and
/// [`catch_up`](SehatNode::catch_up)), then [`SehatNode::stop`].
pub struct SehatNode {
    core: Arc<NodeCore>,
    shutdown: ShutdownController,
    inbound_rx: Mutex<Option<mpsc::Receiver<Inbound>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SehatNode {
    pub fn new(
        config: NodeConfig,
        eligibility: Arc<dyn ClaimEligibility>,
        sink: Arc<dyn ClaimStatusSink>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let validators = ValidatorSet::new(&config.validators)?;
        let engine = RoundRobin::new(config.node_id.clone(), validators);

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let transport = Transport::new(
            config.node_id.clone(),
            Arc::new(ConnectionRegistry::new()),
            inbound_tx,
        );
        let executor = Executor::new(Arc::new(WorldState::new()), eligibility, sink);

        tracing::info!(
            node = %config.node_id,
            validator = engine.is_validator(),
            validators = config.validators.len(),
            "node created"
        );
        Ok(Self {
            core: Arc::new(NodeCore::new(config, transport, executor, engine)),
            shutdown: ShutdownController::new(),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Listen, connect to the validators, catch up, then propose if a full
    /// block is already pending. A failed sync is logged and the node keeps
    /// running; live consensus or a later sync closes the gap.
    pub async fn start(&self) -> Result<SocketAddr, NodeError> {
        let addr = self.listen().await?;
        let connected = self.connect_to_network().await;
        tracing::info!(connected, "bootstrap finished");

        tokio::time::sleep(Duration::from_millis(self.core.config.bootstrap.settle_ms)).await;
        match self.catch_up().await {
            Ok(height) => tracing::info!(height, "node started"),
            Err(NodeError::ShuttingDown) => return Err(NodeError::ShuttingDown),
            Err(e) => tracing::warn!(error = %e, "catch-up sync failed"),
        }
        self.core.maybe_start_round();
        Ok(addr)
    }

    /// Bind the P2P port and start the router. Fails if the port cannot be
    /// bound, or if called twice.
    pub async fn listen(&self) -> Result<SocketAddr, NodeError> {
        let inbound_rx = self
            .inbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| NodeError::Config("node is already listening".into()))?;

        let addr = self
            .core
            .transport
            .open(self.core.config.port, self.shutdown.subscribe())
            .await?;
        self.core.set_listen_port(addr.port());

        let router = tokio::spawn(router::run_router(
            Arc::clone(&self.core),
            inbound_rx,
            self.shutdown.subscribe(),
        ));
        self.track(router);
        Ok(addr)
    }

    /// Handshake with every other configured validator concurrently.
    /// Returns how many ended up connected.
    pub async fn connect_to_network(&self) -> usize {
        let mut attempts = JoinSet::new();
        for peer in self.core.config.other_validators() {
            if peer.address.is_empty() {
                continue;
            }
            attempts.spawn(peer_connector::connect_with_retry(
                Arc::clone(&self.core),
                peer.clone(),
            ));
        }

        let mut connected = 0;
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    attempts.abort_all();
                    break;
                }
                next = attempts.join_next() => match next {
                    Some(Ok(true)) => connected += 1,
                    Some(Ok(false)) => {}
                    Some(Err(e)) => tracing::warn!(error = %e, "connect task failed"),
                    None => break,
                }
            }
        }
        connected
    }

    /// Dial `address` and handshake. Returns the peer's id.
    pub async fn handshake(&self, address: &str) -> Result<String, NodeError> {
        peer_connector::handshake(&self.core, address).await
    }

    /// Run catch-up sync against the connected peers.
    pub async fn catch_up(&self) -> Result<u64, NodeError> {
        if self.shutdown.is_triggered() {
            return Err(NodeError::ShuttingDown);
        }
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            result = bootstrap::catch_up(&self.core) => result,
            _ = shutdown.recv() => Err(NodeError::ShuttingDown),
        }
    }

    /// Stop background tasks and drop every peer connection.
    pub async fn stop(&self) {
        tracing::info!(node = %self.core.node_id(), "node stopping");
        self.shutdown.shutdown();

        for peer_id in self.core.transport.peer_ids() {
            self.core.transport.remove_peer(&peer_id);
        }
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                tracing::warn!("background task did not stop in time");
            }
        }
        tracing::info!(node = %self.core.node_id(), "node stopped");
    }

    /// Entry point for adapters: check well-formedness, pool, gossip.
    /// Returns false if the transaction was already known.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<bool, NodeError> {
        tx.check_well_formed()?;
        Ok(self.core.accept_transaction(tx))
    }

    /// Validate and commit a block obtained out of band, as sync would.
    pub async fn import_block(&self, block: Block) -> Result<(), NodeError> {
        self.core.engine.accept_synced_block(&*self.core, block)?;
        self.core.maybe_start_round();
        Ok(())
    }

    /// Ask a connected peer for its peer table.
    pub async fn request_peer_list(
        &self,
        peer_id: &str,
    ) -> Result<BTreeMap<String, String>, NodeError> {
        let request = Message::new(self.core.node_id(), MessageBody::PeersRequest);
        let timeout = Duration::from_millis(self.core.config.sync.request_timeout_ms);
        let response = self.core.transport.request(peer_id, request, timeout).await?;
        match response.body {
            MessageBody::PeersSend(list) => Ok(list.peers),
            other => Err(sehat_network::NetworkError::UnexpectedResponse {
                peer: peer_id.to_string(),
                kind: other.kind().to_string(),
            }
            .into()),
        }
    }

    /// A factory that signs transactions as this node.
    pub fn transaction_factory(&self) -> TransactionFactory {
        TransactionFactory::new(self.core.node_id(), &self.core.config.secret)
    }

    pub fn node_id(&self) -> &str {
        self.core.node_id()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.core.config
    }

    pub fn is_validator(&self) -> bool {
        self.core.engine.is_validator()
    }

    /// Whether this node proposes the next block.
    pub fn is_leader(&self) -> bool {
        self.core.engine.is_leader(self.core.ledger.latest_height())
    }

    pub fn leader_for(&self, height: u64) -> String {
        self.core.engine.leader_for(height).to_string()
    }

    pub fn latest_height(&self) -> u64 {
        self.core.ledger.latest_height()
    }

    pub fn latest_block(&self) -> Block {
        self.core.ledger.latest_block()
    }

    pub fn get_block(&self, height: u64) -> Result<Block, NodeError> {
        Ok(self.core.ledger.get_block(height)?)
    }

    pub fn get_referral(&self, id: &str) -> Option<ReferralAsset> {
        self.core.executor.state().get_referral(id)
    }

    pub fn get_claim(&self, id: &str) -> Option<ClaimAsset> {
        self.core.executor.state().get_claim(id)
    }

    pub fn get_visit(&self, record_id: &str) -> Option<Visit> {
        self.core.executor.state().get_visit(record_id)
    }

    /// Current world-state hash.
    pub fn state_root(&self) -> Hash32 {
        self.core.executor.state().state_hash()
    }

    pub fn is_committed(&self, tx_id: &str) -> bool {
        self.core.ledger.contains_tx(tx_id)
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.core.transport.peer_ids()
    }

    pub fn mempool_len(&self) -> usize {
        self.core.mempool.len()
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }
}
