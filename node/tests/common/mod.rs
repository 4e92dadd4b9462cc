//! Helpers for driving real nodes over localhost TCP.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use sehat_node::{BootstrapConfig, NodeConfig, SehatNode, SyncConfig};
use sehat_nullables::NullSink;
use sehat_state::TariffTable;
use sehat_types::ValidatorConfig;

pub const VALIDATORS: [&str; 3] = ["v1", "v2", "v3"];

pub fn secret_for(id: &str) -> String {
    format!("secret-{id}")
}

/// Validator entries with the given addresses (empty means "do not dial").
pub fn validator_set(addresses: &[(&str, String)]) -> Vec<ValidatorConfig> {
    addresses
        .iter()
        .map(|(id, address)| ValidatorConfig {
            id: id.to_string(),
            secret: secret_for(id),
            address: address.clone(),
        })
        .collect()
}

/// Fast timings so tests do not sit in retry sleeps.
pub fn config(node_id: &str, validators: Vec<ValidatorConfig>) -> NodeConfig {
    NodeConfig {
        node_id: node_id.to_string(),
        secret: secret_for(node_id),
        port: 0,
        max_block_txs: 1,
        handshake_timeout_ms: 500,
        validators,
        bootstrap: BootstrapConfig {
            attempts: 20,
            backoff_ms: 100,
            tie_break_wait_ms: 150,
            settle_ms: 50,
        },
        sync: SyncConfig {
            request_timeout_ms: 500,
            retry_delay_ms: 100,
            fetch_pause_ms: 0,
            max_idle_rounds: 5,
        },
        ..NodeConfig::default()
    }
}

pub struct TestNode {
    pub node: SehatNode,
    pub sink: Arc<NullSink>,
    /// `127.0.0.1:port` once listening.
    pub addr: String,
}

pub fn build(config: NodeConfig) -> (SehatNode, Arc<NullSink>) {
    let sink = Arc::new(NullSink::new());
    let node = SehatNode::new(config, Arc::new(TariffTable::default()), sink.clone())
        .expect("valid config");
    (node, sink)
}

pub async fn listening(config: NodeConfig) -> TestNode {
    let (node, sink) = build(config);
    let bound = node.listen().await.expect("listen");
    TestNode {
        node,
        sink,
        addr: format!("127.0.0.1:{}", bound.port()),
    }
}

/// Three validators, each connected to the other two by explicit handshakes.
pub async fn three_validators() -> Vec<TestNode> {
    let validators = validator_set(&VALIDATORS.map(|id| (id, String::new())));
    let mut nodes = Vec::new();
    for id in VALIDATORS {
        nodes.push(listening(config(id, validators.clone())).await);
    }
    for (i, j) in [(0, 1), (0, 2), (1, 2)] {
        let peer = nodes[i].node.handshake(&nodes[j].addr).await.expect("handshake");
        assert_eq!(peer, VALIDATORS[j]);
    }
    wait_until("full mesh", || nodes.iter().all(|n| n.node.peer_ids().len() == 2)).await;
    nodes
}

pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_for_height(nodes: &[TestNode], height: u64) {
    wait_until(&format!("height {height} on every node"), || {
        nodes.iter().all(|n| n.node.latest_height() >= height)
    })
    .await;
}

/// Reserve an ephemeral port by binding and releasing it.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("free port")
}
