//! Catch-up sync and block import.

mod common;

use common::*;
use sehat_consensus::ConsensusError;
use sehat_node::{NodeError, RecordSubmission, VisitOutcome};
use sehat_types::Hash32;

async fn network_at_height(height: u64) -> Vec<TestNode> {
    let nodes = three_validators().await;
    let factory = nodes[0].node.transaction_factory();
    for i in 1..=height {
        let txs = factory.record_submission(RecordSubmission {
            record_id: format!("rm-{i}"),
            record_hash: format!("h-{i}"),
            patient_id: "p-1".into(),
            faskes_id: "puskesmas-1".into(),
            diagnosis_code: "A02".into(),
            outcome: VisitOutcome::Cured,
        });
        for tx in txs {
            nodes[0].node.submit_transaction(tx).await.unwrap();
        }
        wait_for_height(&nodes, i).await;
    }
    nodes
}

fn light_config() -> sehat_node::NodeConfig {
    let validators = validator_set(&VALIDATORS.map(|id| (id, String::new())));
    config("light-1", validators)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lagging_node_catches_up_in_order() {
    let nodes = network_at_height(5).await;

    let light = listening(light_config()).await;
    assert!(!light.node.is_validator());
    for height in 1..=2 {
        let block = nodes[0].node.get_block(height).unwrap();
        light.node.import_block(block).await.unwrap();
    }
    assert_eq!(light.node.latest_height(), 2);

    light.node.handshake(&nodes[1].addr).await.unwrap();
    light.node.handshake(&nodes[2].addr).await.unwrap();

    assert_eq!(light.node.catch_up().await.unwrap(), 5);
    assert_eq!(light.node.latest_height(), 5);
    for height in 0..=5 {
        assert_eq!(
            light.node.get_block(height).unwrap(),
            nodes[0].node.get_block(height).unwrap()
        );
    }
    assert_eq!(light.node.state_root(), nodes[0].node.state_root());
    assert!(light.node.get_visit("rm-5").is_some());

    light.node.stop().await;
    for n in &nodes {
        n.node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn light_node_follows_live_blocks_after_sync() {
    let nodes = network_at_height(1).await;
    let light = listening(light_config()).await;
    for n in &nodes {
        light.node.handshake(&n.addr).await.unwrap();
    }
    assert_eq!(light.node.catch_up().await.unwrap(), 1);

    let factory = nodes[2].node.transaction_factory();
    let tx = factory.claim_decision("none", "admin", sehat_types::ClaimStatus::Rejected);
    nodes[2].node.submit_transaction(tx).await.unwrap();
    wait_for_height(&nodes, 2).await;
    wait_until("light node at height 2", || light.node.latest_height() == 2).await;
    assert_eq!(light.node.state_root(), nodes[0].node.state_root());

    light.node.stop().await;
    for n in &nodes {
        n.node.stop().await;
    }
}

#[tokio::test]
async fn sync_without_peers_is_immediately_done() {
    let light = listening(light_config()).await;
    assert_eq!(light.node.catch_up().await.unwrap(), 0);
    light.node.stop().await;
    assert!(matches!(light.node.catch_up().await, Err(NodeError::ShuttingDown)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn import_rejects_invalid_blocks() {
    let nodes = network_at_height(2).await;
    let (light, _) = build(light_config());

    // Height 2 before height 1.
    let second = nodes[0].node.get_block(2).unwrap();
    assert!(matches!(
        light.import_block(second).await,
        Err(NodeError::Consensus(ConsensusError::HeightMismatch { expected: 1, got: 2 }))
    ));

    let mut wrong_proposer = nodes[0].node.get_block(1).unwrap();
    wrong_proposer.header.proposer_id = "v1".into();
    assert!(matches!(
        light.import_block(wrong_proposer).await,
        Err(NodeError::Consensus(ConsensusError::WrongProposer { .. }))
    ));

    let mut diverged = nodes[0].node.get_block(1).unwrap();
    diverged.header.state_root = Hash32::new([9; 32]);
    assert!(matches!(
        light.import_block(diverged).await,
        Err(NodeError::Consensus(ConsensusError::BadCertificate { .. }))
    ));

    let original = nodes[0].node.get_block(1).unwrap();
    let mut renamed = original.clone();
    renamed.transactions[0].id = "forged-id".into();
    renamed.transactions[0].signature = "deadbeef".into();
    assert!(matches!(
        light.import_block(renamed).await,
        Err(NodeError::Consensus(ConsensusError::TxRootMismatch { height: 1 }))
    ));
    assert!(!light.is_committed("forged-id"));

    assert_eq!(light.latest_height(), 0);
    light.import_block(original.clone()).await.unwrap();
    assert!(light.is_committed(&original.transactions[0].id));
    assert_eq!(light.latest_height(), 1);

    for n in &nodes {
        n.node.stop().await;
    }
}
