//! End-to-end consensus between three validators over localhost TCP.

mod common;

use common::*;
use sehat_node::{ClaimSubmission, RecordSubmission, VisitOutcome};
use sehat_types::{ClaimStatus, ReferralStatus, TxPayload};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leaders_rotate_and_followers_replicate() {
    let nodes = three_validators().await;
    assert_eq!(nodes[0].node.leader_for(1), "v2");
    assert_eq!(nodes[0].node.leader_for(2), "v3");
    assert_eq!(nodes[0].node.leader_for(3), "v1");

    let factory = nodes[0].node.transaction_factory();
    for (i, record) in ["rm-1", "rm-2", "rm-3"].iter().enumerate() {
        let txs = factory.record_submission(RecordSubmission {
            record_id: record.to_string(),
            record_hash: format!("hash-{record}"),
            patient_id: "p-1".into(),
            faskes_id: "puskesmas-1".into(),
            diagnosis_code: "A00".into(),
            outcome: VisitOutcome::Cured,
        });
        for tx in txs {
            assert!(nodes[0].node.submit_transaction(tx).await.unwrap());
        }
        wait_for_height(&nodes, i as u64 + 1).await;
    }

    for height in 1..=3 {
        let expected = nodes[0].node.get_block(height).unwrap();
        assert_eq!(expected.header.proposer_id, nodes[0].node.leader_for(height));
        for n in &nodes[1..] {
            assert_eq!(n.node.get_block(height).unwrap(), expected);
        }
    }
    let root = nodes[0].node.state_root();
    for n in &nodes {
        assert_eq!(n.node.state_root(), root);
        assert!(n.node.get_visit("rm-3").is_some());
        assert_eq!(n.node.mempool_len(), 0);
    }

    for n in &nodes {
        n.node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn referral_and_claims_flow_through_the_chain() {
    let nodes = three_validators().await;
    let factory = nodes[1].node.transaction_factory();

    // A cured visit produces exactly one transaction and one block.
    let cured = factory.record_submission(RecordSubmission {
        record_id: "rm-cured".into(),
        record_hash: "h0".into(),
        patient_id: "p-0".into(),
        faskes_id: "puskesmas-1".into(),
        diagnosis_code: "A00".into(),
        outcome: VisitOutcome::Cured,
    });
    assert_eq!(cured.len(), 1);
    for tx in cured {
        nodes[1].node.submit_transaction(tx).await.unwrap();
    }
    wait_for_height(&nodes, 1).await;

    // A referred visit: visit, then referral.
    let referred = factory.record_submission(RecordSubmission {
        record_id: "rm-1".into(),
        record_hash: "h1".into(),
        patient_id: "p-1".into(),
        faskes_id: "puskesmas-1".into(),
        diagnosis_code: "A01".into(),
        outcome: VisitOutcome::Referred {
            target_faskes_id: "rs-sehat".into(),
        },
    });
    let TxPayload::CreateReferral(referral) = &referred[1].payload else {
        panic!("second transaction should be the referral");
    };
    let referral_id = referral.referral_id.clone();
    for tx in referred {
        nodes[1].node.submit_transaction(tx).await.unwrap();
    }
    wait_for_height(&nodes, 3).await;
    for n in &nodes {
        let referral = n.node.get_referral(&referral_id).expect("referral replicated");
        assert_eq!(referral.status, ReferralStatus::Active);
    }

    // A claim against the referral consumes it and is priced by the tariff.
    for tx in factory.claim_submission(ClaimSubmission {
        claim_id: "claim-ok".into(),
        referral_id: Some(referral_id.clone()),
        record_id: "rm-2".into(),
        record_hash: "h2".into(),
        diagnosis_code: "A01".into(),
    }) {
        nodes[1].node.submit_transaction(tx).await.unwrap();
    }
    wait_for_height(&nodes, 5).await;

    // A claim with a diagnosis the tariff does not cover is rejected.
    for tx in factory.claim_submission(ClaimSubmission {
        claim_id: "claim-bad".into(),
        referral_id: None,
        record_id: "rm-3".into(),
        record_hash: "h3".into(),
        diagnosis_code: "Z99".into(),
    }) {
        nodes[1].node.submit_transaction(tx).await.unwrap();
    }
    wait_for_height(&nodes, 7).await;

    for n in &nodes {
        let referral = n.node.get_referral(&referral_id).unwrap();
        assert_eq!(referral.status, ReferralStatus::Used);

        let ok = n.node.get_claim("claim-ok").unwrap();
        assert_eq!(ok.status, ClaimStatus::Pending);
        assert_eq!(ok.amount, 750_000);

        let bad = n.node.get_claim("claim-bad").unwrap();
        assert_eq!(bad.status, ClaimStatus::Rejected);
        assert!(n
            .sink
            .notifications()
            .contains(&("claim-bad".to_string(), ClaimStatus::Rejected)));
    }

    // The admin pays the pending claim; a second decision changes nothing.
    let pay = factory.claim_decision("claim-ok", "admin-1", ClaimStatus::Paid);
    nodes[1].node.submit_transaction(pay).await.unwrap();
    wait_for_height(&nodes, 8).await;
    let reject = factory.claim_decision("claim-ok", "admin-1", ClaimStatus::Rejected);
    nodes[1].node.submit_transaction(reject).await.unwrap();
    wait_for_height(&nodes, 9).await;

    let root = nodes[0].node.state_root();
    for n in &nodes {
        assert_eq!(n.node.get_claim("claim-ok").unwrap().status, ClaimStatus::Paid);
        let paid_notices = n
            .sink
            .notifications()
            .iter()
            .filter(|(id, _)| id == "claim-ok")
            .count();
        assert_eq!(paid_notices, 1);
        assert_eq!(n.node.state_root(), root);
    }

    for n in &nodes {
        n.node.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_and_malformed_submissions() {
    let nodes = three_validators().await;
    let factory = nodes[0].node.transaction_factory();
    let tx = factory.claim_decision("missing-claim", "admin-1", ClaimStatus::Paid);

    assert!(nodes[0].node.submit_transaction(tx.clone()).await.unwrap());
    wait_for_height(&nodes, 1).await;
    // Already committed: not pooled again, no new block.
    assert!(!nodes[0].node.submit_transaction(tx.clone()).await.unwrap());
    assert!(nodes[0].node.is_committed(&tx.id));
    assert_eq!(nodes[0].node.mempool_len(), 0);

    let mut malformed = factory.claim_decision("c", "admin", ClaimStatus::Paid);
    malformed.sender_id.clear();
    assert!(matches!(
        nodes[0].node.submit_transaction(malformed).await,
        Err(sehat_node::NodeError::Transaction(_))
    ));

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    for n in &nodes {
        assert_eq!(n.node.latest_height(), 1);
    }
    for n in &nodes {
        n.node.stop().await;
    }
}
