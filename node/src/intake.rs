//! Builds signed transactions from facility submissions.
//!
//! This is the part of the client-facing adapters that belongs to the node:
//! turning a record upload, a claim, or an admin decision into the
//! transactions the chain records.

use sehat_crypto::Credential;
use sehat_types::{
    ClaimStatus, ExecuteClaimPayload, ReferralPayload, SubmitClaimPayload, Timestamp,
    Transaction, TxPayload, VisitPayload,
};

/// How a visit ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Treated and discharged; no referral follows.
    Cured,
    /// Referred onward to another facility.
    Referred { target_faskes_id: String },
}

/// A medical record uploaded by a facility.
#[derive(Clone, Debug)]
pub struct RecordSubmission {
    pub record_id: String,
    pub record_hash: String,
    pub patient_id: String,
    pub faskes_id: String,
    pub diagnosis_code: String,
    pub outcome: VisitOutcome,
}

/// A reimbursement claim for a treated visit.
#[derive(Clone, Debug)]
pub struct ClaimSubmission {
    pub claim_id: String,
    pub referral_id: Option<String>,
    pub record_id: String,
    pub record_hash: String,
    pub diagnosis_code: String,
}

/// Signs transactions as one sender.
#[derive(Debug)]
pub struct TransactionFactory {
    sender_id: String,
    credential: Credential,
}

impl TransactionFactory {
    pub fn new(sender_id: impl Into<String>, secret: &str) -> Self {
        Self {
            sender_id: sender_id.into(),
            credential: Credential::new(secret),
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// A fresh transaction with a UUID id, the current time and the mock
    /// signature over its signing bytes.
    pub fn build(&self, payload: TxPayload) -> Transaction {
        let mut tx = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Timestamp::now(),
            sender_id: self.sender_id.clone(),
            signature: String::new(),
            payload,
        };
        tx.signature = self.credential.sign(&tx.signing_bytes());
        tx
    }

    pub fn verify(&self, tx: &Transaction) -> bool {
        self.credential.verify(&tx.signing_bytes(), &tx.signature)
    }

    /// The visit, plus a referral unless the patient was cured.
    pub fn record_submission(&self, submission: RecordSubmission) -> Vec<Transaction> {
        let RecordSubmission {
            record_id,
            record_hash,
            patient_id,
            faskes_id,
            diagnosis_code,
            outcome,
        } = submission;

        let mut txs = vec![self.build(TxPayload::RecordVisit(VisitPayload {
            record_id: record_id.clone(),
            record_hash: record_hash.clone(),
        }))];
        if let VisitOutcome::Referred { target_faskes_id } = outcome {
            txs.push(self.build(TxPayload::CreateReferral(ReferralPayload {
                referral_id: uuid::Uuid::new_v4().to_string(),
                patient_id,
                record_id,
                record_hash,
                origin_faskes_id: faskes_id,
                target_faskes_id,
                diagnosis_code,
            })));
        }
        txs
    }

    /// The final record of the treatment, then the claim itself.
    pub fn claim_submission(&self, submission: ClaimSubmission) -> Vec<Transaction> {
        vec![
            self.build(TxPayload::RecordVisit(VisitPayload {
                record_id: submission.record_id.clone(),
                record_hash: submission.record_hash.clone(),
            })),
            self.build(TxPayload::SubmitClaim(SubmitClaimPayload {
                claim_id: submission.claim_id,
                referral_id: submission.referral_id,
                record_id: submission.record_id,
                record_hash: submission.record_hash,
                diagnosis_code: submission.diagnosis_code,
            })),
        ]
    }

    pub fn claim_decision(
        &self,
        claim_id: impl Into<String>,
        admin_id: impl Into<String>,
        decision: ClaimStatus,
    ) -> Transaction {
        self.build(TxPayload::ExecuteClaim(ExecuteClaimPayload {
            claim_id: claim_id.into(),
            admin_id: admin_id.into(),
            decision,
        }))
    }
}
