//! Deterministic application of committed transactions to world state.

use std::sync::Arc;

use sehat_types::{
    Block, ClaimAsset, ClaimStatus, ExecuteClaimPayload, ReferralAsset, ReferralPayload,
    ReferralStatus, SubmitClaimPayload, Timestamp, Transaction, TxPayload, Visit,
};

use crate::world_state::Assets;
use crate::{ClaimEligibility, ClaimStatusSink, WorldState};

/// How long a referral stays usable after issue: 90 days.
pub const REFERRAL_VALIDITY_SECS: u64 = 90 * 24 * 60 * 60;

/// Why a claim was recorded as REJECTED at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ReferralNotFound,
    ReferralNotActive(ReferralStatus),
    ReferralExpired,
    Ineligible,
    EligibilityError(String),
}

/// Result of applying one transaction. None of these abort a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    VisitRecorded,
    ReferralCreated,
    ClaimPending { amount: u64 },
    ClaimRejected(RejectReason),
    ClaimDecided(ClaimStatus),
    ClaimNotFound,
    /// ExecuteClaim on a claim that is already PAID or REJECTED.
    ClaimAlreadyFinal(ClaimStatus),
    InvalidDecision(ClaimStatus),
    /// A referral or claim with the same id already exists.
    DuplicateAsset,
}

/// The single writer of [`WorldState`].
pub struct Executor {
    state: Arc<WorldState>,
    eligibility: Arc<dyn ClaimEligibility>,
    sink: Arc<dyn ClaimStatusSink>,
}

impl Executor {
    pub fn new(
        state: Arc<WorldState>,
        eligibility: Arc<dyn ClaimEligibility>,
        sink: Arc<dyn ClaimStatusSink>,
    ) -> Self {
        Self {
            state,
            eligibility,
            sink,
        }
    }

    pub fn state(&self) -> &Arc<WorldState> {
        &self.state
    }

    /// Apply every transaction of `block` in order, using the block
    /// timestamp as the current time.
    pub fn apply_block(&self, block: &Block) -> Vec<TxOutcome> {
        self.apply_transactions(&block.transactions, block.header.timestamp)
    }

    /// Apply `txs` in order under one write lock. Claim status notifications
    /// are delivered after the lock is released.
    pub fn apply_transactions(&self, txs: &[Transaction], now: Timestamp) -> Vec<TxOutcome> {
        let mut notices = Vec::new();
        let outcomes = {
            let mut assets = self.state.write();
            txs.iter()
                .map(|tx| self.apply_tx(&mut assets, tx, now, &mut notices))
                .collect()
        };

        for (claim_id, status) in notices {
            if let Err(e) = self.sink.notify_claim_status(&claim_id, status) {
                tracing::warn!(claim = %claim_id, status = %status, error = %e, "claim status notification failed");
            }
        }
        outcomes
    }

    fn apply_tx(
        &self,
        assets: &mut Assets,
        tx: &Transaction,
        now: Timestamp,
        notices: &mut Vec<(String, ClaimStatus)>,
    ) -> TxOutcome {
        let outcome = match &tx.payload {
            TxPayload::RecordVisit(p) => {
                assets.visits.insert(
                    p.record_id.clone(),
                    Visit {
                        record_id: p.record_id.clone(),
                        record_hash: p.record_hash.clone(),
                    },
                );
                TxOutcome::VisitRecorded
            }
            TxPayload::CreateReferral(p) => create_referral(assets, p, now),
            TxPayload::SubmitClaim(p) => self.submit_claim(assets, tx, p, now, notices),
            TxPayload::ExecuteClaim(p) => execute_claim(assets, p, notices),
        };
        tracing::debug!(tx = %tx.id, kind = %tx.kind(), ?outcome, "transaction applied");
        outcome
    }

    fn submit_claim(
        &self,
        assets: &mut Assets,
        tx: &Transaction,
        p: &SubmitClaimPayload,
        now: Timestamp,
        notices: &mut Vec<(String, ClaimStatus)>,
    ) -> TxOutcome {
        if assets.claims.contains_key(&p.claim_id) {
            return TxOutcome::DuplicateAsset;
        }

        let mut claim = ClaimAsset {
            claim_id: p.claim_id.clone(),
            referral_id: p.referral_id.clone().filter(|id| !id.is_empty()),
            faskes_id: tx.sender_id.clone(),
            record_id: p.record_id.clone(),
            record_hash: p.record_hash.clone(),
            diagnosis_code: p.diagnosis_code.clone(),
            amount: 0,
            status: ClaimStatus::Rejected,
            timestamp: tx.timestamp,
        };

        if let Some(referral_id) = claim.referral_id.clone() {
            if let Err(reason) = consume_referral(assets, &referral_id, now) {
                return reject(assets, claim, reason, notices);
            }
        }

        match self.eligibility.verify_claim(&p.diagnosis_code) {
            Ok(decision) if decision.eligible => {
                claim.status = ClaimStatus::Pending;
                claim.amount = decision.amount;
                assets.claims.insert(claim.claim_id.clone(), claim);
                TxOutcome::ClaimPending {
                    amount: decision.amount,
                }
            }
            Ok(_) => reject(assets, claim, RejectReason::Ineligible, notices),
            Err(e) => reject(
                assets,
                claim,
                RejectReason::EligibilityError(e.to_string()),
                notices,
            ),
        }
    }
}

fn create_referral(assets: &mut Assets, p: &ReferralPayload, now: Timestamp) -> TxOutcome {
    if assets.referrals.contains_key(&p.referral_id) {
        return TxOutcome::DuplicateAsset;
    }
    assets.referrals.insert(
        p.referral_id.clone(),
        ReferralAsset {
            id: p.referral_id.clone(),
            patient_id: p.patient_id.clone(),
            origin_faskes_id: p.origin_faskes_id.clone(),
            target_faskes_id: p.target_faskes_id.clone(),
            record_id: p.record_id.clone(),
            record_hash: p.record_hash.clone(),
            status: ReferralStatus::Active,
            issue_date: now,
            expiry_date: now.plus_secs(REFERRAL_VALIDITY_SECS),
        },
    );
    TxOutcome::ReferralCreated
}

/// Mark an ACTIVE, unexpired referral USED. An ACTIVE referral found past
/// its expiry is moved to EXPIRED.
fn consume_referral(assets: &mut Assets, id: &str, now: Timestamp) -> Result<(), RejectReason> {
    let referral = assets
        .referrals
        .get_mut(id)
        .ok_or(RejectReason::ReferralNotFound)?;
    if referral.status != ReferralStatus::Active {
        return Err(RejectReason::ReferralNotActive(referral.status));
    }
    if referral.expiry_date.is_before(now) {
        referral.status = ReferralStatus::Expired;
        return Err(RejectReason::ReferralExpired);
    }
    referral.status = ReferralStatus::Used;
    Ok(())
}

fn reject(
    assets: &mut Assets,
    mut claim: ClaimAsset,
    reason: RejectReason,
    notices: &mut Vec<(String, ClaimStatus)>,
) -> TxOutcome {
    claim.status = ClaimStatus::Rejected;
    claim.amount = 0;
    notices.push((claim.claim_id.clone(), ClaimStatus::Rejected));
    assets.claims.insert(claim.claim_id.clone(), claim);
    TxOutcome::ClaimRejected(reason)
}

fn execute_claim(
    assets: &mut Assets,
    p: &ExecuteClaimPayload,
    notices: &mut Vec<(String, ClaimStatus)>,
) -> TxOutcome {
    let Some(claim) = assets.claims.get_mut(&p.claim_id) else {
        tracing::warn!(claim = %p.claim_id, "execute for unknown claim");
        return TxOutcome::ClaimNotFound;
    };
    if claim.status.is_terminal() {
        return TxOutcome::ClaimAlreadyFinal(claim.status);
    }
    if !p.decision.is_terminal() {
        return TxOutcome::InvalidDecision(p.decision);
    }
    claim.status = p.decision;
    notices.push((claim.claim_id.clone(), p.decision));
    TxOutcome::ClaimDecided(p.decision)
}
