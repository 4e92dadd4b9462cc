//! Keyed collections of domain assets.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sehat_crypto::blake2b_256;
use sehat_types::{ClaimAsset, Hash32, ReferralAsset, Visit};

/// The asset maps. Mutable only through the executor's write guard.
#[derive(Debug, Default, Clone)]
pub struct Assets {
    pub(crate) visits: HashMap<String, Visit>,
    pub(crate) referrals: BTreeMap<String, ReferralAsset>,
    pub(crate) claims: BTreeMap<String, ClaimAsset>,
}

impl Assets {
    /// Fixed-field summary of every referral, then every claim, each in
    /// ascending id order.
    fn summary(&self) -> String {
        let mut out = String::new();
        for (id, r) in &self.referrals {
            let _ = write!(out, "{}:{}:{}|", id, r.record_hash, r.status);
        }
        for (id, c) in &self.claims {
            let _ = write!(out, "{}:{}:{}:{}|", id, c.record_hash, c.status, c.amount);
        }
        out
    }

    /// Content hash over referrals and claims. An empty state hashes to zero.
    pub fn state_hash(&self) -> Hash32 {
        let summary = self.summary();
        if summary.is_empty() {
            return Hash32::ZERO;
        }
        Hash32::new(blake2b_256(summary.as_bytes()))
    }
}

/// Shared world state. Readers take the shared lock; the executor holds
/// the exclusive lock for the whole of a block.
#[derive(Debug, Default)]
pub struct WorldState {
    assets: RwLock<Assets>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Assets> {
        self.assets.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Assets> {
        self.assets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state_hash(&self) -> Hash32 {
        self.read().state_hash()
    }

    pub fn get_visit(&self, record_id: &str) -> Option<Visit> {
        self.read().visits.get(record_id).cloned()
    }

    pub fn get_referral(&self, id: &str) -> Option<ReferralAsset> {
        self.read().referrals.get(id).cloned()
    }

    pub fn get_claim(&self, id: &str) -> Option<ClaimAsset> {
        self.read().claims.get(id).cloned()
    }

    /// Counts of visits, referrals and claims.
    pub fn sizes(&self) -> (usize, usize, usize) {
        let assets = self.read();
        (assets.visits.len(), assets.referrals.len(), assets.claims.len())
    }
}
