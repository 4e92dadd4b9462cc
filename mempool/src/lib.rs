//! Pending-transaction pool feeding block assembly.
//!
//! Transactions are keyed by id and kept in arrival order. Extraction for a
//! block does not remove anything; transactions leave the pool only when
//! the block that carries them commits.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sehat_types::Transaction;

#[derive(Default)]
struct Pool {
    by_id: HashMap<String, Transaction>,
    /// Arrival order. May hold ids removed since; they are skipped.
    order: VecDeque<String>,
}

#[derive(Default)]
pub struct Mempool {
    pool: Mutex<Pool>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `tx` at the back of the queue. Returns `false`, leaving the
    /// pool untouched, if a transaction with the same id is already pending.
    pub fn add(&self, tx: Transaction) -> bool {
        let mut pool = self.lock();
        if pool.by_id.contains_key(&tx.id) {
            return false;
        }
        pool.order.push_back(tx.id.clone());
        pool.by_id.insert(tx.id.clone(), tx);
        true
    }

    /// Up to `max` pending transactions in arrival order.
    pub fn extract(&self, max: usize) -> Vec<Transaction> {
        let pool = self.lock();
        pool.order
            .iter()
            .filter_map(|id| pool.by_id.get(id))
            .take(max)
            .cloned()
            .collect()
    }

    /// Drop the given transactions. Ids that are not pending are ignored.
    pub fn remove(&self, txs: &[Transaction]) {
        let mut pool = self.lock();
        let mut removed = false;
        for tx in txs {
            removed |= pool.by_id.remove(&tx.id).is_some();
        }
        if removed {
            let Pool { by_id, order } = &mut *pool;
            order.retain(|id| by_id.contains_key(id));
        }
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.lock().by_id.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sehat_types::{Timestamp, TxPayload, VisitPayload};
    use std::collections::HashSet;

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            timestamp: Timestamp::new(1),
            sender_id: "rs-1".into(),
            signature: "sig".into(),
            payload: TxPayload::RecordVisit(VisitPayload {
                record_id: format!("rm-{id}"),
                record_hash: "h".into(),
            }),
        }
    }

    fn ids(txs: &[Transaction]) -> Vec<&str> {
        txs.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn duplicate_add_is_noop() {
        let pool = Mempool::new();
        assert!(pool.add(tx("a")));
        assert!(!pool.add(tx("a")));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn extract_is_fifo_and_non_destructive() {
        let pool = Mempool::new();
        for id in ["a", "b", "c"] {
            pool.add(tx(id));
        }
        assert_eq!(ids(&pool.extract(2)), vec!["a", "b"]);
        assert_eq!(ids(&pool.extract(10)), vec!["a", "b", "c"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn remove_is_idempotent_and_keeps_order() {
        let pool = Mempool::new();
        for id in ["a", "b", "c", "d"] {
            pool.add(tx(id));
        }
        pool.remove(&[tx("b"), tx("zz")]);
        pool.remove(&[tx("b")]);

        assert_eq!(ids(&pool.extract(10)), vec!["a", "c", "d"]);
        assert!(!pool.contains("b"));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn removed_id_can_be_added_again_at_back() {
        let pool = Mempool::new();
        pool.add(tx("a"));
        pool.add(tx("b"));
        pool.remove(&[tx("a")]);
        assert!(pool.add(tx("a")));
        assert_eq!(ids(&pool.extract(10)), vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn no_duplicates_and_bounded_extract(
            adds in proptest::collection::vec(0u8..20, 0..60),
            k in 0usize..30,
        ) {
            let pool = Mempool::new();
            let mut first_seen = Vec::new();
            for n in &adds {
                let id = format!("t{n}");
                if !first_seen.contains(&id) {
                    first_seen.push(id.clone());
                }
                pool.add(tx(&id));
            }

            let all = pool.extract(usize::MAX);
            let unique: HashSet<&str> = ids(&all).into_iter().collect();
            prop_assert_eq!(unique.len(), all.len());
            prop_assert_eq!(all.len(), pool.len());

            let some = pool.extract(k);
            prop_assert_eq!(some.len(), k.min(pool.len()));
            let expected: Vec<&str> = first_seen.iter().take(k).map(String::as_str).collect();
            prop_assert_eq!(ids(&some), expected);
        }
    }
}
