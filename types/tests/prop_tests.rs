use proptest::prelude::*;

use sehat_types::{
    BlockHeader, Hash32, Timestamp, Transaction, TxError, TxPayload, VisitPayload,
};

fn visit_tx(id: String, sender: String, record: String) -> Transaction {
    Transaction {
        id,
        timestamp: Timestamp::new(1_700_000_000),
        sender_id: sender,
        signature: "sig".into(),
        payload: TxPayload::RecordVisit(VisitPayload {
            record_id: record,
            record_hash: "h".into(),
        }),
    }
}

proptest! {
    /// Hash32::is_zero is true only for all-zero bytes.
    #[test]
    fn hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        prop_assert_eq!(Hash32::new(bytes).is_zero(), bytes == [0u8; 32]);
    }

    /// Hashes travel as lowercase hex and parse back unchanged.
    #[test]
    fn hash_hex_is_lossless(bytes in prop::array::uniform32(0u8..)) {
        let hash = Hash32::new(bytes);
        let hex = hash.to_hex();
        prop_assert_eq!(hex.len(), 64);
        prop_assert_eq!(Hash32::from_hex(&hex).unwrap(), hash);
    }

    /// plus_secs never wraps and keeps ordering.
    #[test]
    fn timestamp_plus_secs_is_monotonic(start in any::<u64>(), delta in any::<u64>()) {
        let t = Timestamp::new(start);
        let later = t.plus_secs(delta);
        prop_assert!(later >= t);
        prop_assert_eq!(later.as_secs(), start.saturating_add(delta));
    }

    /// A timestamp is "before" exactly the instants strictly after it.
    #[test]
    fn timestamp_is_before_matches_ordering(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(Timestamp::new(a).is_before(Timestamp::new(b)), b > a);
    }

    /// Any transaction with non-blank fields is well-formed; blanking the
    /// sender always fails with the sender field named.
    #[test]
    fn well_formedness_tracks_blank_fields(
        id in "[a-z0-9-]{1,16}",
        sender in "[a-z0-9-]{1,16}",
        record in "[a-z0-9-]{1,16}",
    ) {
        let tx = visit_tx(id.clone(), sender, record.clone());
        prop_assert!(tx.check_well_formed().is_ok());

        let blank = visit_tx(id, "  ".into(), record);
        prop_assert_eq!(blank.check_well_formed(), Err(TxError::EmptyField("sender_id")));
    }

    /// Header canonical bytes change whenever the height changes.
    #[test]
    fn header_bytes_bind_height(h1 in any::<u64>(), h2 in any::<u64>()) {
        prop_assume!(h1 != h2);
        let header = |height| BlockHeader {
            height,
            timestamp: Timestamp::new(0),
            prev_hash: Hash32::ZERO,
            state_root: Hash32::ZERO,
            tx_root: Hash32::ZERO,
            proposer_id: "v1".into(),
        };
        prop_assert_ne!(header(h1).canonical_bytes(), header(h2).canonical_bytes());
    }
}
