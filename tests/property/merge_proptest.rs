//! Property-based tests for the three-way merge
//!
//! Uses proptest to generate random history, live and pending sets

use proptest::prelude::*;
use ticketchat::client::messaging::reconciliation::merge;
use ticketchat::shared::messaging::ChatMessage;

use crate::common::*;

fn confirmed() -> impl Strategy<Value = ChatMessage> {
    (0i64..12, 0i64..50).prop_map(|(id, secs)| received(id, secs))
}

fn pending() -> impl Strategy<Value = ChatMessage> {
    (0u64..12, 0i64..50).prop_map(|(cid, secs)| outgoing(cid, secs))
}

proptest! {
    #[test]
    fn test_merge_is_chronological(
        history in prop::collection::vec(confirmed(), 0..10),
        live in prop::collection::vec(confirmed(), 0..10),
        pending in prop::collection::vec(pending(), 0..10),
    ) {
        let merged = merge(&history, &live, &pending);
        for pair in merged.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_merge_has_no_duplicates(
        history in prop::collection::vec(confirmed(), 0..10),
        live in prop::collection::vec(confirmed(), 0..10),
        pending in prop::collection::vec(pending(), 0..10),
    ) {
        let merged = merge(&history, &live, &pending);
        assert_no_duplicates(&merged);
        prop_assert!(merged.len() <= history.len() + live.len() + pending.len());
    }

    #[test]
    fn test_echoed_pending_is_hidden(cid in 0u64..1000, id in 1i64..10_000, secs in 0i64..50) {
        let local = outgoing(cid, secs);
        let merged = merge(&[], &[echo(&local, id)], &[local]);
        prop_assert_eq!(merged.len(), 1);
        prop_assert_eq!(merged[0].id, Some(id));
    }
}
