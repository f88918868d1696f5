//! Property-based tests for the conversation store
//!
//! Random interleavings of sends, echoes, pushes, history loads and seen
//! marks. After every step the conversation stays consistent and the
//! incremental unread count matches a recount from scratch. Server events
//! lead to the same state whatever order they arrive in.

use proptest::prelude::*;
use ticketchat::client::messaging::{ConversationStore, NotificationCounter};
use ticketchat::client::messaging::notifications::count_unread;
use ticketchat::shared::event::{InboundEvent, SeenReceipt};
use ticketchat::shared::messaging::{CorrelationId, TicketId};

use crate::common::*;

#[derive(Debug, Clone)]
enum Op {
    Send(u64, i64),
    Echo(u64),
    Push(i64, i64),
    ServerSeen(i64),
    MarkSeen(i64),
    Discard(u64),
    History(Vec<i64>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..8, 0i64..60).prop_map(|(cid, secs)| Op::Send(cid, secs)),
        (0u64..8).prop_map(Op::Echo),
        (0i64..8, 0i64..60).prop_map(|(id, secs)| Op::Push(id, secs)),
        (0i64..8).prop_map(Op::ServerSeen),
        (0i64..8).prop_map(Op::MarkSeen),
        (0u64..8).prop_map(Op::Discard),
        prop::collection::vec(0i64..8, 0..5).prop_map(Op::History),
    ]
}

/// What the server can push for one ticket
#[derive(Debug, Clone)]
enum ServerEvent {
    /// A copy of message `id`, optionally already carrying a seen mark
    Message { id: i64, seen: Option<i64> },
    /// A seen receipt for message `id`
    Seen { id: i64, secs: i64, with_ticket: bool },
}

fn server_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        (0i64..6, prop::option::of(0i64..100)).prop_map(|(id, seen)| ServerEvent::Message { id, seen }),
        (0i64..6, 0i64..100, any::<bool>())
            .prop_map(|(id, secs, with_ticket)| ServerEvent::Seen { id, secs, with_ticket }),
    ]
}

fn deliver(store: &mut ConversationStore, event: &ServerEvent) {
    match *event {
        ServerEvent::Message { id, seen } => {
            let mut message = received(id, id * 10);
            message.seen_at = seen.map(|secs| at(1000 + secs));
            store.apply_event(InboundEvent::Message(message));
        }
        ServerEvent::Seen { id, secs, with_ticket } => {
            store.apply_event(InboundEvent::Seen(SeenReceipt {
                message_id: id,
                seen_at: at(1000 + secs),
                ticket_id: with_ticket.then_some(TICKET),
            }));
        }
    }
}

/// Deliver `events` in order, refreshing the counter after each one
fn replay(events: &[ServerEvent]) -> (ConversationStore, NotificationCounter) {
    let mut store = ConversationStore::new(STAFF);
    let mut counter = NotificationCounter::new();
    for event in events {
        deliver(&mut store, event);
        counter.refresh(&mut store);
    }
    (store, counter)
}

fn apply(store: &mut ConversationStore, op: Op) {
    match op {
        Op::Send(cid, secs) => {
            store.insert_pending(outgoing(cid, secs));
        }
        Op::Echo(cid) => {
            let local = outgoing(cid, cid as i64);
            store.apply_event(InboundEvent::Message(echo(&local, 1000 + cid as i64)));
        }
        Op::Push(id, secs) => {
            store.apply_event(InboundEvent::Message(received(id, secs)));
        }
        Op::ServerSeen(id) => {
            store.apply_event(InboundEvent::Seen(SeenReceipt {
                message_id: id,
                seen_at: at(500),
                ticket_id: Some(TICKET),
            }));
        }
        Op::MarkSeen(id) => {
            let found = store
                .conversation(TICKET)
                .into_iter()
                .find(|m| m.id == Some(id));
            if let Some(message) = found {
                store.mark_seen_local(&message);
            }
        }
        Op::Discard(cid) => {
            store.remove_pending(TICKET, CorrelationId(cid));
        }
        Op::History(ids) => {
            store.load_history(TICKET, ids.into_iter().map(|id| received(id, id * 10)).collect());
        }
    }
}

proptest! {
    #[test]
    fn test_store_stays_consistent(ops in prop::collection::vec(op(), 0..40)) {
        let mut store = ConversationStore::new(STAFF);
        let mut counter = NotificationCounter::new();

        for op in ops {
            apply(&mut store, op);
            counter.refresh(&mut store);

            let conversation = store.conversation(TICKET);
            assert_chronological(&conversation);
            assert_no_duplicates(&conversation);

            let expected = count_unread(&conversation, STAFF);
            prop_assert_eq!(counter.unread_count(TICKET), expected);
            prop_assert_eq!(counter.total(), expected);

            let mut scratch = NotificationCounter::new();
            scratch.recompute_all(&store);
            prop_assert_eq!(&counter, &scratch);
        }
    }

    #[test]
    fn test_confirmation_is_idempotent(cid in 0u64..8, repeats in 1usize..5) {
        let mut store = ConversationStore::new(STAFF);
        let local = outgoing(cid, 0);
        store.insert_pending(local.clone());
        for _ in 0..repeats {
            store.apply_event(InboundEvent::Message(echo(&local, 1000 + cid as i64)));
        }
        let conversation = store.conversation(TICKET);
        prop_assert_eq!(conversation.len(), 1);
        prop_assert_eq!(conversation[0].id, Some(1000 + cid as i64));
        prop_assert!(store.pending(TICKET).is_empty());
    }

    #[test]
    fn test_delivery_order_does_not_matter(
        (events, shuffled) in prop::collection::vec(server_event(), 0..30)
            .prop_flat_map(|events| (Just(events.clone()), Just(events).prop_shuffle()))
    ) {
        let (store, counter) = replay(&events);
        let (other_store, other_counter) = replay(&shuffled);

        prop_assert_eq!(store.conversation(TICKET), other_store.conversation(TICKET));
        prop_assert_eq!(counter.unread_count(TICKET), other_counter.unread_count(TICKET));
        prop_assert_eq!(counter.total(), other_counter.total());
        prop_assert!(store.conversation(TicketId(99)).is_empty());
    }

    #[test]
    fn test_redelivery_never_unsees(id in 0i64..6, secs in 0i64..100, repeats in 1usize..4) {
        let mut events = vec![
            ServerEvent::Message { id, seen: None },
            ServerEvent::Seen { id, secs, with_ticket: true },
        ];
        events.extend((0..repeats).map(|_| ServerEvent::Message { id, seen: None }));
        let (store, counter) = replay(&events);

        let conversation = store.conversation(TICKET);
        prop_assert_eq!(conversation.len(), 1);
        prop_assert_eq!(conversation[0].seen_at, Some(at(1000 + secs)));
        prop_assert_eq!(counter.unread_count(TICKET), 0);
    }
}
