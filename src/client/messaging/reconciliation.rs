//! # Reconciliation
//!
//! Pure functions behind the conversation store. A ticket's conversation is
//! built from three sources:
//!
//! - **history**: confirmed messages loaded over REST
//! - **live**: confirmed messages pushed on the subscription
//! - **pending**: optimistic local sends that have no server id yet
//!
//! [`merge`] combines them into one ordered, deduplicated list. Confirmation
//! of a pending message is keyed by correlation id and happens at most once;
//! redelivery of the same server id only ever updates the stored copy.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::shared::messaging::{ChatMessage, CorrelationId};

/// Result of storing a confirmed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New server id
    Inserted,
    /// Known server id, stored copy replaced by the server's newer value
    Updated,
    /// Known server id, identical copy
    Unchanged,
}

/// Merge the three sources of one ticket into its visible conversation.
///
/// History is taken first, then live messages whose server id is not already
/// present, then pending messages whose correlation id no confirmed message
/// carries. The result is stably sorted by timestamp, so ties keep the order
/// history, live, pending, then insertion order.
pub fn merge(history: &[ChatMessage], live: &[ChatMessage], pending: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut ids: HashSet<i64> = HashSet::new();
    let mut echoed: HashSet<CorrelationId> = HashSet::new();
    let mut merged = Vec::with_capacity(history.len() + live.len() + pending.len());

    for message in history.iter().chain(live) {
        if let Some(id) = message.id {
            if !ids.insert(id) {
                continue;
            }
        }
        echoed.insert(message.correlation_id);
        merged.push(message.clone());
    }

    for message in pending {
        if echoed.insert(message.correlation_id) {
            merged.push(message.clone());
        }
    }

    merged.sort_by_key(|message| message.timestamp);
    merged
}

/// Fill in locally recorded seen marks. A server `seen_at` always wins.
pub fn apply_seen_overlay(messages: &mut [ChatMessage], local_seen: &HashMap<i64, DateTime<Utc>>) {
    if local_seen.is_empty() {
        return;
    }
    for message in messages.iter_mut().filter(|m| m.seen_at.is_none()) {
        if let Some(seen_at) = message.id.and_then(|id| local_seen.get(&id)) {
            message.seen_at = Some(*seen_at);
        }
    }
}

/// Remove the pending message with `correlation_id`. Returns it the first
/// time; later calls find nothing, which makes redelivery a no-op.
pub fn confirm_pending(pending: &mut Vec<ChatMessage>, correlation_id: CorrelationId) -> Option<ChatMessage> {
    let index = pending
        .iter()
        .position(|m| m.correlation_id == correlation_id)?;
    Some(pending.remove(index))
}

/// Combine two seen marks of the same message. A mark never goes back to
/// unseen, and of two marks the earlier one is kept, so the result does not
/// depend on which copy or receipt arrived first.
pub fn earliest_seen(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Store a confirmed message in `list`, keyed by server id. A redelivered
/// copy replaces the stored one but keeps its seen mark.
pub fn upsert_confirmed(list: &mut Vec<ChatMessage>, mut message: ChatMessage) -> Upsert {
    message.status = None;
    match list.iter_mut().find(|m| m.id.is_some() && m.id == message.id) {
        Some(existing) => {
            message.seen_at = earliest_seen(existing.seen_at, message.seen_at);
            if *existing == message {
                return Upsert::Unchanged;
            }
            *existing = message;
            Upsert::Updated
        }
        None => {
            list.push(message);
            Upsert::Inserted
        }
    }
}
