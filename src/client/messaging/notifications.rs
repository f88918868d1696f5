//! Notification Counter
//!
//! Per-ticket unread counts derived from the conversation store. A message is
//! unread when the current user is its receiver and it has no `seen_at`,
//! local optimistic marks included.

use std::collections::HashMap;

use super::store::ConversationStore;
use crate::shared::messaging::{ChatMessage, TicketId, UserId};

/// Count unread messages for `user`
pub fn count_unread(messages: &[ChatMessage], user: UserId) -> usize {
    messages.iter().filter(|m| m.is_unseen_by(user)).count()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationCounter {
    counts: HashMap<TicketId, usize>,
    total: usize,
}

impl NotificationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recount the tickets the store marked dirty. Returns those whose count
    /// changed.
    pub fn refresh(&mut self, store: &mut ConversationStore) -> Vec<TicketId> {
        let user = store.user_id();
        let mut changed = Vec::new();
        for ticket_id in store.take_dirty() {
            let count = count_unread(&store.conversation(ticket_id), user);
            let previous = self.set(ticket_id, count);
            if previous != count {
                changed.push(ticket_id);
            }
        }
        if !changed.is_empty() {
            tracing::debug!("[CHAT] Unread total now {}", self.total);
        }
        changed
    }

    /// Rebuild every count from scratch
    pub fn recompute_all(&mut self, store: &ConversationStore) {
        let user = store.user_id();
        self.counts = store
            .tickets()
            .into_iter()
            .map(|ticket_id| (ticket_id, count_unread(&store.conversation(ticket_id), user)))
            .filter(|(_, count)| *count > 0)
            .collect();
        self.total = self.counts.values().sum();
    }

    pub fn unread_count(&self, ticket_id: TicketId) -> usize {
        self.counts.get(&ticket_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Tickets with unread messages
    pub fn unread_tickets(&self) -> Vec<(TicketId, usize)> {
        let mut tickets: Vec<(TicketId, usize)> = self.counts.iter().map(|(t, c)| (*t, *c)).collect();
        tickets.sort();
        tickets
    }

    fn set(&mut self, ticket_id: TicketId, count: usize) -> usize {
        let previous = if count == 0 {
            self.counts.remove(&ticket_id)
        } else {
            self.counts.insert(ticket_id, count)
        }
        .unwrap_or(0);
        self.total = self.total - previous + count;
        previous
    }
}
