//! Conversation Store
//!
//! Per-ticket message state for one logged-in user. Mutated only by inbound
//! events and by local sends and seen marks made through the chat session.
//! Every mutation records the ticket as dirty so the notification counter can
//! refresh incrementally.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::reconciliation::{self, Upsert};
use crate::shared::event::{InboundEvent, SeenReceipt};
use crate::shared::messaging::{ChatMessage, CorrelationId, DeliveryStatus, TicketId, UserId};

/// What applying a live message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// New message from someone else, or from another session of ours
    Inserted,
    /// Echo of a local pending message, which is now confirmed
    Confirmed,
    /// Newer server copy of a known message
    Updated,
    /// Redelivery of a known message
    Duplicate,
    /// No server id; cannot be stored as confirmed
    Ignored,
}

/// The three sources of one ticket plus local seen marks
#[derive(Debug, Default)]
struct Thread {
    history: Vec<ChatMessage>,
    live: Vec<ChatMessage>,
    pending: Vec<ChatMessage>,
    local_seen: HashMap<i64, DateTime<Utc>>,
}

impl Thread {
    fn merged(&self) -> Vec<ChatMessage> {
        let mut messages = reconciliation::merge(&self.history, &self.live, &self.pending);
        reconciliation::apply_seen_overlay(&mut messages, &self.local_seen);
        messages
    }

    fn confirmed_mut(&mut self, id: i64) -> Option<&mut ChatMessage> {
        self.history
            .iter_mut()
            .chain(self.live.iter_mut())
            .find(|m| m.id == Some(id))
    }

    fn confirmed(&self, id: i64) -> Option<&ChatMessage> {
        self.history
            .iter()
            .chain(self.live.iter())
            .find(|m| m.id == Some(id))
    }
}

#[derive(Debug)]
pub struct ConversationStore {
    user_id: UserId,
    threads: BTreeMap<TicketId, Thread>,
    /// Server id → ticket, for seen receipts that carry no ticket id
    message_tickets: HashMap<i64, TicketId>,
    /// Seen receipts that arrived before their message
    early_seen: HashMap<i64, DateTime<Utc>>,
    selected: Option<TicketId>,
    dirty: HashSet<TicketId>,
}

impl ConversationStore {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            threads: BTreeMap::new(),
            message_tickets: HashMap::new(),
            early_seen: HashMap::new(),
            selected: None,
            dirty: HashSet::new(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Change the visible ticket. Other tickets keep their state.
    pub fn select(&mut self, ticket_id: TicketId) -> bool {
        let changed = self.selected != Some(ticket_id);
        self.selected = Some(ticket_id);
        self.threads.entry(ticket_id).or_default();
        changed
    }

    pub fn selected(&self) -> Option<TicketId> {
        self.selected
    }

    /// Tickets with any state, in id order
    pub fn tickets(&self) -> Vec<TicketId> {
        self.threads.keys().copied().collect()
    }

    /// Replace the confirmed history of a ticket. Live messages and pending
    /// echoes the history already covers are dropped.
    pub fn load_history(&mut self, ticket_id: TicketId, history: Vec<ChatMessage>) {
        let history: Vec<ChatMessage> = history
            .into_iter()
            .filter(|m| m.ticket_id == ticket_id)
            .map(|mut m| {
                m.status = None;
                if let Some(seen_at) = m.id.and_then(|id| self.early_seen.remove(&id)) {
                    m.seen_at = reconciliation::earliest_seen(m.seen_at, Some(seen_at));
                }
                m
            })
            .collect();
        for id in history.iter().filter_map(|m| m.id) {
            self.message_tickets.insert(id, ticket_id);
        }

        let thread = self.threads.entry(ticket_id).or_default();
        let ids: HashSet<i64> = history.iter().filter_map(|m| m.id).collect();
        let echoed: HashSet<CorrelationId> = history.iter().map(|m| m.correlation_id).collect();
        thread.live.retain(|m| m.id.is_some_and(|id| !ids.contains(&id)));
        thread.pending.retain(|m| !echoed.contains(&m.correlation_id));
        for message in history.iter().filter(|m| m.seen_at.is_some()) {
            if let Some(id) = message.id {
                thread.local_seen.remove(&id);
            }
        }

        tracing::debug!(
            "[CHAT] Ticket {}: {} history, {} live, {} pending",
            ticket_id,
            history.len(),
            thread.live.len(),
            thread.pending.len()
        );
        thread.history = history;
        self.dirty.insert(ticket_id);
    }

    /// Add an optimistic local message. Returns `false` for a confirmed
    /// message or a correlation id that is already pending or echoed.
    pub fn insert_pending(&mut self, mut message: ChatMessage) -> bool {
        if message.is_confirmed() {
            return false;
        }
        let ticket_id = message.ticket_id;
        let thread = self.threads.entry(ticket_id).or_default();
        let cid = message.correlation_id;
        let known = thread
            .history
            .iter()
            .chain(thread.live.iter())
            .chain(thread.pending.iter())
            .any(|m| m.correlation_id == cid);
        if known {
            return false;
        }
        message.status.get_or_insert(DeliveryStatus::Unsent);
        thread.pending.push(message);
        self.dirty.insert(ticket_id);
        true
    }

    /// Record that a pending message reached the broker
    pub fn mark_sent(&mut self, ticket_id: TicketId, correlation_id: CorrelationId) -> bool {
        self.set_status(ticket_id, correlation_id, DeliveryStatus::Sent)
    }

    /// Put a pending message back to `Unsent`
    pub fn mark_unsent(&mut self, ticket_id: TicketId, correlation_id: CorrelationId) -> bool {
        self.set_status(ticket_id, correlation_id, DeliveryStatus::Unsent)
    }

    fn set_status(&mut self, ticket_id: TicketId, correlation_id: CorrelationId, status: DeliveryStatus) -> bool {
        let Some(message) = self
            .threads
            .get_mut(&ticket_id)
            .and_then(|t| t.pending.iter_mut().find(|m| m.correlation_id == correlation_id))
        else {
            return false;
        };
        message.status = Some(status);
        true
    }

    /// Drop a pending message, e.g. after a failed publish
    pub fn remove_pending(&mut self, ticket_id: TicketId, correlation_id: CorrelationId) -> Option<ChatMessage> {
        let removed = self
            .threads
            .get_mut(&ticket_id)
            .and_then(|t| reconciliation::confirm_pending(&mut t.pending, correlation_id));
        if removed.is_some() {
            self.dirty.insert(ticket_id);
        }
        removed
    }

    /// Pending messages of a ticket, in send order
    pub fn pending(&self, ticket_id: TicketId) -> &[ChatMessage] {
        self.threads
            .get(&ticket_id)
            .map(|t| t.pending.as_slice())
            .unwrap_or_default()
    }

    /// Find a pending message in any ticket
    pub fn find_pending(&self, correlation_id: CorrelationId) -> Option<&ChatMessage> {
        self.threads
            .values()
            .flat_map(|t| t.pending.iter())
            .find(|m| m.correlation_id == correlation_id)
    }

    /// Apply a confirmed message pushed on the subscription
    pub fn apply_live(&mut self, mut message: ChatMessage) -> LiveOutcome {
        let Some(id) = message.id else {
            tracing::warn!("[CHAT] Ignoring live message without server id");
            return LiveOutcome::Ignored;
        };
        let ticket_id = message.ticket_id;
        self.message_tickets.insert(id, ticket_id);
        if let Some(seen_at) = self.early_seen.remove(&id) {
            message.seen_at = reconciliation::earliest_seen(message.seen_at, Some(seen_at));
        }
        let thread = self.threads.entry(ticket_id).or_default();

        let confirmed = reconciliation::confirm_pending(&mut thread.pending, message.correlation_id).is_some();

        let in_history = thread.history.iter().any(|m| m.id == Some(id));
        let target = if in_history {
            &mut thread.history
        } else {
            &mut thread.live
        };
        let upsert = reconciliation::upsert_confirmed(target, message);
        if thread.confirmed(id).is_some_and(|m| m.seen_at.is_some()) {
            thread.local_seen.remove(&id);
        }

        let outcome = match (confirmed, upsert) {
            (true, _) => LiveOutcome::Confirmed,
            (false, Upsert::Inserted) => LiveOutcome::Inserted,
            (false, Upsert::Updated) => LiveOutcome::Updated,
            (false, Upsert::Unchanged) => LiveOutcome::Duplicate,
        };
        if outcome != LiveOutcome::Duplicate {
            self.dirty.insert(ticket_id);
        }
        tracing::debug!("[CHAT] Live message {} on ticket {}: {:?}", id, ticket_id, outcome);
        outcome
    }

    /// Apply a server seen receipt. Returns the ticket it changed. A receipt
    /// for a message not stored yet is kept and applied when it arrives.
    pub fn apply_seen(&mut self, receipt: &SeenReceipt) -> Option<TicketId> {
        let id = receipt.message_id;
        let ticket_id = receipt
            .ticket_id
            .or_else(|| self.message_tickets.get(&id).copied());
        let thread = match ticket_id {
            Some(ticket_id) => self.threads.get_mut(&ticket_id),
            None => None,
        };
        let message = thread.and_then(|t| {
            t.local_seen.remove(&id);
            t.confirmed_mut(id)
        });
        let (Some(ticket_id), Some(message)) = (ticket_id, message) else {
            tracing::debug!("[CHAT] Holding seen receipt for unknown message {}", id);
            let held = self.early_seen.get(&id).copied();
            if let Some(seen_at) = reconciliation::earliest_seen(held, Some(receipt.seen_at)) {
                self.early_seen.insert(id, seen_at);
            }
            return None;
        };

        let seen_at = reconciliation::earliest_seen(message.seen_at, Some(receipt.seen_at));
        if message.seen_at == seen_at {
            return None;
        }
        message.seen_at = seen_at;
        self.dirty.insert(ticket_id);
        Some(ticket_id)
    }

    /// A publish never reached the broker. Puts the pending message back to
    /// `Unsent` and returns its ticket.
    pub fn publish_failed(&mut self, correlation_id: CorrelationId) -> Option<TicketId> {
        let ticket_id = self.find_pending(correlation_id)?.ticket_id;
        if !self.mark_unsent(ticket_id, correlation_id) {
            return None;
        }
        tracing::warn!("[CHAT] Message {} was not delivered, marked unsent", correlation_id);
        self.dirty.insert(ticket_id);
        Some(ticket_id)
    }

    /// Optimistically mark a received message seen. Returns the server id to
    /// publish, or `None` when there is nothing to do: no server id, not
    /// addressed to this user, or already seen.
    pub fn mark_seen_local(&mut self, message: &ChatMessage) -> Option<i64> {
        let id = message.id?;
        if message.receiver_id != self.user_id {
            return None;
        }
        let thread = self.threads.get_mut(&message.ticket_id)?;
        let stored = thread.confirmed(id)?;
        if stored.seen_at.is_some() || thread.local_seen.contains_key(&id) {
            return None;
        }
        thread.local_seen.insert(id, Utc::now());
        self.dirty.insert(message.ticket_id);
        Some(id)
    }

    /// Merged, ordered conversation of a ticket
    pub fn conversation(&self, ticket_id: TicketId) -> Vec<ChatMessage> {
        self.threads
            .get(&ticket_id)
            .map(Thread::merged)
            .unwrap_or_default()
    }

    /// Tickets changed since the last call
    pub fn take_dirty(&mut self) -> Vec<TicketId> {
        let mut dirty: Vec<TicketId> = self.dirty.drain().collect();
        dirty.sort();
        dirty
    }

    /// Apply one inbound event; returns the ticket whose conversation changed
    pub fn apply_event(&mut self, event: InboundEvent) -> Option<TicketId> {
        match event {
            InboundEvent::Message(message) => {
                let ticket_id = message.ticket_id;
                match self.apply_live(message) {
                    LiveOutcome::Duplicate | LiveOutcome::Ignored => None,
                    _ => Some(ticket_id),
                }
            }
            InboundEvent::Seen(receipt) => self.apply_seen(&receipt),
            InboundEvent::PublishFailed(correlation_id) => self.publish_failed(correlation_id),
            InboundEvent::DecodeError(e) => {
                tracing::warn!("[CHAT] Inbound frame discarded: {}", e);
                None
            }
        }
    }
}
