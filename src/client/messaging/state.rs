//! Chat Session
//!
//! The surface the UI talks to. Owns the connection manager for the whole
//! application lifetime and, while logged in, the conversation store, the
//! notification counter, and the REST and publish clients for that session.
//! Everything is single-owner: the UI calls in through `&mut self` and pulls
//! inbound events with [`ChatSession::drain_events`].

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::notifications::NotificationCounter;
use super::store::ConversationStore;
use crate::client::config::Config;
use crate::client::connection::{ConnectionManager, ConnectionStatus, Connector};
use crate::client::publisher::Publisher;
use crate::client::rest::RestClient;
use crate::client::session::{Session, SessionStore};
use crate::shared::error::ChatError;
use crate::shared::event::InboundEvent;
use crate::shared::messaging::{
    ChatMessage, CorrelationId, TicketFilter, TicketId, TicketPage, UserId, Visibility,
};

/// State that exists only while logged in
struct ActiveChat {
    session: Session,
    store: ConversationStore,
    counter: NotificationCounter,
    rest: RestClient,
    publisher: Publisher,
}

pub struct ChatSession {
    config: Config,
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    sessions: Box<dyn SessionStore>,
    active: Option<ActiveChat>,
    is_loading: bool,
}

impl ChatSession {
    pub fn new(config: Config, connector: Arc<dyn Connector>, sessions: Box<dyn SessionStore>) -> Self {
        let (manager, events) = ConnectionManager::new(config.app().clone(), connector);
        Self {
            config,
            manager,
            events,
            sessions,
            active: None,
            is_loading: false,
        }
    }

    /// Log in, persist the session and start connecting
    pub async fn login(&mut self, session: Session) -> Result<(), ChatError> {
        if !session.is_valid() {
            return Err(ChatError::NotLoggedIn);
        }
        if self.active.is_some() {
            self.logout().await?;
        }
        self.sessions.save(&session)?;
        self.start(session).await
    }

    /// Log in from the persisted session. Returns `false` when none is stored.
    pub async fn resume(&mut self) -> Result<bool, ChatError> {
        match self.sessions.load()? {
            Some(session) if session.is_valid() => {
                tracing::info!("[CHAT] Resuming session for user {}", session.user_id);
                self.start(session).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn start(&mut self, session: Session) -> Result<(), ChatError> {
        let mut config = self.config.clone();
        config.set_token(Some(session.token.clone()));
        let rest = RestClient::new(config);
        let publisher = Publisher::new(self.manager.outbound(), rest.clone(), self.config.app());

        self.manager.login(&session).await?;
        tracing::info!("[CHAT] Logged in as user {}", session.user_id);
        self.active = Some(ActiveChat {
            store: ConversationStore::new(session.user_id),
            counter: NotificationCounter::new(),
            session,
            rest,
            publisher,
        });
        Ok(())
    }

    /// Disconnect, drop all conversation state and forget the stored session
    pub async fn logout(&mut self) -> Result<(), ChatError> {
        self.shutdown().await;
        self.sessions.clear()?;
        Ok(())
    }

    /// Disconnect and drop all conversation state. The stored session stays,
    /// so the next run can `resume`.
    pub async fn shutdown(&mut self) {
        self.manager.logout().await;
        while self.events.try_recv().is_ok() {}
        if let Some(active) = self.active.take() {
            tracing::info!("[CHAT] User {} logged out", active.session.user_id);
        }
        self.is_loading = false;
    }

    pub fn is_logged_in(&self) -> bool {
        self.active.is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.active.as_ref().map(|a| a.session.user_id)
    }

    pub fn connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_status()
    }

    /// Whether a history fetch or upload is in flight
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    fn active(&self) -> Result<&ActiveChat, ChatError> {
        self.active.as_ref().ok_or(ChatError::NotLoggedIn)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveChat, ChatError> {
        self.active.as_mut().ok_or(ChatError::NotLoggedIn)
    }

    pub fn select_ticket(&mut self, ticket_id: TicketId) -> Result<(), ChatError> {
        let active = self.active_mut()?;
        if active.store.select(ticket_id) {
            tracing::debug!("[CHAT] Selected ticket {}", ticket_id);
        }
        Ok(())
    }

    pub fn selected_ticket(&self) -> Option<TicketId> {
        self.active.as_ref().and_then(|a| a.store.selected())
    }

    /// One page of the ticket list
    pub async fn fetch_tickets(&mut self, filter: &TicketFilter) -> Result<TicketPage, ChatError> {
        let rest = self.active()?.rest.clone();
        self.is_loading = true;
        let result = rest.fetch_tickets(filter).await;
        self.is_loading = false;
        Ok(result?)
    }

    /// Replace a ticket's history from the server. Returns the number of
    /// messages loaded.
    pub async fn load_history(&mut self, ticket_id: TicketId) -> Result<usize, ChatError> {
        let rest = self.active()?.rest.clone();
        self.is_loading = true;
        let result = rest.fetch_ticket_history(ticket_id).await;
        self.is_loading = false;
        let history = result?;

        let count = history.len();
        let active = self.active_mut()?;
        active.store.load_history(ticket_id, history);
        active.counter.refresh(&mut active.store);
        Ok(count)
    }

    /// Pull every message of the logged-in user so unread counts cover all
    /// tickets, not only the ones opened so far
    pub async fn sync_user_history(&mut self) -> Result<usize, ChatError> {
        let (rest, user_id) = {
            let active = self.active()?;
            (active.rest.clone(), active.session.user_id)
        };
        self.is_loading = true;
        let result = rest.fetch_user_history(user_id).await;
        self.is_loading = false;
        let messages = result?;

        let count = messages.len();
        let active = self.active_mut()?;
        for message in messages {
            active.store.apply_live(message);
        }
        active.counter.refresh(&mut active.store);
        tracing::info!("[CHAT] Synced {} messages for user {}", count, user_id);
        Ok(count)
    }

    /// Merged conversation of a ticket
    pub fn conversation(&self, ticket_id: TicketId) -> Vec<ChatMessage> {
        self.active
            .as_ref()
            .map(|a| a.store.conversation(ticket_id))
            .unwrap_or_default()
    }

    pub fn unread_count(&self, ticket_id: TicketId) -> usize {
        self.active
            .as_ref()
            .map(|a| a.counter.unread_count(ticket_id))
            .unwrap_or(0)
    }

    pub fn total_unread(&self) -> usize {
        self.active.as_ref().map(|a| a.counter.total()).unwrap_or(0)
    }

    /// Tickets with unread messages and their counts
    pub fn unread_tickets(&self) -> Vec<(TicketId, usize)> {
        self.active
            .as_ref()
            .map(|a| a.counter.unread_tickets())
            .unwrap_or_default()
    }

    /// Rebuild every unread count from scratch
    pub fn recompute_unread(&mut self) -> Result<(), ChatError> {
        let active = self.active_mut()?;
        active.store.take_dirty();
        active.counter.recompute_all(&active.store);
        Ok(())
    }

    /// Build an outgoing message on the selected ticket
    pub fn compose(
        &self,
        text: impl Into<String>,
        receiver_id: UserId,
        visibility: Visibility,
    ) -> Result<ChatMessage, ChatError> {
        let active = self.active()?;
        let ticket_id = active.store.selected().ok_or(ChatError::NoTicketSelected)?;
        Ok(ChatMessage::outgoing(
            ticket_id,
            active.session.user_id,
            receiver_id,
            text,
            visibility,
        ))
    }

    /// Send a text message on the selected ticket
    pub fn send(
        &mut self,
        text: impl Into<String>,
        receiver_id: UserId,
        visibility: Visibility,
    ) -> Result<CorrelationId, ChatError> {
        let message = self.compose(text, receiver_id, visibility)?;
        let correlation_id = message.correlation_id;
        self.send_message(message)?;
        Ok(correlation_id)
    }

    /// Insert `message` optimistically and publish it. On a publish failure
    /// the message stays in the conversation as `Unsent` until it is retried
    /// or discarded.
    pub fn send_message(&mut self, message: ChatMessage) -> Result<(), ChatError> {
        let active = self.active_mut()?;
        let ticket_id = message.ticket_id;
        let correlation_id = message.correlation_id;
        if !active.store.insert_pending(message.clone()) {
            tracing::warn!("[CHAT] Message {} is already known", correlation_id);
            return Ok(());
        }
        active.counter.refresh(&mut active.store);

        match active.publisher.send_message(&message) {
            Ok(()) => {
                active.store.mark_sent(ticket_id, correlation_id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[CHAT] Message {} left unsent: {}", correlation_id, e);
                Err(e.into())
            }
        }
    }

    /// Publish a pending message again under the same correlation id
    pub fn retry(&mut self, correlation_id: CorrelationId) -> Result<(), ChatError> {
        let active = self.active_mut()?;
        let message = active
            .store
            .find_pending(correlation_id)
            .cloned()
            .ok_or(ChatError::UnknownMessage(correlation_id))?;
        let ticket_id = message.ticket_id;
        tracing::info!("[CHAT] Retrying message {}", correlation_id);

        match active.publisher.send_message(&message) {
            Ok(()) => {
                active.store.mark_sent(ticket_id, correlation_id);
                Ok(())
            }
            Err(e) => {
                active.store.mark_unsent(ticket_id, correlation_id);
                Err(e.into())
            }
        }
    }

    /// Drop a pending message
    pub fn discard(&mut self, correlation_id: CorrelationId) -> Result<ChatMessage, ChatError> {
        let active = self.active_mut()?;
        let ticket_id = active
            .store
            .find_pending(correlation_id)
            .map(|m| m.ticket_id)
            .ok_or(ChatError::UnknownMessage(correlation_id))?;
        let removed = active
            .store
            .remove_pending(ticket_id, correlation_id)
            .ok_or(ChatError::UnknownMessage(correlation_id))?;
        active.counter.refresh(&mut active.store);
        Ok(removed)
    }

    /// Pending messages of a ticket
    pub fn pending(&self, ticket_id: TicketId) -> Vec<ChatMessage> {
        self.active
            .as_ref()
            .map(|a| a.store.pending(ticket_id).to_vec())
            .unwrap_or_default()
    }

    /// Mark a received message seen. Returns `false` when there was nothing
    /// to mark (no server id, not ours, or already seen).
    pub fn mark_seen(&mut self, message: &ChatMessage) -> Result<bool, ChatError> {
        let active = self.active_mut()?;
        let Some(id) = active.store.mark_seen_local(message) else {
            return Ok(false);
        };
        active.counter.refresh(&mut active.store);
        if let Err(e) = active.publisher.send_seen(Some(id)) {
            tracing::warn!("[CHAT] Seen receipt for {} not published: {}", id, e);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Upload an image to the selected ticket
    pub async fn send_image(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        visibility: Visibility,
    ) -> Result<ChatMessage, ChatError> {
        let (publisher, ticket_id) = {
            let active = self.active()?;
            let ticket_id = active.store.selected().ok_or(ChatError::NoTicketSelected)?;
            (active.publisher.clone(), ticket_id)
        };
        self.is_loading = true;
        let result = publisher.send_image(ticket_id, visibility, file_name, bytes).await;
        self.is_loading = false;
        let message = result?;

        let active = self.active_mut()?;
        active.store.apply_live(message.clone());
        active.counter.refresh(&mut active.store);
        Ok(message)
    }

    /// Apply one inbound event. Returns the ticket whose conversation changed.
    pub fn apply_event(&mut self, event: InboundEvent) -> Option<TicketId> {
        let active = self.active.as_mut()?;
        let changed = active.store.apply_event(event);
        active.counter.refresh(&mut active.store);
        changed
    }

    /// Apply every event received so far. Returns the changed tickets.
    pub fn drain_events(&mut self) -> Vec<TicketId> {
        let mut changed = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Some(ticket_id) = self.apply_event(event) {
                if !changed.contains(&ticket_id) {
                    changed.push(ticket_id);
                }
            }
        }
        changed
    }

    /// Wait for the next inbound event that changes a conversation
    pub async fn next_change(&mut self) -> Option<TicketId> {
        loop {
            let event = self.events.recv().await?;
            if let Some(ticket_id) = self.apply_event(event) {
                return Some(ticket_id);
            }
        }
    }
}
