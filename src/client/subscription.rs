//! Subscription Registry
//!
//! Owns the single inbound subscription of the logged-in user and turns
//! MESSAGE frames into [`InboundEvent`]s on the store's channel.
//!
//! The registry is re-activated from the connection manager's on-connect hook
//! after every (re)connect. Activation always deactivates the previous
//! subscription first, so one identity never has two live subscriptions and no
//! message is delivered twice.

use crate::client::stomp::{Command, Frame};
use crate::shared::error::DecodeError;
use crate::shared::event::InboundEvent;
use crate::shared::messaging::UserId;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// An active subscription on one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
}

#[derive(Debug)]
pub struct SubscriptionRegistry {
    user_id: UserId,
    destination: String,
    active: Option<Subscription>,
    events: UnboundedSender<InboundEvent>,
}

impl SubscriptionRegistry {
    pub fn new(user_id: UserId, destination: String, events: UnboundedSender<InboundEvent>) -> Self {
        Self {
            user_id,
            destination,
            active: None,
            events,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn active(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    /// Frames to send on a fresh CONNECTED: UNSUBSCRIBE for any subscription
    /// still marked active, then exactly one SUBSCRIBE.
    pub fn activate(&mut self) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(2);
        if let Some(unsubscribe) = self.deactivate() {
            frames.push(unsubscribe);
        }
        let subscription = Subscription {
            id: format!("sub-{}", Uuid::new_v4()),
            destination: self.destination.clone(),
        };
        tracing::info!(
            "[STOMP] Subscribing user {} to {} ({})",
            self.user_id,
            subscription.destination,
            subscription.id
        );
        frames.push(Frame::subscribe(&subscription.id, &subscription.destination));
        self.active = Some(subscription);
        frames
    }

    /// UNSUBSCRIBE frame for the active subscription, if any
    pub fn deactivate(&mut self) -> Option<Frame> {
        self.active.take().map(|subscription| {
            tracing::debug!("[STOMP] Unsubscribing {}", subscription.id);
            Frame::unsubscribe(&subscription.id)
        })
    }

    /// The broker dropped the session, and with it the subscription
    pub fn session_lost(&mut self) {
        if let Some(subscription) = self.active.take() {
            tracing::debug!("[STOMP] Subscription {} ended with session", subscription.id);
        }
    }

    /// Decode a MESSAGE frame and forward the event. Frames for other
    /// subscriptions are dropped; undecodable frames become a `DecodeError`
    /// event. Returns `false` once the receiving side is gone.
    pub fn dispatch(&self, frame: &Frame) -> bool {
        if frame.command != Command::Message {
            return true;
        }
        let Some(active) = self.active.as_ref() else {
            tracing::debug!("[STOMP] Dropping MESSAGE with no active subscription");
            return true;
        };
        if frame.get_header("subscription").is_some_and(|id| id != active.id) {
            tracing::debug!("[STOMP] Dropping MESSAGE for stale subscription");
            return true;
        }

        let destination = frame.get_header("destination").unwrap_or(active.destination.as_str());
        let event = match InboundEvent::decode(destination, &frame.body) {
            Ok(event) => {
                tracing::debug!("[STOMP] Received event for ticket {:?}", event.ticket_id());
                event
            }
            Err(e) => {
                tracing::warn!("[STOMP] Discarding undecodable frame: {}", e);
                InboundEvent::DecodeError(e)
            }
        };
        self.forward(event)
    }

    /// Report a frame that failed at the codec level
    pub fn report_malformed(&self, reason: impl Into<String>) -> bool {
        let destination = self
            .active
            .as_ref()
            .map(|s| s.destination.clone())
            .unwrap_or_default();
        self.forward(InboundEvent::DecodeError(DecodeError::new(destination, reason)))
    }

    fn forward(&self, event: InboundEvent) -> bool {
        if self.events.send(event).is_err() {
            tracing::error!("[STOMP] Inbound event receiver dropped");
            return false;
        }
        true
    }
}
