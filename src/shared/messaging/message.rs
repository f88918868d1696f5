//! Chat Message Data Structure
//!
//! A message on a ticket conversation, in the same shape whether it came from
//! the REST history endpoint, the live subscription, or was created locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ticket::TicketId;

/// User identifier (staff member or client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated id used to match an optimistic send with its server echo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Largest id a double-based JSON peer reads back exactly (2^53 - 1)
    pub const MAX: u64 = (1 << 53) - 1;

    /// Generate a fresh random correlation id in `0..=MAX`
    pub fn random() -> Self {
        Self(rand::random::<u64>() >> 11)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who may read a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Internal note between staff
    StaffOnly,
    /// Visible to the ticket's client
    Client,
}

impl Visibility {
    /// Wire name, as used in form fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::StaffOnly => "STAFF_ONLY",
            Visibility::Client => "CLIENT",
        }
    }
}

/// Client-side delivery tag of a message that has no server id yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Added locally; publish failed or has not happened
    Unsent,
    /// Handed to the broker, waiting for the echo
    Sent,
}

/// Represents a chat message on a ticket
///
/// `id` is `None` until the server acknowledges the message. `status` is never
/// serialized: it only exists on locally created messages and is cleared by
/// [`ChatMessage::confirm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned id
    pub id: Option<i64>,
    /// Client-generated correlation id
    pub correlation_id: CorrelationId,
    /// Text body, or a resource reference when `is_image` is set
    pub text: String,
    /// When the message was written
    pub timestamp: DateTime<Utc>,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub ticket_id: TicketId,
    pub visibility: Visibility,
    /// When the receiver saw the message
    pub seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_image: bool,
    #[serde(skip)]
    pub status: Option<DeliveryStatus>,
}

impl ChatMessage {
    /// Create a new outgoing text message in the `Unsent` state
    pub fn outgoing(
        ticket_id: TicketId,
        sender_id: UserId,
        receiver_id: UserId,
        text: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: None,
            correlation_id: CorrelationId::random(),
            text: text.into(),
            timestamp: Utc::now(),
            sender_id,
            receiver_id,
            ticket_id,
            visibility,
            seen_at: None,
            is_image: false,
            status: Some(DeliveryStatus::Unsent),
        }
    }

    /// Replace the random correlation id
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Whether the server has acknowledged this message
    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this is an optimistic local message
    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    /// Attach the server id. Pending → confirmed happens once; a confirmed
    /// message keeps its original id.
    pub fn confirm(&mut self, id: i64) {
        if self.id.is_none() {
            self.id = Some(id);
        }
        self.status = None;
    }

    /// Whether `user` received this message and has not seen it
    pub fn is_unseen_by(&self, user: UserId) -> bool {
        self.receiver_id == user && self.seen_at.is_none()
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.is_image {
            return "[image]".to_string();
        }
        if self.text.chars().count() <= max_len {
            self.text.clone()
        } else {
            let mut preview: String = self.text.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}
