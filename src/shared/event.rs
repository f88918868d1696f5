//! Inbound Event Types
//!
//! Everything the subscription delivers to the conversation store travels as
//! an [`InboundEvent`] over a channel, together with reports of chat messages
//! the session task could not hand to the broker. Tests feed synthetic events
//! the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::DecodeError;
use crate::shared::messaging::{ChatMessage, CorrelationId, TicketId};

/// Server broadcast that a confirmed message was seen by its receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeenReceipt {
    pub message_id: i64,
    pub seen_at: DateTime<Utc>,
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
}

/// Payload shapes accepted on the inbound destination
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundPayload {
    Seen(SeenReceipt),
    Message(ChatMessage),
}

/// Event delivered from the subscription to the store
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A confirmed message was pushed (new, echo of our own send, or an update)
    Message(ChatMessage),
    /// A seen receipt was pushed
    Seen(SeenReceipt),
    /// A frame could not be decoded and was discarded
    DecodeError(DecodeError),
    /// A queued chat message was dropped before it reached the broker
    PublishFailed(CorrelationId),
}

impl InboundEvent {
    /// Decode a frame body received on `destination`
    pub fn decode(destination: &str, body: &str) -> Result<Self, DecodeError> {
        let payload: InboundPayload = serde_json::from_str(body)
            .map_err(|e| DecodeError::new(destination, e.to_string()))?;
        match payload {
            InboundPayload::Seen(receipt) => Ok(Self::Seen(receipt)),
            InboundPayload::Message(message) if message.id.is_none() => Err(DecodeError::new(
                destination,
                "pushed message has no server id",
            )),
            InboundPayload::Message(message) => Ok(Self::Message(message)),
        }
    }

    /// Ticket the event concerns, when known
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            InboundEvent::Message(message) => Some(message.ticket_id),
            InboundEvent::Seen(receipt) => receipt.ticket_id,
            InboundEvent::DecodeError(_) | InboundEvent::PublishFailed(_) => None,
        }
    }
}
