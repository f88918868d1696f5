//! Outbound Publisher
//!
//! Serializes chat messages and seen receipts onto the live STOMP session,
//! and uploads images through the REST side channel.

use crate::client::connection::{ConnectionStatus, OutboundHandle};
use crate::client::rest::RestClient;
use crate::client::stomp::Frame;
use crate::shared::config::AppConfig;
use crate::shared::error::{PublishError, RestError};
use crate::shared::messaging::{ChatMessage, TicketId, Visibility};
use serde::Serialize;

/// Body of a seen receipt
#[derive(Debug, Serialize)]
struct SeenPayload {
    id: i64,
}

#[derive(Clone)]
pub struct Publisher {
    outbound: OutboundHandle,
    rest: RestClient,
    chat_destination: String,
    seen_destination: String,
}

impl Publisher {
    pub fn new(outbound: OutboundHandle, rest: RestClient, config: &AppConfig) -> Self {
        Self {
            outbound,
            rest,
            chat_destination: config.chat_destination.clone(),
            seen_destination: config.seen_destination.clone(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.outbound.status()
    }

    /// Publish a chat message. Fails with `NotConnected` unless the session is
    /// connected; the caller owns any optimistic entry it added.
    pub fn send_message(&self, message: &ChatMessage) -> Result<(), PublishError> {
        let body = serde_json::to_string(message)?;
        tracing::info!(
            "[CHAT] Publishing message: ticket={}, correlation_id={}, preview='{}'",
            message.ticket_id,
            message.correlation_id,
            message.preview(50)
        );
        self.outbound
            .publish(Frame::send_json(&self.chat_destination, body), Some(message.correlation_id))
    }

    /// Publish a seen receipt. A message without a server id cannot be marked
    /// seen, so `None` is a silent no-op.
    pub fn send_seen(&self, message_id: Option<i64>) -> Result<(), PublishError> {
        let Some(id) = message_id else {
            return Ok(());
        };
        let body = serde_json::to_string(&SeenPayload { id })?;
        tracing::debug!("[CHAT] Publishing seen receipt for message {}", id);
        self.outbound
            .publish(Frame::send_json(&self.seen_destination, body), None)
    }

    /// Upload an image as a message body. Resolves once the server stored it;
    /// the resulting message arrives through the inbound subscription.
    pub async fn send_image(
        &self,
        ticket_id: TicketId,
        visibility: Visibility,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ChatMessage, RestError> {
        tracing::info!(
            "[CHAT] Uploading image '{}' ({} bytes) to ticket {}",
            file_name,
            bytes.len(),
            ticket_id
        );
        self.rest
            .upload_image(ticket_id, visibility, file_name, bytes)
            .await
    }
}
