//! REST API Client
//!
//! Chat-relevant REST calls: the paged ticket list, conversation history, and
//! image upload. Every call carries the session's bearer token.

use crate::client::config::Config;
use crate::shared::error::RestError;
use crate::shared::messaging::{ChatMessage, TicketFilter, TicketId, TicketPage, UserId, Visibility};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// REST API client
#[derive(Debug, Clone)]
pub struct RestClient {
    config: Config,
    client: Client,
}

impl RestClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One page of tickets for the sidebar
    pub async fn fetch_tickets(&self, filter: &TicketFilter) -> Result<TicketPage, RestError> {
        let url = self.config.api_url("/api/tickets");
        tracing::debug!("[CHAT] Fetching tickets page {}", filter.page);
        let request = self.client.get(&url).query(&filter.query_pairs());
        self.execute(request).await
    }

    /// Confirmed history of one ticket
    pub async fn fetch_ticket_history(&self, ticket_id: TicketId) -> Result<Vec<ChatMessage>, RestError> {
        let url = self.config.api_url(&format!("/api/chat/ticket/{}", ticket_id));
        tracing::debug!("[CHAT] Fetching history for ticket {}", ticket_id);
        let messages: Vec<ChatMessage> = self.execute(self.client.get(&url)).await?;
        tracing::info!(
            "[CHAT] Loaded {} messages for ticket {}",
            messages.len(),
            ticket_id
        );
        Ok(messages)
    }

    /// Every message sent to or by a user, across tickets
    pub async fn fetch_user_history(&self, user_id: UserId) -> Result<Vec<ChatMessage>, RestError> {
        let url = self.config.api_url(&format!("/api/chat/user/{}", user_id));
        tracing::debug!("[CHAT] Fetching history for user {}", user_id);
        self.execute(self.client.get(&url)).await
    }

    /// Upload an image to a ticket conversation; returns the stored message
    pub async fn upload_image(
        &self,
        ticket_id: TicketId,
        visibility: Visibility,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ChatMessage, RestError> {
        let url = self.config.api_url(&format!("/api/chat/ticket/{}/image", ticket_id));
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new()
            .part("file", part)
            .text("visibility", visibility.as_str());
        self.execute(self.client.post(&url).multipart(form)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RestError> {
        let token = self.config.get_token().ok_or(RestError::Unauthenticated)?;
        let response = request
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, RestError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    tracing::warn!("[CHAT] Request failed: {} - {}", status, body);
    Err(RestError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Content type by file extension
fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
