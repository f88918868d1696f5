//! Ticket Data Structures
//!
//! Repair tickets are the unit conversations are scoped to. Only the fields
//! the chat sidebar needs are modelled here.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::UserId;

/// Repair ticket identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow state of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingForParts,
    Completed,
    Collected,
}

impl TicketStatus {
    /// Query parameter value
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::WaitingForParts => "WAITING_FOR_PARTS",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Collected => "COLLECTED",
        }
    }
}

/// Ticket row as listed in the chat sidebar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    pub id: TicketId,
    /// Client the ticket belongs to; the counterpart for staff messages
    pub client_id: UserId,
    pub device: String,
    pub status: TicketStatus,
}

/// Filter for the paged ticket list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    /// Free-text search on device / client name
    pub query: Option<String>,
    /// Zero-based page index
    pub page: u32,
    /// Page size; the server default applies when `None`
    pub size: Option<u32>,
}

impl TicketFilter {
    /// Query parameters in request order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string())];
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(query) = self.query.as_ref().filter(|q| !q.trim().is_empty()) {
            pairs.push(("q", query.trim().to_string()));
        }
        pairs
    }
}

/// One page of tickets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    pub content: Vec<TicketSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub total_elements: u64,
}

impl TicketPage {
    pub fn has_more(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}
