//! Messaging Module
//!
//! Data structures for ticket conversations:
//!
//! - `ChatMessage` - A message on a ticket
//! - `TicketSummary` / `TicketPage` - The paged ticket list
//!
//! # Usage
//!
//! ```rust
//! use ticketchat::shared::messaging::{ChatMessage, TicketId, UserId, Visibility};
//! ```

pub mod message;
pub mod ticket;

// Re-export all types
pub use message::{ChatMessage, CorrelationId, DeliveryStatus, UserId, Visibility};
pub use ticket::{TicketFilter, TicketId, TicketPage, TicketStatus, TicketSummary};
