#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! ticketchat - Real-time chat core for repair tickets
//!
//! Client-side chat and notification state for a repair-shop admin front end.
//! Tickets carry conversations between staff and clients; this crate keeps one
//! live STOMP-over-WebSocket subscription per logged-in user and turns three
//! message sources into one ordered conversation per ticket:
//!
//! - confirmed history loaded over REST
//! - confirmed messages pushed live by the broker
//! - optimistic local sends not yet acknowledged
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types, inbound events, errors, configuration
//! - **`client`** - STOMP session, REST client, conversation store, `ChatSession`
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ticketchat::client::{ChatSession, Config, FileSessionStore, WsConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sessions = FileSessionStore::default_location()?;
//! let mut chat = ChatSession::new(Config::new(), Arc::new(WsConnector), Box::new(sessions));
//! if chat.resume().await? {
//!     for ticket in chat.drain_events() {
//!         println!("ticket {} has {} unread", ticket, chat.unread_count(ticket));
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! `ChatSession` and the store are single-owner and take `&mut self`. The
//! transport runs as a tokio task and talks to them only through channels.

/// Shared types and data structures
pub mod shared;

/// Chat client
pub mod client;
