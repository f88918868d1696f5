//! Messaging Module
//!
//! Conversation state for the logged-in user:
//!
//! - **`reconciliation`** - Pure three-way merge and correlation-id confirmation
//! - **`store`** - Per-ticket history, live and pending messages
//! - **`notifications`** - Per-ticket unread counts
//! - **`state`** - The `ChatSession` facade the UI talks to

pub mod notifications;
pub mod reconciliation;
pub mod state;
pub mod store;

pub use notifications::NotificationCounter;
pub use state::ChatSession;
pub use store::{ConversationStore, LiveOutcome};
