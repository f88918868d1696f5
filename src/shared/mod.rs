//! Shared Module
//!
//! Types shared by every layer of the chat core: the message model, inbound
//! events, error types and configuration. All wire types serialize to the
//! JSON shape the REST API and the broker use.

/// Messaging types (messages, tickets)
pub mod messaging;

/// Inbound event system
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use messaging::{ChatMessage, CorrelationId, DeliveryStatus, TicketId, UserId, Visibility};
pub use event::{InboundEvent, SeenReceipt};
pub use error::{ChatError, DecodeError, PublishError, RestError, SessionError, TransportError};
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
