//! Shared Error Types
//!
//! Error types for every failure the chat core can surface. Nothing in here is
//! fatal to the application: the worst outcome is a stale "unsent" marker or a
//! `connected = false` status.
//!
//! # Error Categories
//!
//! - `TransportError` - WebSocket / STOMP session failures (recovered by the reconnect loop)
//! - `DecodeError` - A single inbound frame could not be decoded (logged and discarded)
//! - `PublishError` - An outbound publish was rejected (returned to the caller)
//! - `RestError` - REST history / upload / ticket listing failures
//! - `SessionError` - Persisted session could not be read or written
//!
//! `ChatError` aggregates all of them for callers that do not care which layer failed.
//!
//! # Usage
//!
//! ```rust
//! use ticketchat::shared::error::{ChatError, PublishError};
//!
//! let error: ChatError = PublishError::NotConnected.into();
//! assert!(error.to_string().contains("not connected"));
//! ```
use thiserror::Error;

/// Failure of the underlying WebSocket / STOMP session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not be opened
    #[error("connect failed: {message}")]
    Connect {
        /// Human-readable error message
        message: String,
    },

    /// Read or write on an open transport failed
    #[error("transport i/o error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
    },

    /// The broker answered with a STOMP ERROR frame
    #[error("broker rejected session: {message}")]
    Rejected {
        /// Message header of the ERROR frame
        message: String,
    },

    /// The peer violated the STOMP protocol
    #[error("protocol error: {message}")]
    Protocol {
        /// Human-readable error message
        message: String,
    },

    /// The transport closed before the handshake completed
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// A single inbound frame that could not be turned into an event
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not decode frame from '{destination}': {reason}")]
pub struct DecodeError {
    /// Destination the frame was delivered on
    pub destination: String,
    /// Why decoding failed
    pub reason: String,
}

impl DecodeError {
    pub fn new(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

/// An outbound publish that did not reach the transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The session is not in the `Connected` state
    #[error("publish rejected: not connected")]
    NotConnected,

    /// The connection task is gone (logged out or crashed)
    #[error("publish rejected: connection task has stopped")]
    ChannelClosed,

    /// The payload could not be serialized
    #[error("publish rejected: could not encode payload: {message}")]
    Encode {
        /// Human-readable error message
        message: String,
    },
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode {
            message: err.to_string(),
        }
    }
}

/// Failure of a REST call
#[derive(Debug, Error)]
pub enum RestError {
    /// No session token is available
    #[error("not authenticated")]
    Unauthenticated,

    /// Network or body-decoding failure
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("request failed: {status} - {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, or the status text when the body is unreadable
        body: String,
    },
}

/// Failure reading or writing the persisted session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is malformed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("session could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No platform data directory could be determined
    #[error("no data directory available for session storage")]
    NoDataDir,
}

/// Any error the chat core can return
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] crate::shared::config::ConfigError),

    /// The operation needs a logged-in session
    #[error("not logged in")]
    NotLoggedIn,

    /// Sending needs a selected ticket
    #[error("no ticket selected")]
    NoTicketSelected,

    /// No pending message carries this correlation id
    #[error("no pending message with correlation id {0}")]
    UnknownMessage(crate::shared::messaging::CorrelationId),
}
