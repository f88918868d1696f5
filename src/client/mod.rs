//! Chat Client Module
//!
//! Client side of the ticket chat: the STOMP session, the REST calls, and the
//! conversation state built on top of them.
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - ticketchat-tail binary
//! ├── config.rs       - Endpoints from the environment, session token
//! ├── session.rs      - Persisted login state
//! ├── stomp.rs        - STOMP 1.2 frame codec
//! ├── connection.rs   - Connection manager and transports
//! ├── subscription.rs - Inbound subscription and event decoding
//! ├── publisher.rs    - Outbound chat messages, seen receipts, images
//! ├── rest.rs         - REST API client
//! └── messaging/      - Conversation store, unread counts, ChatSession
//! ```

pub mod config;
pub mod connection;
pub mod messaging;
pub mod publisher;
pub mod rest;
pub mod session;
pub mod stomp;
pub mod subscription;

pub use config::Config;
pub use connection::{ConnectionManager, ConnectionStatus, Connector, MemoryConnector, MemoryPeer, WsConnector};
pub use messaging::ChatSession;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
