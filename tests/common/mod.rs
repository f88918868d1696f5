//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Message and ticket fixtures
//! - An in-memory STOMP broker driving `MemoryConnector`
//! - Conversation assertions

pub mod assertions;
pub mod broker;
pub mod fixtures;

// Re-export commonly used utilities
pub use assertions::*;
pub use broker::*;
pub use fixtures::*;
