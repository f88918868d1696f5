//! Custom assertion macros and utilities
//!
//! Assertion helpers that check conversation invariants with readable
//! failure output.

use std::collections::HashSet;
use ticketchat::shared::messaging::ChatMessage;

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is an error, optionally of a given variant
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        assert!($result.is_err(), "Expected Err, got Ok");
    };
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => panic!("Expected different error variant, got: {:?}", e),
        }
    };
}

/// Timestamps never decrease along the conversation
pub fn assert_chronological(messages: &[ChatMessage]) {
    for pair in messages.windows(2) {
        assert!(
            pair[0].timestamp <= pair[1].timestamp,
            "Conversation out of order: {} after {}",
            pair[1].timestamp,
            pair[0].timestamp
        );
    }
}

/// No server id and no correlation id appears twice
pub fn assert_no_duplicates(messages: &[ChatMessage]) {
    let mut ids = HashSet::new();
    let mut correlation_ids = HashSet::new();
    for message in messages {
        if let Some(id) = message.id {
            assert!(ids.insert(id), "Server id {} appears twice", id);
        }
        assert!(
            correlation_ids.insert(message.correlation_id),
            "Correlation id {} appears twice",
            message.correlation_id
        );
    }
}
