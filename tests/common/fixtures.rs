//! Message fixtures
//!
//! Builders for messages on a single test ticket between a staff member
//! (the logged-in user) and a client.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use ticketchat::client::Config;
use ticketchat::shared::config::AppConfig;
use ticketchat::shared::messaging::{ChatMessage, CorrelationId, TicketId, UserId, Visibility};

/// The logged-in staff member
pub const STAFF: UserId = UserId(1);
/// The ticket's client
pub const CLIENT: UserId = UserId(2);
pub const TICKET: TicketId = TicketId(3);
pub const TOKEN: &str = "test-token";

/// Upper bound for anything the session task does asynchronously
pub const WAIT: Duration = Duration::from_secs(5);

/// Fixed point in time offset by `secs`
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

/// Configuration with fast reconnects and no heart-beats
pub fn test_config() -> Config {
    Config::with_builder(
        AppConfig::builder()
            .ws_url("ws://shop.example.com/ws")
            .reconnect(Duration::from_millis(10), Duration::from_millis(40))
            .heartbeat(Duration::ZERO),
    )
    .unwrap()
}

/// Confirmed message from the client to the staff member
pub fn received(id: i64, secs: i64) -> ChatMessage {
    let mut message = ChatMessage::outgoing(TICKET, CLIENT, STAFF, format!("client message {}", id), Visibility::Client)
        .with_correlation_id(CorrelationId(500_000 + id as u64));
    message.timestamp = at(secs);
    message.confirm(id);
    message
}

/// Pending message from the staff member to the client
pub fn outgoing(cid: u64, secs: i64) -> ChatMessage {
    let mut message = ChatMessage::outgoing(TICKET, STAFF, CLIENT, format!("staff message {}", cid), Visibility::Client)
        .with_correlation_id(CorrelationId(cid));
    message.timestamp = at(secs);
    message
}

/// Server echo of a pending message
pub fn echo(pending: &ChatMessage, id: i64) -> ChatMessage {
    let mut message = pending.clone();
    message.confirm(id);
    message
}
