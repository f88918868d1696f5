//! Reconnect tests
//!
//! A dropped link is reopened with a fresh subscription, and logout ends the
//! session for good

use pretty_assertions::assert_eq;
use std::time::Duration;
use ticketchat::client::stomp::Command;

use crate::common::*;

#[tokio::test]
async fn test_reconnect_resubscribes_without_duplicates() {
    let (mut chat, mut broker, first) = connected_chat().await;
    first.push_message(&received(21, 0));
    wait_for_message(&mut chat, TICKET, 21).await;

    let old_subscription = first.subscription_id().to_string();
    drop(first);

    let second = broker.accept().await;
    wait_connected(&chat).await;
    assert_eq!(second.subscribe.command, Command::Subscribe);
    assert_ne!(second.subscription_id(), old_subscription);

    // stale subscription id, then a redelivery, then something new
    second.push_message_on(&old_subscription, &received(22, 1));
    second.push_message(&received(21, 0));
    second.push_message(&received(23, 2));
    wait_for_message(&mut chat, TICKET, 23).await;

    let ids: Vec<Option<i64>> = chat.conversation(TICKET).iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![Some(21), Some(23)]);
    assert_eq!(chat.unread_count(TICKET), 2);
    chat.logout().await.unwrap();
}

#[tokio::test]
async fn test_logout_stops_reconnecting() {
    let (mut chat, mut broker, mut session) = connected_chat().await;
    chat.logout().await.unwrap();

    assert_eq!(session.expect_frame().await.command, Command::Unsubscribe);
    assert_eq!(session.expect_frame().await.command, Command::Disconnect);
    drop(session);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!broker.has_pending_link());
    assert!(!chat.connected());
    assert!(!chat.is_logged_in());
}

#[tokio::test]
async fn test_error_frame_triggers_reconnect() {
    let (mut chat, mut broker, first) = connected_chat().await;
    first
        .peer
        .send_frame(&ticketchat::client::stomp::Frame::new(Command::Error).header("message", "session expired"));

    let second = broker.accept().await;
    wait_connected(&chat).await;
    second.push_message(&received(31, 0));
    wait_for_message(&mut chat, TICKET, 31).await;
    chat.logout().await.unwrap();
}
