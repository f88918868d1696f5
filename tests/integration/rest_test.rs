//! REST client tests
//!
//! Ticket list, history and image upload against a mock HTTP server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use ticketchat::client::rest::RestClient;
use ticketchat::client::session::MemorySessionStore;
use ticketchat::client::{ChatSession, Config, MemoryConnector, Session};
use ticketchat::shared::config::AppConfig;
use ticketchat::shared::error::{ChatError, RestError};
use ticketchat::shared::messaging::{TicketFilter, TicketId, TicketStatus, Visibility};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

fn config(server: &MockServer) -> Config {
    Config::with_builder(
        AppConfig::builder()
            .server_url(server.uri())
            .reconnect(Duration::from_millis(10), Duration::from_millis(40))
            .heartbeat(Duration::ZERO),
    )
    .unwrap()
}

fn client(server: &MockServer) -> RestClient {
    let mut config = config(server);
    config.set_token(Some(TOKEN.to_string()));
    RestClient::new(config)
}

#[tokio::test]
async fn test_fetch_ticket_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/ticket/3"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![received(10, 0), received(11, 1)]))
        .expect(1)
        .mount(&server)
        .await;

    let history = client(&server).fetch_ticket_history(TICKET).await.unwrap();
    assert_eq!(history, vec![received(10, 0), received(11, 1)]);
}

#[tokio::test]
async fn test_fetch_tickets_with_filter() {
    let server = MockServer::start().await;
    let page = serde_json::json!({
        "content": [
            { "id": 3, "clientId": 2, "device": "iPhone 13", "status": "WAITING_FOR_PARTS" }
        ],
        "page": 0,
        "totalPages": 2,
        "totalElements": 21
    });
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(query_param("page", "0"))
        .and(query_param("size", "20"))
        .and(query_param("status", "WAITING_FOR_PARTS"))
        .and(query_param("q", "iphone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .mount(&server)
        .await;

    let filter = TicketFilter {
        status: Some(TicketStatus::WaitingForParts),
        query: Some("iphone".to_string()),
        page: 0,
        size: Some(20),
    };
    let page = client(&server).fetch_tickets(&filter).await.unwrap();
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].id, TicketId(3));
    assert_eq!(page.content[0].client_id, CLIENT);
    assert!(page.has_more());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/ticket/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("ticket not found"))
        .mount(&server)
        .await;

    let result = client(&server).fetch_ticket_history(TicketId(404)).await;
    assert_matches!(
        result,
        Err(RestError::Status { status: 404, ref body }) if body == "ticket not found"
    );
}

#[tokio::test]
async fn test_upload_image() {
    let server = MockServer::start().await;
    let mut stored = received(77, 5);
    stored.sender_id = STAFF;
    stored.receiver_id = CLIENT;
    stored.is_image = true;
    stored.text = "/files/tickets/3/back-cover.jpg".to_string();
    Mock::given(method("POST"))
        .and(path("/api/chat/ticket/3/image"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&stored))
        .expect(1)
        .mount(&server)
        .await;

    let message = client(&server)
        .upload_image(TICKET, Visibility::Client, "back-cover.jpg", vec![0xFF, 0xD8, 0xFF])
        .await
        .unwrap();
    assert!(message.is_image);
    assert_eq!(message.id, Some(77));
}

#[tokio::test]
async fn test_fetch_user_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/user/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![received(10, 0)]))
        .mount(&server)
        .await;

    let messages = client(&server).fetch_user_history(STAFF).await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_session_loads_history_and_counts() {
    let server = MockServer::start().await;
    let mut seen = received(10, 0);
    seen.seen_at = Some(at(30));
    let mine = echo(&outgoing(5, 2), 12);
    Mock::given(method("GET"))
        .and(path("/api/chat/ticket/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![seen, received(11, 1), mine]))
        .mount(&server)
        .await;

    let (connector, _peers) = MemoryConnector::new();
    let mut chat = ChatSession::new(config(&server), Arc::new(connector), Box::new(MemorySessionStore::new()));
    assert_matches!(chat.load_history(TICKET).await, Err(ChatError::NotLoggedIn));

    chat.login(Session::new(TOKEN, STAFF)).await.unwrap();
    chat.select_ticket(TICKET).unwrap();
    assert_eq!(chat.load_history(TICKET).await.unwrap(), 3);
    assert!(!chat.is_loading());

    let conversation = chat.conversation(TICKET);
    assert_chronological(&conversation);
    assert_eq!(conversation.len(), 3);
    assert_eq!(chat.unread_count(TICKET), 1);
    assert_eq!(chat.total_unread(), 1);
    chat.logout().await.unwrap();
}

#[tokio::test]
async fn test_session_syncs_user_history_across_tickets() {
    let server = MockServer::start().await;
    let mut other = received(20, 0);
    other.ticket_id = TicketId(8);
    Mock::given(method("GET"))
        .and(path("/api/chat/user/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![received(10, 0), other]))
        .mount(&server)
        .await;

    let (connector, _peers) = MemoryConnector::new();
    let mut chat = ChatSession::new(config(&server), Arc::new(connector), Box::new(MemorySessionStore::new()));
    chat.login(Session::new(TOKEN, STAFF)).await.unwrap();
    assert_eq!(chat.sync_user_history().await.unwrap(), 2);
    assert_eq!(chat.unread_tickets(), vec![(TICKET, 1), (TicketId(8), 1)]);
    chat.logout().await.unwrap();
}
