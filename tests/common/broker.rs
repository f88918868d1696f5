//! In-memory broker
//!
//! Plays the server side of `MemoryConnector` links: answers CONNECT,
//! records the subscription, and pushes MESSAGE frames.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use ticketchat::client::session::MemorySessionStore;
use ticketchat::client::stomp::{Command, Frame};
use ticketchat::client::{ChatSession, ConnectionStatus, MemoryConnector, MemoryPeer, Session};
use ticketchat::shared::event::SeenReceipt;
use ticketchat::shared::messaging::{ChatMessage, TicketId};

use super::fixtures::{test_config, STAFF, TOKEN, WAIT};

/// Accepts incoming links
pub struct TestBroker {
    peers: UnboundedReceiver<MemoryPeer>,
}

/// One accepted STOMP session
pub struct BrokerSession {
    pub peer: MemoryPeer,
    pub connect: Frame,
    pub subscribe: Frame,
}

impl TestBroker {
    pub fn new(peers: UnboundedReceiver<MemoryPeer>) -> Self {
        Self { peers }
    }

    /// Wait for the next link, complete the handshake and the subscription
    pub async fn accept(&mut self) -> BrokerSession {
        let mut peer = timeout(WAIT, self.peers.recv())
            .await
            .expect("client never connected")
            .expect("connector dropped");
        let connect = timeout(WAIT, peer.recv_frame()).await.unwrap().unwrap();
        assert_eq!(connect.command, Command::Connect);
        peer.accept();
        let subscribe = timeout(WAIT, peer.recv_frame()).await.unwrap().unwrap();
        BrokerSession {
            peer,
            connect,
            subscribe,
        }
    }

    /// Whether a link was opened that nobody accepted
    pub fn has_pending_link(&mut self) -> bool {
        self.peers.try_recv().is_ok()
    }
}

impl BrokerSession {
    pub fn subscription_id(&self) -> &str {
        self.subscribe.get_header("id").unwrap()
    }

    /// Next frame the client sends
    pub async fn expect_frame(&mut self) -> Frame {
        timeout(WAIT, self.peer.recv_frame())
            .await
            .expect("no frame from client")
            .expect("client closed the link")
    }

    fn push_body(&self, subscription: &str, body: String) {
        let frame = Frame::new(Command::Message)
            .header("subscription", subscription)
            .header("destination", self.subscribe.get_header("destination").unwrap())
            .with_body(body);
        assert!(self.peer.send_frame(&frame), "client link closed");
    }

    pub fn push_message(&self, message: &ChatMessage) {
        self.push_body(self.subscription_id(), serde_json::to_string(message).unwrap());
    }

    /// Push on a subscription id the client no longer holds
    pub fn push_message_on(&self, subscription: &str, message: &ChatMessage) {
        self.push_body(subscription, serde_json::to_string(message).unwrap());
    }

    pub fn push_seen(&self, receipt: &SeenReceipt) {
        self.push_body(self.subscription_id(), serde_json::to_string(receipt).unwrap());
    }

    pub fn push_raw(&self, body: &str) {
        self.push_body(self.subscription_id(), body.to_string());
    }
}

/// Logged-in chat session connected to a test broker
pub async fn connected_chat() -> (ChatSession, TestBroker, BrokerSession) {
    let (connector, peers) = MemoryConnector::new();
    let mut chat = ChatSession::new(
        test_config(),
        Arc::new(connector),
        Box::new(MemorySessionStore::new()),
    );
    let mut broker = TestBroker::new(peers);
    chat.login(Session::new(TOKEN, STAFF)).await.unwrap();
    let session = broker.accept().await;
    wait_connected(&chat).await;
    (chat, broker, session)
}

pub async fn wait_connected(chat: &ChatSession) {
    let mut status = chat.watch_status();
    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("never connected")
        .unwrap();
}

/// Apply inbound events until the conversation of `ticket` holds `id`
pub async fn wait_for_message(chat: &mut ChatSession, ticket: TicketId, id: i64) {
    timeout(WAIT, async {
        while !chat.conversation(ticket).iter().any(|m| m.id == Some(id)) {
            chat.next_change().await.expect("inbound channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("message {} never arrived", id));
}
