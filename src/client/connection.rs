//! Connection Manager
//!
//! Owns the single STOMP-over-WebSocket session. The session runs as a tokio
//! task started by [`ConnectionManager::login`] and stopped by
//! [`ConnectionManager::logout`]; it never reconnects while logged out.
//!
//! ```text
//! Disconnected --login--> Connecting --CONNECTED--> Connected
//!      ^                      |                         |
//!      +------ error / logout-+-------------------------+
//! ```
//!
//! A reconnect is just another `Connecting` attempt, made with exponential
//! backoff while the user is still logged in. Every successful connect runs
//! the on-connect hook, which re-activates the [`SubscriptionRegistry`].

use crate::client::session::Session;
use crate::client::stomp::{self, Command, Frame, HEARTBEAT};
use crate::client::subscription::SubscriptionRegistry;
use crate::shared::config::AppConfig;
use crate::shared::error::{ChatError, TransportError};
use crate::shared::event::InboundEvent;
use crate::shared::messaging::CorrelationId;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

/// Connection state published to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open transport carrying one STOMP frame per text message
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;
}

/// WebSocket transport
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::connect(e.to_string()))?;
        let (sink, stream) = ws.split();

        let sink = sink
            .sink_map_err(|e| TransportError::io(e.to_string()))
            .with(|text: String| async move { Ok::<_, TransportError>(WsMessage::text(text)) });
        let stream = stream.filter_map(|item| async move {
            match item {
                Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| TransportError::protocol(format!("binary frame: {}", e))),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::io(e.to_string()))),
            }
        });

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Work queued for the session task
#[derive(Debug)]
pub(crate) enum Outbound {
    /// A SEND frame; chat messages carry their correlation id so a dropped
    /// frame can be reported back
    Publish {
        frame: Frame,
        correlation_id: Option<CorrelationId>,
    },
}

/// Cloneable handle used by the publisher to reach the session task
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    commands: mpsc::UnboundedSender<Outbound>,
    status: watch::Receiver<ConnectionStatus>,
}

impl OutboundHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Queue a frame on the live session. If the frame is dropped later, an
    /// [`InboundEvent::PublishFailed`] for `correlation_id` follows.
    pub(crate) fn publish(
        &self,
        frame: Frame,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), crate::shared::error::PublishError> {
        use crate::shared::error::PublishError;

        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        self.commands
            .send(Outbound::Publish { frame, correlation_id })
            .map_err(|_| PublishError::ChannelClosed)
    }
}

pub struct ConnectionManager {
    config: AppConfig,
    connector: Arc<dyn Connector>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    commands_tx: mpsc::UnboundedSender<Outbound>,
    commands_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<mpsc::UnboundedReceiver<Outbound>>>,
}

impl ConnectionManager {
    /// Create a manager and the inbound event channel its subscription feeds
    pub fn new(
        config: AppConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            connector,
            status_tx: Arc::new(status_tx),
            status_rx,
            commands_tx,
            commands_rx: Some(commands_rx),
            events_tx,
            shutdown: None,
            task: None,
        };
        (manager, events_rx)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.task.is_some()
    }

    pub fn outbound(&self) -> OutboundHandle {
        OutboundHandle {
            commands: self.commands_tx.clone(),
            status: self.status_rx.clone(),
        }
    }

    /// Start the session task for `session`. An already running session is
    /// stopped first.
    pub async fn login(&mut self, session: &Session) -> Result<(), ChatError> {
        if !session.is_valid() {
            return Err(ChatError::NotLoggedIn);
        }
        if self.task.is_some() {
            self.logout().await;
        }
        let Some(commands) = self.commands_rx.take() else {
            return Err(ChatError::NotLoggedIn);
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = SubscriptionRegistry::new(
            session.user_id,
            self.config.inbound_destination(session.user_id),
            self.events_tx.clone(),
        );
        let task = SessionTask {
            url: self.config.ws_url.clone(),
            host: host_of(&self.config.ws_url),
            token: session.token.clone(),
            heartbeat: self.config.heartbeat,
            reconnect_initial: self.config.reconnect_initial,
            reconnect_max: self.config.reconnect_max,
            connector: Arc::clone(&self.connector),
            status: Arc::clone(&self.status_tx),
            events: self.events_tx.clone(),
            registry,
        };

        tracing::info!("[STOMP] Logging in user {}", session.user_id);
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(task.run(commands, shutdown_rx)));
        Ok(())
    }

    /// Stop the session task and wait for it to tear down the transport
    pub async fn logout(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(mut commands) => {
                    while commands.try_recv().is_ok() {}
                    self.commands_rx = Some(commands);
                }
                Err(e) => {
                    tracing::error!("[STOMP] Session task failed: {}", e);
                    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
                    self.commands_tx = commands_tx;
                    self.commands_rx = Some(commands_rx);
                }
            }
            tracing::info!("[STOMP] Logged out");
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// How a session ended
enum SessionEnd {
    Shutdown,
    ReceiverGone,
}

struct SessionTask {
    url: String,
    host: String,
    token: String,
    heartbeat: Duration,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    connector: Arc<dyn Connector>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    events: mpsc::UnboundedSender<InboundEvent>,
    registry: SubscriptionRegistry,
}

impl SessionTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Outbound>,
        mut shutdown: watch::Receiver<bool>,
    ) -> mpsc::UnboundedReceiver<Outbound> {
        let mut delay = self.reconnect_initial;

        loop {
            self.set_status(ConnectionStatus::Connecting);
            let opened = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                result = self.open() => result,
            };

            let error = match opened {
                Ok(link) => {
                    delay = self.reconnect_initial;
                    match self.serve(link, &mut commands, &mut shutdown).await {
                        Ok(SessionEnd::Shutdown) | Ok(SessionEnd::ReceiverGone) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            self.registry.session_lost();
            self.set_status(ConnectionStatus::Disconnected);
            tracing::warn!("[STOMP] Connection lost ({}), reconnecting in {:?}", error, delay);

            let backoff = tokio::time::sleep(delay);
            tokio::pin!(backoff);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped(&mut shutdown) => {
                        return commands;
                    }
                    _ = &mut backoff => break,
                    Some(Outbound::Publish { frame, correlation_id }) = commands.recv() => {
                        tracing::warn!(
                            "[STOMP] Dropping SEND to {:?} while disconnected",
                            frame.get_header("destination")
                        );
                        self.undelivered(correlation_id);
                    }
                }
            }
            delay = std::cmp::min(delay * 2, self.reconnect_max);
        }

        self.registry.session_lost();
        self.set_status(ConnectionStatus::Disconnected);
        commands
    }

    /// Connect, authenticate and run the on-connect hook
    async fn open(&mut self) -> Result<Link, TransportError> {
        tracing::info!("[STOMP] Connecting to {}", self.url);
        let mut link = self.connector.connect(&self.url).await?;
        let heartbeat_ms = self.heartbeat.as_millis() as u64;
        link.sink
            .send(Frame::connect(&self.host, &self.token, heartbeat_ms).encode())
            .await?;

        loop {
            let text = match link.stream.next().await {
                Some(result) => result?,
                None => return Err(TransportError::Closed),
            };
            match stomp::decode(&text) {
                Ok(None) => continue,
                Ok(Some(frame)) if frame.command == Command::Connected => break,
                Ok(Some(frame)) if frame.command == Command::Error => {
                    return Err(rejected(&frame));
                }
                Ok(Some(frame)) => {
                    return Err(TransportError::protocol(format!(
                        "expected CONNECTED, got {}",
                        frame.command.as_str()
                    )));
                }
                Err(e) => return Err(TransportError::protocol(e.to_string())),
            }
        }

        self.set_status(ConnectionStatus::Connected);
        tracing::info!("[STOMP] Connected as user {}", self.registry.user_id());
        for frame in self.registry.activate() {
            link.sink.send(frame.encode()).await?;
        }
        Ok(link)
    }

    async fn serve(
        &mut self,
        mut link: Link,
        commands: &mut mpsc::UnboundedReceiver<Outbound>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, TransportError> {
        let mut heartbeat = (!self.heartbeat.is_zero())
            .then(|| tokio::time::interval_at(Instant::now() + self.heartbeat, self.heartbeat));

        loop {
            tokio::select! {
                biased;
                _ = stopped(shutdown) => {
                    if let Some(frame) = self.registry.deactivate() {
                        let _ = link.sink.send(frame.encode()).await;
                    }
                    let _ = link.sink.send(Frame::disconnect("logout").encode()).await;
                    let _ = link.sink.close().await;
                    return Ok(SessionEnd::Shutdown);
                }
                incoming = link.stream.next() => {
                    let text = match incoming {
                        Some(result) => result?,
                        None => return Err(TransportError::Closed),
                    };
                    match stomp::decode(&text) {
                        Ok(None) => {}
                        Ok(Some(frame)) => match frame.command {
                            Command::Message => {
                                if !self.registry.dispatch(&frame) {
                                    return Ok(SessionEnd::ReceiverGone);
                                }
                            }
                            Command::Error => return Err(rejected(&frame)),
                            other => tracing::debug!("[STOMP] Ignoring {} frame", other.as_str()),
                        },
                        Err(e) => {
                            tracing::warn!("[STOMP] Malformed frame: {}", e);
                            if !self.registry.report_malformed(e.to_string()) {
                                return Ok(SessionEnd::ReceiverGone);
                            }
                        }
                    }
                }
                Some(Outbound::Publish { frame, correlation_id }) = commands.recv() => {
                    if let Err(e) = link.sink.send(frame.encode()).await {
                        self.undelivered(correlation_id);
                        return Err(e);
                    }
                }
                _ = tick(&mut heartbeat) => {
                    link.sink.send(HEARTBEAT.to_string()).await?;
                }
            }
        }
    }

    fn undelivered(&self, correlation_id: Option<CorrelationId>) {
        if let Some(correlation_id) = correlation_id {
            let _ = self.events.send(InboundEvent::PublishFailed(correlation_id));
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!("[STOMP] {:?} -> {:?}", previous, status);
        }
    }
}

/// Resolves once logout was requested or the manager is gone
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn rejected(frame: &Frame) -> TransportError {
    TransportError::Rejected {
        message: frame
            .get_header("message")
            .unwrap_or(frame.body.as_str())
            .to_string(),
    }
}

/// `host` header value for a WebSocket URL
fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

/// In-memory transport: each `connect` hands a [`MemoryPeer`] to whoever
/// holds the receiver, which then plays the broker.
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers }, rx)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Link, TransportError> {
        let (to_broker, from_client) = mpsc::unbounded_channel::<String>();
        let (to_client, from_broker) = mpsc::unbounded_channel::<String>();
        self.peers
            .send(MemoryPeer {
                incoming: from_client,
                outgoing: to_client,
            })
            .map_err(|_| TransportError::connect("no broker listening"))?;

        let sink = futures_util::sink::unfold(to_broker, |tx, text: String| async move {
            tx.send(text).map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        });
        let stream = futures_util::stream::unfold(from_broker, |mut rx| async move {
            rx.recv().await.map(|text| (Ok(text), rx))
        });
        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Broker side of an in-memory link
pub struct MemoryPeer {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl MemoryPeer {
    /// Next frame from the client, skipping heart-beats. `None` once the
    /// client side is closed.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        while let Some(text) = self.incoming.recv().await {
            match stomp::decode(&text) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("[STOMP] Memory peer got malformed frame: {}", e);
                    continue;
                }
            }
        }
        None
    }

    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.send_raw(frame.encode())
    }

    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.outgoing.send(text.into()).is_ok()
    }

    /// Answer the CONNECT frame
    pub fn accept(&self) -> bool {
        self.send_frame(&Frame::new(Command::Connected).header("version", "1.2"))
    }
}
