//! Application configuration module
//!
//! Endpoints, broker destinations and reconnect timing for the chat core.

use std::time::Duration;
use thiserror::Error;

/// Default REST base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
/// Default STOMP-over-WebSocket endpoint
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";
/// Per-user inbound destination; `{user}` is replaced with the user id
pub const DEFAULT_INBOUND_TEMPLATE: &str = "/user/{user}/queue/messages";
pub const DEFAULT_CHAT_DESTINATION: &str = "/app/chat";
pub const DEFAULT_SEEN_DESTINATION: &str = "/app/chat/seen";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// REST base URL
    pub server_url: String,
    /// STOMP-over-WebSocket URL
    pub ws_url: String,
    /// Inbound destination template, must contain `{user}`
    pub inbound_template: String,
    /// Destination for outbound chat messages
    pub chat_destination: String,
    /// Destination for outbound seen receipts
    pub seen_destination: String,
    /// First reconnect delay after a transport failure
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay
    pub reconnect_max: Duration,
    /// Client heart-beat interval; zero disables heart-beats
    pub heartbeat: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            inbound_template: DEFAULT_INBOUND_TEMPLATE.to_string(),
            chat_destination: DEFAULT_CHAT_DESTINATION.to_string(),
            seen_destination: DEFAULT_SEEN_DESTINATION.to_string(),
            reconnect_initial: Duration::from_millis(1000),
            reconnect_max: Duration::from_secs(30),
            heartbeat: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.ws_url.clone()));
        }
        if !self.inbound_template.contains("{user}") {
            return Err(ConfigError::MissingValue("{user} placeholder in inbound template"));
        }
        if self.reconnect_initial.is_zero() || self.reconnect_initial > self.reconnect_max {
            return Err(ConfigError::InvalidBackoff {
                initial: self.reconnect_initial,
                max: self.reconnect_max,
            });
        }
        Ok(())
    }

    /// Inbound destination for one user
    pub fn inbound_destination(&self, user: impl std::fmt::Display) -> String {
        self.inbound_template.replace("{user}", &user.to_string())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    ws_url: Option<String>,
    inbound_template: Option<String>,
    chat_destination: Option<String>,
    seen_destination: Option<String>,
    reconnect_initial: Option<Duration>,
    reconnect_max: Option<Duration>,
    heartbeat: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the REST server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the WebSocket URL
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    pub fn inbound_template(mut self, template: impl Into<String>) -> Self {
        self.inbound_template = Some(template.into());
        self
    }

    pub fn chat_destination(mut self, destination: impl Into<String>) -> Self {
        self.chat_destination = Some(destination.into());
        self
    }

    pub fn seen_destination(mut self, destination: impl Into<String>) -> Self {
        self.seen_destination = Some(destination.into());
        self
    }

    /// Set reconnect backoff bounds
    pub fn reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = Some(initial);
        self.reconnect_max = Some(max);
        self
    }

    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self
                .server_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.server_url),
            ws_url: self.ws_url.unwrap_or(defaults.ws_url),
            inbound_template: self.inbound_template.unwrap_or(defaults.inbound_template),
            chat_destination: self.chat_destination.unwrap_or(defaults.chat_destination),
            seen_destination: self.seen_destination.unwrap_or(defaults.seen_destination),
            reconnect_initial: self.reconnect_initial.unwrap_or(defaults.reconnect_initial),
            reconnect_max: self.reconnect_max.unwrap_or(defaults.reconnect_max),
            heartbeat: self.heartbeat.unwrap_or(defaults.heartbeat),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid reconnect backoff: initial {initial:?}, max {max:?}")]
    InvalidBackoff { initial: Duration, max: Duration },
}
