use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Env var overriding the REST base URL
pub const API_URL_ENV: &str = "TICKETCHAT_API_URL";
/// Env var overriding the WebSocket URL
pub const WS_URL_ENV: &str = "TICKETCHAT_WS_URL";

/// Client configuration: endpoints plus the current session token.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            builder = builder.server_url(url);
        }
        if let Ok(url) = std::env::var(WS_URL_ENV) {
            builder = builder.ws_url(url);
        }
        let app = builder.build().unwrap_or_else(|e| {
            tracing::warn!("[CHAT] Ignoring invalid endpoint override: {}", e);
            AppConfig::default()
        });
        Self { app, token: None }
    }
}

impl Config {
    /// Create a new configuration from the environment
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app, token: None })
    }

    /// Set the session token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the session token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    pub fn ws_url(&self) -> &str {
        &self.app.ws_url
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }
}
