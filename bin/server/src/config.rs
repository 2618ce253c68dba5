//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, so `NATS__URL` sets `nats.url`.

use chatbridge_relay::{DEFAULT_REPLY_TIMEOUT, NatsConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Username of the peer every conversation is relayed to.
    /// Required; a leading `@` is ignored.
    #[serde(default)]
    pub bot_username: String,

    /// Model name reported to API clients.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Where transcripts are written.
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    /// How long a turn waits for the peer's reply.
    #[serde(default = "default_reply_timeout_seconds")]
    pub reply_timeout_seconds: u64,

    /// Messaging backend.
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub nats: NatsSettings,
}

/// Which messaging backend to relay through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Nats,
    /// In-process peer that echoes every message back.
    Loopback,
}

/// NATS connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsSettings {
    #[serde(default = "default_nats_url")]
    pub url: String,

    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_model_name() -> String {
    "chatbridge".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    11434
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

fn default_reply_timeout_seconds() -> u64 {
    DEFAULT_REPLY_TIMEOUT.as_secs()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subject_prefix() -> String {
    "chatbridge".to_string()
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

impl NatsSettings {
    #[must_use]
    pub fn to_nats_config(&self) -> NatsConfig {
        NatsConfig::new(&self.url).with_subject_prefix(&self.subject_prefix)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// The peer username without a leading `@`.
    #[must_use]
    pub fn bot_name(&self) -> &str {
        self.bot_username.trim().trim_start_matches('@')
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_seconds)
    }

    /// The address to listen on.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.api_host, self.api_port).parse()
    }
}
