//! Shift Relay
//!
//! Relays schedule rebuild requests between a chat front-end and a decoupled
//! solver:
//! - NATS JetStream streams for requests and results, read as a consumer group
//! - JetStream KV bucket correlating request ids with the requesting chat
//! - Telegram Bot API for commands in and schedule replies out

pub mod bot;
pub mod broker;
pub mod chat;
pub mod correlation;
pub mod envelope;
pub mod relay;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bot::ChatFrontend;
use crate::broker::{JetStreamBroker, StreamSettings};
use crate::chat::{ChatTransport, TelegramTransport};
use crate::correlation::{CorrelationStore, KvCorrelationStore};
use crate::envelope::{RequestReason, RequesterId};
use crate::relay::{DeliveryDispatcher, RequestPublisher, ResultConsumer};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub telegram: TelegramYamlConfig,
    pub nats: NatsYamlConfig,
    pub correlation: CorrelationYamlConfig,
    pub streams: StreamsYamlConfig,
}

/// Telegram configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramYamlConfig {
    /// Bot token; usually supplied through `TELEGRAM_TOKEN` instead
    pub token: Option<String>,
    pub api_base: String,
}

impl Default for TelegramYamlConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: chat::telegram::DEFAULT_API_BASE.into(),
        }
    }
}

/// NATS configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsYamlConfig {
    pub url: String,
}

impl Default for NatsYamlConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".into(),
        }
    }
}

/// Correlation store section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelationYamlConfig {
    pub bucket: String,
    pub ttl_secs: u64,
}

impl Default for CorrelationYamlConfig {
    fn default() -> Self {
        Self {
            bucket: "schedule_mapping".into(),
            ttl_secs: 3600,
        }
    }
}

/// Streams and consumer group section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamsYamlConfig {
    pub request_subject: String,
    pub result_subject: String,
    pub consumer_group: String,
    pub poll_timeout_ms: u64,
    pub ack_wait_secs: u64,
}

impl Default for StreamsYamlConfig {
    fn default() -> Self {
        Self {
            request_subject: "reschedule.trigger".into(),
            result_subject: "schedule.results".into(),
            consumer_group: "bot_consumer".into(),
            poll_timeout_ms: 5000,
            ack_wait_secs: 30,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {env} (or {yaml} in the config file)")]
    MissingCredential {
        env: &'static str,
        yaml: &'static str,
    },
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub telegram_api_base: String,
    pub nats_url: String,
    pub correlation_bucket: String,
    pub correlation_ttl: Duration,
    pub request_subject: String,
    pub result_subject: String,
    pub consumer_group: String,
    pub poll_timeout: Duration,
    pub ack_wait: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "<redacted>"))
            .field("telegram_api_base", &self.telegram_api_base)
            .field("nats_url", &self.nats_url)
            .field("correlation_bucket", &self.correlation_bucket)
            .field("correlation_ttl", &self.correlation_ttl)
            .field("request_subject", &self.request_subject)
            .field("result_subject", &self.result_subject)
            .field("consumer_group", &self.consumer_group)
            .field("poll_timeout", &self.poll_timeout)
            .field("ack_wait", &self.ack_wait)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        Ok(Self::resolve(yaml, |key| std::env::var(key).ok()))
    }

    /// Merge `yaml` with the values `env` yields. Empty and unparseable
    /// values are treated as unset.
    fn resolve(yaml: YamlConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| text(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            telegram_token: text("TELEGRAM_TOKEN").or(yaml.telegram.token),
            telegram_api_base: text("TELEGRAM_API_BASE").unwrap_or(yaml.telegram.api_base),
            nats_url: text("NATS_URL").unwrap_or(yaml.nats.url),
            correlation_bucket: text("CORRELATION_BUCKET").unwrap_or(yaml.correlation.bucket),
            correlation_ttl: Duration::from_secs(
                number("CORRELATION_TTL_SECS").unwrap_or(yaml.correlation.ttl_secs),
            ),
            request_subject: text("REQUEST_STREAM").unwrap_or(yaml.streams.request_subject),
            result_subject: text("RESULT_STREAM").unwrap_or(yaml.streams.result_subject),
            consumer_group: text("CONSUMER_GROUP").unwrap_or(yaml.streams.consumer_group),
            poll_timeout: Duration::from_millis(
                number("POLL_TIMEOUT_MS").unwrap_or(yaml.streams.poll_timeout_ms),
            ),
            ack_wait: Duration::from_secs(
                number("ACK_WAIT_SECS").unwrap_or(yaml.streams.ack_wait_secs),
            ),
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// The bot token, or the fatal startup error when it is not configured
    pub fn require_telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram_token
            .as_deref()
            .ok_or(ConfigError::MissingCredential {
                env: "TELEGRAM_TOKEN",
                yaml: "telegram.token",
            })
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            request_subject: self.request_subject.clone(),
            result_subject: self.result_subject.clone(),
            consumer_group: self.consumer_group.clone(),
            ack_wait: self.ack_wait,
        }
    }
}

// ============================================================================
// Application state and entry points
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub broker: JetStreamBroker,
    pub store: Arc<dyn CorrelationStore>,
    pub publisher: RequestPublisher,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to NATS and make sure both streams and the correlation bucket exist
    pub async fn new(config: Config) -> Result<Self> {
        let client = broker::connect_nats(&config.nats_url).await?;
        let context = async_nats::jetstream::new(client);

        let broker = JetStreamBroker::setup(context, config.stream_settings()).await?;
        let store: Arc<dyn CorrelationStore> = Arc::new(
            KvCorrelationStore::open(
                broker.context(),
                &config.correlation_bucket,
                config.correlation_ttl,
            )
            .await?,
        );
        let publisher = RequestPublisher::new(
            store.clone(),
            Arc::new(broker.request_log()),
            config.correlation_ttl,
        );

        Ok(Self {
            broker,
            store,
            publisher,
            config: Arc::new(config),
        })
    }
}

/// Run the relay until Ctrl-C: result consumer in the background, chat
/// front-end in the foreground.
pub async fn start_relay(config: Config) -> Result<()> {
    let token = config.require_telegram_token()?.to_string();
    let telegram = TelegramTransport::new(token, config.telegram_api_base.clone())?;
    let state = AppState::new(config).await?;
    telegram
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    let transport: Arc<dyn ChatTransport> = Arc::new(telegram);

    let cursor = state
        .broker
        .result_cursor(relay::consumer_name())
        .await?;
    let consumer = ResultConsumer::new(
        Arc::new(cursor),
        DeliveryDispatcher::new(state.store.clone(), transport.clone()),
        state.config.poll_timeout,
    );

    let shutdown = CancellationToken::new();
    let consumer_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { consumer.run(shutdown).await }
    });

    let (tx, rx) = mpsc::channel(100);
    let listener_task = tokio::spawn({
        let transport = transport.clone();
        async move {
            if let Err(e) = transport.listen(tx).await {
                tracing::error!("Chat listener exited: {:#}", e);
            }
        }
    });

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
            }
            shutdown.cancel();
        }
    });

    let frontend = ChatFrontend::new(transport, state.publisher.clone());
    frontend.run(rx, shutdown.clone()).await;

    shutdown.cancel();
    listener_task.abort();
    if let Err(e) = consumer_task.await {
        tracing::error!("Result consumer task failed: {}", e);
    }
    tracing::info!("Relay stopped");
    Ok(())
}

/// Publish one operator-issued request and return its id
pub async fn submit_request(config: Config, requester: RequesterId) -> Result<String> {
    let state = AppState::new(config).await?;
    let request_id = state
        .publisher
        .publish_with_reason(requester, RequestReason::OperatorRequest)
        .await?;
    Ok(request_id)
}

// ============================================================================
// Tests
// ============================================================================
