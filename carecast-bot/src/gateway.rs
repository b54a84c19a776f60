//! Gateway service for running the complete bot.
//!
//! The gateway wires together:
//! - the message bus
//! - the channel set (Telegram, CLI)
//! - the conversation loop and its weather client

use crate::bus::MessageBus;
use crate::channel::{ChannelSet, ChannelStatus};
use crate::channels::CliChannel;
use crate::config::BotConfig;
use crate::conversation::{ConversationLoop, Responder, StopHandle};
use crate::error::Result;
use crate::weather::{OpenWeatherClient, WeatherFetcher};

#[cfg(feature = "telegram")]
use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};
#[cfg(feature = "telegram")]
use tracing::error;

use std::sync::Arc;
use tracing::{info, warn};

/// Gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Bot configuration.
    pub bot_config: BotConfig,
    /// Whether to attach the terminal channel.
    pub enable_cli: bool,
}

/// Runs the channels and the conversation loop over one bus.
pub struct Gateway {
    bus: MessageBus,
    channels: ChannelSet,
    conversation: ConversationLoop,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("channels", &self.channels)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway that fetches weather with `weather`.
    pub fn new(config: &GatewayConfig, weather: Arc<dyn WeatherFetcher>) -> Self {
        let bus = MessageBus::new();
        let responder = Arc::new(Responder::from_config(&config.bot_config, weather));
        Self {
            channels: channels_for(config),
            conversation: ConversationLoop::new(bus.clone(), responder),
            bus,
        }
    }

    /// Create a gateway backed by OpenWeatherMap.
    pub fn with_openweather(config: &GatewayConfig) -> Result<Self> {
        let client = OpenWeatherClient::new(&config.bot_config.weather)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// The message bus.
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Start the channels and answer messages until [`stop`](Self::stop).
    ///
    /// Logs a [`GatewayStatus`] summary on the way out.
    pub async fn run(&self) -> Result<()> {
        info!("Gateway starting");

        let started = self.channels.start_all(&self.bus).await;
        if started == 0 {
            warn!("no channel is running; messages can only arrive through the bus");
        }

        info!(channels = started, "Gateway started");
        let result = self.conversation.run().await;

        info!("Gateway stopping");
        self.channels.stop_all().await;
        self.status().await.log_summary();
        info!("Gateway stopped");
        result
    }

    /// Ask the conversation loop to stop; [`run`](Self::run) then returns.
    ///
    /// Also effective before `run` is called.
    pub fn stop(&self) {
        self.conversation.stop();
    }

    /// Handle that stops the gateway from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.conversation.stop_handle()
    }

    /// Whether the conversation loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.conversation.is_running()
    }

    /// Channel and traffic summary.
    pub async fn status(&self) -> GatewayStatus {
        let bus_stats = self.bus.stats().await;
        GatewayStatus {
            running: self.is_running(),
            channels: self.channels.statuses(),
            total_inbound: bus_stats.inbound_count,
            total_outbound: bus_stats.outbound_count,
            undelivered: bus_stats.undelivered_count,
        }
    }
}

fn channels_for(config: &GatewayConfig) -> ChannelSet {
    let mut channels = ChannelSet::new();

    #[cfg(feature = "telegram")]
    {
        let telegram = &config.bot_config.channels.telegram;
        if telegram.enabled {
            match TelegramChannelConfig::from_config(telegram) {
                Some(tg_config) => channels.add(TelegramChannel::new(tg_config)),
                None => error!("Telegram enabled but no token configured"),
            }
        }
    }
    #[cfg(not(feature = "telegram"))]
    if config.bot_config.channels.telegram.enabled {
        warn!("Telegram enabled in config but this build lacks the `telegram` feature");
    }

    if config.enable_cli {
        channels.add(CliChannel::with_config(
            config.bot_config.channels.cli.clone(),
        ));
    }

    channels
}

/// Gateway status information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStatus {
    /// Whether the conversation loop is running.
    pub running: bool,
    /// Per-channel activity.
    pub channels: Vec<ChannelStatus>,
    /// Messages published by channels.
    pub total_inbound: u64,
    /// Replies published by the conversation loop.
    pub total_outbound: u64,
    /// Replies addressed to a channel nobody subscribed to.
    pub undelivered: u64,
}

impl GatewayStatus {
    /// Write the summary to the log.
    pub fn log_summary(&self) {
        info!(
            inbound = self.total_inbound,
            outbound = self.total_outbound,
            undelivered = self.undelivered,
            "bus traffic"
        );
        for channel in &self.channels {
            info!(
                channel = %channel.name,
                state = ?channel.state,
                received = channel.messages_received,
                sent = channel.replies_sent,
                chats = channel.chats,
                healthy = channel.is_healthy(),
                "channel activity"
            );
        }
    }
}

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    weather: Option<Arc<dyn WeatherFetcher>>,
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Create a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bot configuration.
    #[must_use]
    pub fn bot_config(mut self, config: BotConfig) -> Self {
        self.config.bot_config = config;
        self
    }

    /// Attach the terminal channel.
    #[must_use]
    pub const fn enable_cli(mut self, enable: bool) -> Self {
        self.config.enable_cli = enable;
        self
    }

    /// Use `weather` instead of the OpenWeatherMap client.
    #[must_use]
    pub fn weather(mut self, weather: Arc<dyn WeatherFetcher>) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        match self.weather {
            Some(weather) => Ok(Gateway::new(&self.config, weather)),
            None => Gateway::with_openweather(&self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeatherResult;
    use crate::events::InboundMessage;
    use crate::weather::{Units, WeatherSnapshot};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Sunny;

    #[async_trait]
    impl WeatherFetcher for Sunny {
        async fn fetch_weather(&self, _city: &str) -> WeatherResult<WeatherSnapshot> {
            Ok(WeatherSnapshot {
                temperature: Some(21.0),
                humidity_percent: Some(40.0),
                wind_speed: Some(2.0),
                condition: Some("clear sky".to_string()),
                units: Units::Metric,
            })
        }
    }

    fn headless_config() -> BotConfig {
        let mut config = BotConfig::default();
        config.channels.telegram.enabled = false;
        config
    }

    #[test]
    fn test_builder_without_key_still_builds() {
        let gateway = GatewayBuilder::new()
            .bot_config(headless_config())
            .build()
            .unwrap();
        assert!(!gateway.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_run_returns() {
        let gateway = GatewayBuilder::new()
            .bot_config(headless_config())
            .weather(Arc::new(Sunny))
            .build()
            .unwrap();
        gateway.stop();

        tokio::time::timeout(Duration::from_secs(1), gateway.run())
            .await
            .expect("run ignored an earlier stop")
            .unwrap();
        assert!(!gateway.is_running());
    }

    #[tokio::test]
    async fn test_status_lists_registered_channels() {
        let gateway = GatewayBuilder::new()
            .bot_config(headless_config())
            .enable_cli(true)
            .weather(Arc::new(Sunny))
            .build()
            .unwrap();

        let status = gateway.status().await;
        assert_eq!(status.channels.len(), 1);
        let cli = &status.channels[0];
        assert_eq!(cli.name, "cli");
        assert_eq!(cli.state, crate::channel::ChannelState::Stopped);
        assert_eq!(cli.messages_received, 0);
        assert!(!cli.is_healthy());
    }

    #[tokio::test]
    async fn test_gateway_answers_over_bus() {
        let gateway = Arc::new(
            GatewayBuilder::new()
                .bot_config(headless_config())
                .weather(Arc::new(Sunny))
                .build()
                .unwrap(),
        );
        let mut replies = gateway.bus().subscribe_channel("test").await;

        let runner = Arc::clone(&gateway);
        let task = tokio::spawn(async move { runner.run().await });

        gateway
            .bus()
            .publish_inbound(InboundMessage::new("test", "u1", "c1", "weather in Oslo"))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.content.contains("Oslo"));
        assert_eq!(first.chat_id, "c1");

        let status = gateway.status().await;
        assert!(status.running);
        assert!(status.channels.is_empty());
        assert_eq!(status.total_inbound, 1);

        gateway.stop_handle().stop();
        task.await.unwrap().unwrap();
        assert!(!gateway.is_running());
    }
}
