//! Telegram channel using teloxide.
//!
//! # Setup
//!
//! 1. Create a bot via [@BotFather](https://t.me/botfather)
//! 2. Export the token as `TELEGRAM_BOT_TOKEN`
//! 3. Run `carecast run`
//!
//! Text messages from allowed users are published on the bus keyed by chat
//! id; replies routed to `"telegram"` are sent back as plain text.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelActivity, ChannelState, ChannelStatus};
use crate::config::TelegramConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Channel name used for routing.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Allowed user IDs. Empty means allow all.
    pub allowed_users: Vec<i64>,
}

impl std::fmt::Debug for TelegramChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannelConfig")
            .field("token", &"<redacted>")
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

impl TelegramChannelConfig {
    /// Create a config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            allowed_users: Vec::new(),
        }
    }

    /// Build from the Telegram section of the bot configuration.
    ///
    /// Returns `None` without a token. Non-numeric allowlist entries are
    /// skipped with a warning.
    #[must_use]
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        let token = config.token.as_deref().filter(|t| !t.is_empty())?;
        let allowed = config.allow_from.iter().filter_map(|id| {
            id.parse::<i64>()
                .inspect_err(|_| warn!(user_id = %id, "ignoring non-numeric telegram user id"))
                .ok()
        });
        Some(Self::new(token).allow_users(allowed))
    }

    /// Add an allowed user ID.
    #[must_use]
    pub fn allow_user(mut self, user_id: i64) -> Self {
        self.allowed_users.push(user_id);
        self
    }

    /// Add multiple allowed user IDs.
    #[must_use]
    pub fn allow_users(mut self, user_ids: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_users.extend(user_ids);
        self
    }

    /// Check if a user is allowed.
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

/// Telegram channel implementation.
pub struct TelegramChannel {
    activity: Arc<ChannelActivity>,
    config: TelegramChannelConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("activity", &self.activity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a Telegram channel.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            activity: Arc::new(ChannelActivity::new(TELEGRAM_CHANNEL)),
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn parse_chat_id(chat_id: &str) -> ChannelResult<ChatId> {
        chat_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| ChannelError::send(format!("invalid chat ID: {chat_id}")))
    }

    /// Send replies routed to `"telegram"` until the bus drops the subscription.
    async fn relay_replies(
        bot: Bot,
        mut replies: mpsc::Receiver<OutboundMessage>,
        activity: Arc<ChannelActivity>,
    ) {
        while let Some(msg) = replies.recv().await {
            let chat_id = match Self::parse_chat_id(&msg.chat_id) {
                Ok(id) => id,
                Err(e) => {
                    activity.record_error(e.to_string());
                    continue;
                }
            };
            match bot.send_message(chat_id, &msg.content).await {
                Ok(_) => activity.record_sent(),
                Err(e) => activity.record_error(format!("send to {}: {e}", msg.chat_id)),
            }
        }
        debug!("Telegram reply relay finished");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.activity.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.activity.set_state(ChannelState::Starting);

        if self.config.token.is_empty() {
            self.activity.set_state(ChannelState::Stopped);
            return Err(ChannelError::start("telegram token is empty"));
        }

        let bot = Bot::new(&self.config.token);

        // Replies: bus -> Telegram
        let replies = bus.subscribe_channel(TELEGRAM_CHANNEL).await;
        let relay = tokio::spawn(Self::relay_replies(
            bot.clone(),
            replies,
            Arc::clone(&self.activity),
        ));

        // Messages: Telegram -> bus
        let bus_handle = bus.inbound_handle();
        let config = self.config.clone();
        let activity = Arc::clone(&self.activity);
        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let bus_handle = bus_handle.clone();
            let config = config.clone();
            let activity = Arc::clone(&activity);

            async move {
                #[allow(clippy::cast_possible_wrap)] // Telegram user ids fit in i64
                let user_id = msg.from.as_ref().map_or(0, |u| u.id.0 as i64);
                let chat_id = msg.chat.id.0;

                if !config.is_user_allowed(user_id) {
                    debug!(user_id, chat_id, "message from unauthorized user");
                    return Ok::<(), teloxide::RequestError>(());
                }

                let Some(text) = msg.text() else {
                    debug!(chat_id, "ignoring non-text message");
                    return Ok(());
                };

                let chat = chat_id.to_string();
                let inbound =
                    InboundMessage::new(TELEGRAM_CHANNEL, user_id.to_string(), chat.clone(), text);
                match bus_handle.publish(inbound).await {
                    Ok(()) => activity.record_received(&chat),
                    Err(e) => activity.record_error(format!("publish to bus: {e}")),
                }

                Ok(())
            }
        });

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build();
        let polling = tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.tasks.lock().await.extend([relay, polling]);
        self.activity.set_state(ChannelState::Running);
        info!(allowed_users = self.config.allowed_users.len(), "Telegram channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.activity.set_state(ChannelState::Stopped);
        info!("Telegram channel stopped");
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.activity.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TelegramChannelConfig::new("token123").allow_user(12345);

        assert_eq!(config.token, "token123");
        assert!(config.is_user_allowed(12345));
        assert!(!config.is_user_allowed(99999));
    }

    #[test]
    fn test_empty_allowlist() {
        let config = TelegramChannelConfig::new("token");
        assert!(config.is_user_allowed(12345));
    }

    #[test]
    fn test_from_config() {
        let section = TelegramConfig {
            enabled: true,
            token: Some("123:abc".to_string()),
            allow_from: vec!["42".to_string(), "not-a-number".to_string()],
        };
        let config = TelegramChannelConfig::from_config(&section).unwrap();
        assert_eq!(config.allowed_users, vec![42]);

        let no_token = TelegramConfig::default();
        assert!(TelegramChannelConfig::from_config(&no_token).is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = TelegramChannelConfig::new("123:secret");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(TelegramChannel::parse_chat_id("-100123").unwrap(), ChatId(-100_123));
        assert!(TelegramChannel::parse_chat_id("cli").is_err());
    }

    #[tokio::test]
    async fn test_empty_token_fails_to_start() {
        let channel = TelegramChannel::new(TelegramChannelConfig::new(""));
        let err = channel.start(&MessageBus::new()).await.unwrap_err();
        assert!(matches!(err, ChannelError::StartFailed(_)));
        assert_eq!(channel.status().state, ChannelState::Stopped);
    }

    #[tokio::test]
    async fn test_unparseable_chat_is_recorded() {
        let bus = MessageBus::new();
        let activity = Arc::new(ChannelActivity::new(TELEGRAM_CHANNEL));
        let replies = bus.subscribe_channel(TELEGRAM_CHANNEL).await;
        let relay = tokio::spawn(TelegramChannel::relay_replies(
            Bot::new("123:abc"),
            replies,
            Arc::clone(&activity),
        ));

        bus.publish_outbound(OutboundMessage::new(TELEGRAM_CHANNEL, "cli", "hi"))
            .await
            .unwrap();
        drop(bus);
        relay.await.unwrap();

        let status = activity.status();
        assert_eq!(status.replies_sent, 0);
        assert!(status.last_error.unwrap().contains("invalid chat ID"));
    }
}
