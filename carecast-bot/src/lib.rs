//! Carecast - a conversational weather bot.
//!
//! Users ask about the weather in a city ("What's the weather in Chennai?")
//! and get a short report. The bot remembers the last city each user asked
//! about and offers a follow-up about it.
//!
//! # Architecture
//!
//! - **Message Bus** ([`bus`]) - inbound queue and per-channel reply routing
//! - **Channels** ([`channels`]) - Telegram and terminal integrations
//! - **Conversation** ([`conversation`]) - intent routing, city extraction
//!   and the reply handlers
//! - **Session** ([`session`]) - last city per user
//! - **Weather** ([`weather`]) - OpenWeatherMap client
//! - **Gateway** ([`gateway`]) - runs everything together
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use carecast_bot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut config = load_config().await?;
//!     config.apply_process_env();
//!     let gateway = GatewayBuilder::new().bot_config(config).build()?;
//!     gateway.run().await
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` (default) - Telegram bot support via teloxide

pub mod bus;
pub mod channel;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod gateway;
pub mod session;
pub mod util;
pub mod weather;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        Result, WeatherError, WeatherResult,
    };

    pub use crate::bus::{BusStats, InboundHandle, MessageBus};

    pub use crate::channel::{Channel, ChannelActivity, ChannelSet, ChannelState, ChannelStatus};
    pub use crate::channels::CliChannel;
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

    pub use crate::config::{
        BotConfig, ChannelConfig, CliConfig, ConfigIssue, ConversationConfig, IssueLevel,
        TelegramConfig, WeatherConfig, config_path, load_config, load_config_from, save_config_to,
    };

    pub use crate::conversation::{
        CityExtractor, ConversationLoop, FollowUp, Intent, IntentRouter, ParsedQuery,
        PrepositionScan, ReplyTemplates, Responder, StopHandle,
    };

    pub use crate::events::{InboundMessage, OutboundMessage};

    pub use crate::gateway::{Gateway, GatewayBuilder, GatewayConfig, GatewayStatus};

    pub use crate::session::{MemorySessionStore, Session, SessionStore};

    pub use crate::weather::{OpenWeatherClient, Units, WeatherFetcher, WeatherSnapshot};

    pub use crate::util::{config_dir, generate_message_id, home_dir, timestamp_ms, truncate_str};
}
