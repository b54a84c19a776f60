//! Unified error types for carecast-bot.
//!
//! Module-specific errors convert into [`BotError`], which is what the
//! binary and the gateway propagate. The conversation core never returns an
//! error to the user: fetch failures end in an apology reply instead.

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for carecast-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Message bus error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Weather provider error.
    #[error("weather: {0}")]
    Weather(#[from] WeatherError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Task join error.
    #[error("task: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for BotError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias for carecast-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Message Bus Errors
// ============================================================================

/// Error type for message bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The inbound queue has no receiver left.
    #[error("inbound channel closed")]
    InboundClosed,
}

/// Result type for message bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Internal error.
    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required value.
    #[error("missing: {0}")]
    Missing(String),
}

impl ConfigError {
    /// Create a missing value error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Weather Provider Errors
// ============================================================================

/// Why a weather lookup produced no data.
///
/// The responder treats every variant the same way (an apology naming the
/// city); the distinction only matters for operator logs.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// Transport failure, including timeouts.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the provider.
        body: String,
    },

    /// The payload could not be decoded or lacks required sections.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// No API key was configured.
    #[error("no API key configured")]
    MissingApiKey,

    /// The provider URL could not be built.
    #[error("url: {0}")]
    Url(#[from] url::ParseError),
}

impl WeatherError {
    /// Create a malformed payload error.
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Result type for weather provider operations.
pub type WeatherResult<T> = std::result::Result<T, WeatherError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let bot_err: BotError = BusError::InboundClosed.into();
        assert!(matches!(bot_err, BotError::Bus(_)));

        let bot_err: BotError = ChannelError::start("no token").into();
        assert!(matches!(bot_err, BotError::Channel(_)));

        let bot_err: BotError = WeatherError::MissingApiKey.into();
        assert!(matches!(bot_err, BotError::Weather(_)));
    }

    #[test]
    fn test_error_helpers() {
        let err: BotError = ConfigError::missing("OPENWEATHER_API_KEY").into();
        assert_eq!(err.to_string(), "config: missing: OPENWEATHER_API_KEY");

        let err = ChannelError::send("invalid chat ID: cli");
        assert!(matches!(err, ChannelError::SendFailed(_)));
    }

    #[test]
    fn test_status_error_display() {
        let err = WeatherError::Status {
            status: 404,
            body: "city not found".to_string(),
        };
        assert_eq!(err.to_string(), "status 404: city not found");
    }
}
