//! Bot configuration.
//!
//! Configuration is a JSON file (default `~/.carecast/config.json`) overlaid
//! with the two secrets from the environment. Every section has defaults, so
//! a missing file or a partial file is fine.

use crate::conversation::{PrepositionScan, ReplyTemplates};
use crate::error::{ConfigError, ConfigResult};
use crate::util::config_dir;
use crate::weather::Units;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the OpenWeatherMap API key.
pub const WEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Environment variable holding the Telegram bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Weather provider settings.
    pub weather: WeatherConfig,
    /// Channel settings.
    pub channels: ChannelConfig,
    /// Conversation behaviour.
    pub conversation: ConversationConfig,
    /// Reply wording.
    pub replies: ReplyTemplates,
}

/// Weather provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key.
    pub api_key: Option<String>,
    /// Provider base URL; must end with `/`.
    pub base_url: String,
    /// Unit system for readings.
    pub units: Units,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_WEATHER_URL.to_string(),
            units: Units::Metric,
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("units", &self.units)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Telegram bot.
    pub telegram: TelegramConfig,
    /// Interactive terminal.
    pub cli: CliConfig,
}

/// Telegram settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the gateway starts the Telegram channel.
    pub enabled: bool,
    /// Bot token from @BotFather.
    pub token: Option<String>,
    /// Telegram user ids allowed to talk to the bot. Empty allows everyone.
    pub allow_from: Vec<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            allow_from: Vec::new(),
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("allow_from", &self.allow_from)
            .finish()
    }
}

/// Terminal channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prompt printed before each line of input.
    pub prompt: String,
    /// Chat id used for the terminal session.
    pub session_id: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "You: ".to_string(),
            session_id: "local".to_string(),
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// How the city extractor picks the split preposition.
    pub preposition_scan: PrepositionScan,
    /// Upper bound on remembered sessions. `None` keeps every user forever.
    pub max_sessions: Option<usize>,
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The affected feature cannot work.
    Error,
    /// Suspicious but usable.
    Warning,
}

/// A problem found by [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Human-readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
        };
        write!(f, "{level}: {}", self.message)
    }
}

impl BotConfig {
    /// Overlay secrets from the environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Overlay secrets using `lookup` as the environment.
    ///
    /// Non-empty values win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(WEATHER_API_KEY_ENV) {
            self.weather.api_key = Some(key);
        }
        if let Some(token) = non_empty(TELEGRAM_TOKEN_ENV) {
            self.channels.telegram.token = Some(token);
        }
    }

    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.weather.api_key.as_deref().is_none_or(str::is_empty) {
            issues.push(ConfigIssue::error(format!(
                "{WEATHER_API_KEY_ENV} is missing; weather lookups will fail"
            )));
        }
        if !self.weather.base_url.ends_with('/') {
            issues.push(ConfigIssue::warning(
                "weather.base_url should end with '/'; its last path segment will be replaced",
            ));
        }
        if self.weather.timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                "weather.timeout_secs is 0; every request will time out",
            ));
        }

        let telegram = &self.channels.telegram;
        if telegram.enabled && telegram.token.as_deref().is_none_or(str::is_empty) {
            issues.push(ConfigIssue::error(format!(
                "{TELEGRAM_TOKEN_ENV} is missing; the Telegram channel cannot start"
            )));
        }
        for user in &telegram.allow_from {
            if user.parse::<i64>().is_err() {
                issues.push(ConfigIssue::warning(format!(
                    "channels.telegram.allow_from entry '{user}' is not a numeric user id"
                )));
            }
        }

        if self.conversation.max_sessions == Some(0) {
            issues.push(ConfigIssue::warning(
                "conversation.max_sessions is 0; one session will still be kept",
            ));
        }

        issues
    }

    /// Fail when any error-level issue is present.
    pub fn ensure_valid(&self) -> ConfigResult<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|i| i.level == IssueLevel::Error)
            .map(|i| i.message)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::missing(errors.join("; ")))
        }
    }
}

/// Default configuration file path.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from `path`, or defaults when the file does not exist.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    if !tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(BotConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = serde_json::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load configuration from the default path.
pub async fn load_config() -> ConfigResult<BotConfig> {
    load_config_from(&config_path()).await
}

/// Write `config` as pretty JSON to `path`, creating parent directories.
pub async fn save_config_to(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.weather.units, Units::Metric);
        assert_eq!(config.weather.timeout_secs, 10);
        assert!(config.channels.telegram.enabled);
        assert_eq!(config.conversation.preposition_scan, PrepositionScan::Priority);
        assert!(config.conversation.max_sessions.is_none());
    }

    #[test]
    fn test_missing_credentials_are_errors() {
        let config = BotConfig::default();
        let issues = config.validate();
        let errors = issues
            .iter()
            .filter(|i| i.level == IssueLevel::Error)
            .count();
        assert_eq!(errors, 2);
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = BotConfig::default();
        config.apply_env(env(&[
            (WEATHER_API_KEY_ENV, "owm-key"),
            (TELEGRAM_TOKEN_ENV, "123:abc"),
        ]));

        assert_eq!(config.weather.api_key.as_deref(), Some("owm-key"));
        assert_eq!(config.channels.telegram.token.as_deref(), Some("123:abc"));
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_empty_env_value_does_not_override() {
        let mut config = BotConfig::default();
        config.weather.api_key = Some("from-file".to_string());
        config.apply_env(env(&[(WEATHER_API_KEY_ENV, "  ")]));
        assert_eq!(config.weather.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_disabled_telegram_needs_no_token() {
        let mut config = BotConfig::default();
        config.channels.telegram.enabled = false;
        config.weather.api_key = Some("k".to_string());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: BotConfig =
            serde_json::from_str(r#"{"weather": {"units": "imperial"}}"#).unwrap();
        assert_eq!(config.weather.units, Units::Imperial);
        assert_eq!(config.weather.base_url, DEFAULT_WEATHER_URL);
        assert_eq!(config.replies, ReplyTemplates::default());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = BotConfig::default();
        config.weather.api_key = Some("super-secret".to_string());
        config.channels.telegram.token = Some("also-secret".to_string());
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("also-secret"));
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("carecast-missing-config-test.json");
        let config = load_config_from(&path).await.unwrap();
        assert!(config.weather.api_key.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("carecast-{}", crate::util::generate_message_id()));
        let path = dir.join("config.json");

        let mut config = BotConfig::default();
        config.conversation.max_sessions = Some(100);
        save_config_to(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.conversation.max_sessions, Some(100));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
