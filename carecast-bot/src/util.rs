//! Small shared helpers.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the per-user configuration directory under `$HOME`.
const CONFIG_DIR_NAME: &str = ".carecast";

/// Generate a unique message identifier.
#[must_use]
pub fn generate_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current time as Unix milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// The user's home directory, falling back to the working directory.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.carecast`
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(CONFIG_DIR_NAME)
}

/// Truncate a string to at most `max_chars` characters, appending `...` when
/// anything was cut.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
