//! Channel implementations.
//!
//! - [`cli::CliChannel`] - terminal channel (always available)
//! - [`telegram::TelegramChannel`] - Telegram bot (requires `telegram` feature)

pub mod cli;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use cli::{CliChannel, InputEnd};

#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
