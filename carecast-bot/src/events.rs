//! Message events flowing through the bus.
//!
//! Channels publish [`InboundMessage`]s; the conversation loop answers each
//! with zero or more [`OutboundMessage`]s addressed back to the same chat.

use crate::util::generate_message_id;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// An inbound chat message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Channel identifier (e.g., "telegram", "cli").
    pub channel: String,
    /// Sender's identifier within the channel.
    pub sender_id: String,
    /// Chat/conversation identifier.
    pub chat_id: String,
    /// Message text content.
    pub content: String,
    /// Timestamp when the message was received.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create a CLI message for the given chat.
    pub fn cli(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new("cli", "user", chat_id, content)
    }

    /// Key identifying the user's conversation across messages.
    ///
    /// Telegram private chats have one chat per user, so the chat id is the
    /// user identity the session store is keyed by.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

/// An outbound reply to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Target channel identifier.
    pub channel: String,
    /// Target chat/conversation identifier.
    pub chat_id: String,
    /// Message text content.
    pub content: String,
    /// Inbound message this answers, if any.
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
        }
    }

    /// Create a reply to an inbound message.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self {
            reply_to: Some(msg.id.clone()),
            ..Self::new(msg.channel.clone(), msg.chat_id.clone(), content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::new("telegram", "user123", "chat456", "weather in Paris");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.sender_id, "user123");
        assert_eq!(msg.content, "weather in Paris");
        assert_eq!(msg.session_key(), "telegram:chat456");
    }

    #[test]
    fn test_outbound_reply() {
        let inbound = InboundMessage::cli("local", "Hi");
        let outbound = OutboundMessage::reply_to(&inbound, "Hello back!");

        assert_eq!(outbound.channel, "cli");
        assert_eq!(outbound.chat_id, "local");
        assert_eq!(outbound.reply_to, Some(inbound.id));
    }
}
