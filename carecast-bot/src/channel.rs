//! Channel trait and per-channel activity tracking.
//!
//! A channel connects one chat platform to the [`MessageBus`]: it publishes
//! what users send and relays the replies routed to its name. The gateway
//! owns its channels in a [`ChannelSet`].

use crate::bus::MessageBus;
use crate::error::ChannelResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Not started, or stopped.
    #[default]
    Stopped,
    /// Connecting.
    Starting,
    /// Relaying messages.
    Running,
}

/// Point-in-time view of one channel.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Lifecycle state.
    pub state: ChannelState,
    /// User messages published to the bus.
    pub messages_received: u64,
    /// Replies delivered to users.
    pub replies_sent: u64,
    /// Distinct chats that have written to the bot.
    pub chats: usize,
    /// Most recent relay error.
    pub last_error: Option<String>,
}

impl ChannelStatus {
    /// Running with no recorded error.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == ChannelState::Running && self.last_error.is_none()
    }
}

/// A chat platform integration.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Name used to route replies to this channel.
    fn name(&self) -> &str;

    /// Subscribe to this channel's replies and spawn the relay tasks.
    async fn start(&self, bus: &MessageBus) -> ChannelResult<()>;

    /// Stop relaying.
    async fn stop(&self) -> ChannelResult<()>;

    /// Current activity.
    fn status(&self) -> ChannelStatus;
}

/// Activity counters shared between a channel and its relay tasks.
///
/// Counters are lock-free so relay tasks can bump them without awaiting.
#[derive(Debug)]
pub struct ChannelActivity {
    name: String,
    state: Mutex<ChannelState>,
    received: AtomicU64,
    sent: AtomicU64,
    chats: Mutex<HashSet<String>>,
    last_error: Mutex<Option<String>>,
}

impl ChannelActivity {
    /// Fresh, stopped activity for the channel called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ChannelState::Stopped),
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            chats: Mutex::new(HashSet::new()),
            last_error: Mutex::new(None),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move to `state`.
    pub fn set_state(&self, state: ChannelState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// A user message from `chat_id` reached the bus.
    pub fn record_received(&self, chat_id: &str) {
        self.received.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut chats) = self.chats.lock() {
            chats.insert(chat_id.to_string());
        }
    }

    /// A reply reached the user.
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Log and remember a relay error.
    pub fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error);
        }
    }

    /// Snapshot for status reporting.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            name: self.name.clone(),
            state: self.state.lock().map(|s| *s).unwrap_or_default(),
            messages_received: self.received.load(Ordering::Relaxed),
            replies_sent: self.sent.load(Ordering::Relaxed),
            chats: self.chats.lock().map(|c| c.len()).unwrap_or_default(),
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
        }
    }
}

/// The channels one gateway runs.
#[derive(Default)]
pub struct ChannelSet {
    channels: Vec<Box<dyn Channel>>,
}

impl std::fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.channels.iter().map(|c| c.name()))
            .finish()
    }
}

impl ChannelSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel.
    pub fn add(&mut self, channel: impl Channel + 'static) {
        info!(channel = %channel.name(), "channel registered");
        self.channels.push(Box::new(channel));
    }

    /// Whether no channel was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel on `bus`; returns how many started.
    pub async fn start_all(&self, bus: &MessageBus) -> usize {
        let mut started = 0;
        for channel in &self.channels {
            match channel.start(bus).await {
                Ok(()) => started += 1,
                Err(e) => warn!(channel = %channel.name(), error = %e, "channel failed to start"),
            }
        }
        started
    }

    /// Stop every channel, logging failures.
    pub async fn stop_all(&self) {
        for channel in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %channel.name(), error = %e, "channel failed to stop");
            }
        }
    }

    /// Status of every channel, in registration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<ChannelStatus> {
        self.channels.iter().map(|c| c.status()).collect()
    }
}
