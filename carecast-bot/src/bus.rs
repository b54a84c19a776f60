//! Async message bus between channels and the conversation loop.
//!
//! Inbound traffic is a single queue consumed by the loop. Outbound traffic
//! is routed by channel name to whichever channels subscribed to it.

use crate::error::{BusError, BusResult};
use crate::events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, trace};

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Cloneable handle to the shared bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    channel_subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<OutboundMessage>>>>,
    stats: RwLock<BusStats>,
}

/// Message bus statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusStats {
    /// Inbound messages accepted.
    pub inbound_count: u64,
    /// Outbound messages published.
    pub outbound_count: u64,
    /// Outbound messages no subscriber took.
    pub undelivered_count: u64,
}

impl MessageBus {
    /// Create a new message bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new message bus with the given inbound queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: Mutex::new(inbound_rx),
                channel_subscribers: RwLock::new(HashMap::new()),
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Publish an inbound message from a channel.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> BusResult<()> {
        self.inner.accept(msg).await
    }

    /// Wait up to `timeout` for the next inbound message.
    ///
    /// Only the conversation loop should consume; concurrent consumers take
    /// turns on the receiver.
    pub async fn consume_inbound_timeout(&self, timeout: Duration) -> Option<InboundMessage> {
        let mut rx = self.inner.inbound_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Route an outbound message to the subscribers of its channel.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing outbound message");

        let senders = self
            .inner
            .channel_subscribers
            .read()
            .await
            .get(&msg.channel)
            .cloned()
            .unwrap_or_default();

        let mut delivered = false;
        for sender in senders {
            if sender.send(msg.clone()).await.is_ok() {
                delivered = true;
            } else {
                debug!(channel = %msg.channel, "channel subscriber disconnected");
            }
        }

        let mut stats = self.inner.stats.write().await;
        stats.outbound_count += 1;
        if !delivered {
            stats.undelivered_count += 1;
        }
        Ok(())
    }

    /// Subscribe to outbound messages for one channel.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        self.inner
            .channel_subscribers
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        debug!(channel = %channel, "new channel subscriber registered");
        rx
    }

    /// Get current bus statistics.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Lightweight handle for channels that only publish inbound traffic.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBusInner {
    async fn accept(&self, msg: InboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, sender = %msg.sender_id, "publishing inbound message");
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|_| BusError::InboundClosed)?;
        self.stats.write().await.inbound_count += 1;
        Ok(())
    }
}

/// Publishing side of the bus handed to channel tasks.
///
/// Counts toward [`BusStats::inbound_count`] like
/// [`MessageBus::publish_inbound`].
#[derive(Clone)]
pub struct InboundHandle {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for InboundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundHandle").finish_non_exhaustive()
    }
}

impl InboundHandle {
    /// Publish an inbound message.
    pub async fn publish(&self, msg: InboundMessage) -> BusResult<()> {
        self.inner.accept(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inbound_message_flow() {
        let bus = MessageBus::new();

        let msg = InboundMessage::new("test", "sender1", "chat1", "weather in Oslo");
        bus.publish_inbound(msg).await.unwrap();

        let received = bus
            .consume_inbound_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(received.content, "weather in Oslo");
    }

    #[tokio::test]
    async fn test_consume_times_out_when_empty() {
        let bus = MessageBus::new();
        let received = bus.consume_inbound_timeout(Duration::from_millis(10)).await;
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_channel_routing() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe_channel("telegram").await;

        bus.publish_outbound(OutboundMessage::new("telegram", "chat1", "For Telegram"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("cli", "chat2", "For CLI"))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.content, "For Telegram");
        assert!(rx.try_recv().is_err());

        let stats = bus.stats().await;
        assert_eq!(stats.outbound_count, 2);
        assert_eq!(stats.undelivered_count, 1);
    }

    #[tokio::test]
    async fn test_inbound_handle() {
        let bus = MessageBus::new();
        let handle = bus.inbound_handle();
        handle
            .publish(InboundMessage::cli("local", "yes"))
            .await
            .unwrap();

        let received = bus.consume_inbound_timeout(Duration::from_millis(100)).await;
        assert_eq!(received.unwrap().content, "yes");
        assert_eq!(bus.stats().await.inbound_count, 1);
    }

    #[tokio::test]
    async fn test_subscribe_while_subscriber_is_full() {
        let bus = MessageBus::new();
        let _stalled = bus.subscribe_channel("cli").await;

        let publisher = bus.clone();
        let flood = tokio::spawn(async move {
            for i in 0..=DEFAULT_QUEUE_CAPACITY {
                publisher
                    .publish_outbound(OutboundMessage::new("cli", "local", format!("reply {i}")))
                    .await
                    .unwrap();
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!flood.is_finished());

        let subscribed = tokio::time::timeout(
            Duration::from_millis(500),
            bus.subscribe_channel("telegram"),
        )
        .await;
        assert!(subscribed.is_ok());
        flood.abort();
    }
}
