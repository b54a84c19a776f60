//! Conversation loop: consumes inbound messages and publishes the replies.

use super::responder::Responder;
use crate::bus::MessageBus;
use crate::error::Result;
use crate::events::InboundMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Upper bound on one wait for inbound traffic.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls messages off the bus and answers each on its own task.
///
/// A slow weather lookup for one user does not hold up anyone else. Replies
/// to a single message are published in order; replies to two overlapping
/// messages from the same user may interleave.
///
/// Stopping is one-way: a loop asked to stop, even before [`run`](Self::run)
/// was called, returns from `run` and cannot be restarted.
#[derive(Debug)]
pub struct ConversationLoop {
    bus: MessageBus,
    responder: Arc<Responder>,
    stop_tx: Arc<watch::Sender<bool>>,
    running: AtomicBool,
}

impl ConversationLoop {
    /// Create a loop over `bus` answering with `responder`.
    pub fn new(bus: MessageBus, responder: Arc<Responder>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            bus,
            responder,
            stop_tx: Arc::new(stop_tx),
            running: AtomicBool::new(false),
        }
    }

    /// Answer messages until stopped.
    pub async fn run(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            debug!("Conversation loop stopped before it started");
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Conversation loop started");

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                next = self.bus.consume_inbound_timeout(POLL_INTERVAL) => {
                    let Some(msg) = next else { continue };

                    let bus = self.bus.clone();
                    let responder = Arc::clone(&self.responder);
                    tokio::spawn(async move {
                        Self::answer(&bus, &responder, &msg).await;
                    });
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Conversation loop stopped");
        Ok(())
    }

    /// Ask the loop to stop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Handle that stops this loop from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Whether [`run`](Self::run) is currently answering messages.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn answer(bus: &MessageBus, responder: &Responder, msg: &InboundMessage) {
        debug!(channel = %msg.channel, sender = %msg.sender_id, "processing message");

        for reply in responder.respond(msg).await {
            if let Err(e) = bus.publish_outbound(reply).await {
                error!(error = %e, "failed to publish reply");
            }
        }
    }
}

/// Cloneable stop switch for a [`ConversationLoop`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Ask the loop to stop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
