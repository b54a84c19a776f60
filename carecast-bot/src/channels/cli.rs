//! Terminal channel.
//!
//! Lines typed on stdin become inbound messages; replies routed to `"cli"`
//! are printed to stdout followed by the prompt.

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Channel, ChannelActivity, ChannelState, ChannelStatus};
use crate::config::CliConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Channel name used for routing.
pub const CLI_CHANNEL: &str = "cli";

/// Words that end an interactive session.
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "/quit"];

/// How terminal input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// The user typed an exit command.
    Exit,
    /// Stdin was closed.
    Eof,
}

/// Terminal channel for running alongside other channels in the gateway.
#[derive(Debug)]
pub struct CliChannel {
    activity: Arc<ChannelActivity>,
    config: CliConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CliChannel {
    /// Create a terminal channel with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliConfig::default())
    }

    /// Create a terminal channel with the given settings.
    #[must_use]
    pub fn with_config(config: CliConfig) -> Self {
        Self {
            activity: Arc::new(ChannelActivity::new(CLI_CHANNEL)),
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.activity.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.activity.set_state(ChannelState::Starting);

        let replies = bus.subscribe_channel(CLI_CHANNEL).await;
        let printer = tokio::spawn(relay_replies(
            replies,
            self.config.prompt.clone(),
            Arc::clone(&self.activity),
        ));

        let inbound = bus.inbound_handle();
        let config = self.config.clone();
        let activity = Arc::clone(&self.activity);
        let reader = tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            match read_lines(stdin, &inbound, &config, &activity).await {
                Ok(end) => {
                    activity.set_state(ChannelState::Stopped);
                    info!(
                        ?end,
                        "terminal input ended; other channels keep running until Ctrl+C"
                    );
                }
                Err(e) => activity.record_error(format!("terminal input failed: {e}")),
            }
        });

        self.tasks.lock().await.extend([printer, reader]);
        self.activity.set_state(ChannelState::Running);
        info!("CLI channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.activity.set_state(ChannelState::Stopped);
        info!("CLI channel stopped");
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.activity.status()
    }
}

/// Whether `line` ends the interactive session.
#[must_use]
pub fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS.contains(&line.trim())
}

#[allow(clippy::print_stdout)] // the terminal is this channel's output
fn show_prompt(prompt: &str) {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
}

/// Print replies until the bus drops the subscription.
#[allow(clippy::print_stdout)]
async fn relay_replies(
    mut replies: mpsc::Receiver<OutboundMessage>,
    prompt: String,
    activity: Arc<ChannelActivity>,
) {
    while let Some(msg) = replies.recv().await {
        println!("\n{}\n", msg.content);
        show_prompt(&prompt);
        activity.record_sent();
    }
    debug!("CLI reply printer finished");
}

/// Publish non-empty lines from `input` until EOF or an exit command.
async fn read_lines(
    input: impl AsyncBufRead + Unpin,
    inbound: &InboundHandle,
    config: &CliConfig,
    activity: &ChannelActivity,
) -> ChannelResult<InputEnd> {
    show_prompt(&config.prompt);

    let mut lines = input.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ChannelError::Internal(e.to_string()))?
    {
        let text = line.trim();
        if is_exit_command(text) {
            return Ok(InputEnd::Exit);
        }
        if text.is_empty() {
            show_prompt(&config.prompt);
            continue;
        }

        inbound
            .publish(InboundMessage::cli(&config.session_id, text))
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?;
        activity.record_received(&config.session_id);
    }

    Ok(InputEnd::Eof)
}

/// Run a foreground terminal session until EOF or an exit command.
pub async fn run_interactive(bus: &MessageBus, config: &CliConfig) -> ChannelResult<InputEnd> {
    let activity = Arc::new(ChannelActivity::new(CLI_CHANNEL));
    let replies = bus.subscribe_channel(CLI_CHANNEL).await;
    let printer = tokio::spawn(relay_replies(
        replies,
        config.prompt.clone(),
        Arc::clone(&activity),
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    let result = read_lines(stdin, &bus.inbound_handle(), config, &activity).await;
    printer.abort();

    let status = activity.status();
    debug!(
        messages = status.messages_received,
        replies = status.replies_sent,
        "terminal session ended"
    );
    result
}
