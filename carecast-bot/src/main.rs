//! Carecast CLI - conversational weather bot.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use carecast_bot::channels::cli::run_interactive;
use carecast_bot::config::{TELEGRAM_TOKEN_ENV, WEATHER_API_KEY_ENV};
use carecast_bot::prelude::*;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configuration file path.
const CONFIG_ENV: &str = "CARECAST_CONFIG";

/// Carecast - ask about the weather in any city
#[derive(Parser)]
#[command(name = "carecast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = CONFIG_ENV, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Run the bot on its configured channels
    Run(RunArgs),

    /// Chat with the bot in this terminal
    Chat(ChatArgs),

    /// Send one message and print the replies
    Ask(AskArgs),

    /// Show configuration and environment status
    Status,

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    force: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Also read messages from this terminal
    #[arg(long)]
    cli: bool,

    /// Do not start the Telegram channel
    #[arg(long)]
    no_telegram: bool,
}

#[derive(Args)]
struct ChatArgs {
    /// Prompt printed before each line of input
    #[arg(short, long)]
    prompt: Option<String>,

    /// Session id; reuse it to keep the remembered city
    #[arg(short, long)]
    session: Option<String>,
}

#[derive(Args)]
struct AskArgs {
    /// Message to send, e.g. "weather in Chennai"
    message: String,

    /// Chat id the message is sent from
    #[arg(short, long, default_value = "local")]
    user: String,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show configuration file path
    Path,
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(run(cli));
    // A pending stdin read would otherwise keep the runtime alive.
    rt.shutdown_timeout(Duration::from_millis(200));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "carecast_bot={level},carecast={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init(args) => cmd_init(args, cli.config).await,
        Commands::Run(args) => cmd_run(args, cli.config).await,
        Commands::Chat(args) => cmd_chat(args, cli.config).await,
        Commands::Ask(args) => cmd_ask(args, cli.config).await,
        Commands::Status => cmd_status(cli.config).await,
        Commands::Config(args) => cmd_config(args, cli.config).await,
    }
}

/// Load the configuration file and overlay secrets from the environment.
async fn load(path: Option<PathBuf>) -> Result<BotConfig> {
    let path = path.unwrap_or_else(config_path);
    let mut config = load_config_from(&path).await?;
    config.apply_process_env();
    Ok(config)
}

/// Log every issue without failing.
fn log_issues(config: &BotConfig) {
    for issue in config.validate() {
        match issue.level {
            IssueLevel::Error => tracing::error!("{}", issue.message),
            IssueLevel::Warning => tracing::warn!("{}", issue.message),
        }
    }
}

async fn cmd_init(args: InitArgs, path: Option<PathBuf>) -> Result<()> {
    let config_file = path.unwrap_or_else(config_path);

    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    save_config_to(&BotConfig::default(), &config_file).await?;

    println!("Configuration created: {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. export {WEATHER_API_KEY_ENV}=<key>");
    println!("  2. export {TELEGRAM_TOKEN_ENV}=<token>");
    println!("  3. carecast run");

    Ok(())
}

async fn cmd_run(args: RunArgs, path: Option<PathBuf>) -> Result<()> {
    let mut config = load(path).await?;
    if args.no_telegram {
        config.channels.telegram.enabled = false;
    }
    log_issues(&config);
    config.ensure_valid()?;

    let gateway = GatewayBuilder::new()
        .bot_config(config)
        .enable_cli(args.cli)
        .build()?;

    println!("Carecast running. Press Ctrl+C to stop.\n");

    let run = gateway.run();
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            gateway.stop();
            run.await
        }
    };

    print_gateway_status(&gateway.status().await);
    result
}

fn print_gateway_status(status: &GatewayStatus) {
    println!();
    println!("Traffic:");
    println!("  Messages in:  {}", status.total_inbound);
    println!("  Replies out:  {}", status.total_outbound);
    println!("  Undelivered:  {}", status.undelivered);
    for channel in &status.channels {
        println!();
        println!("Channel {}:", channel.name);
        println!("  Received: {}", channel.messages_received);
        println!("  Sent:     {}", channel.replies_sent);
        println!("  Chats:    {}", channel.chats);
        if let Some(error) = &channel.last_error {
            println!("  Last error: {error}");
        }
    }
}

async fn cmd_chat(args: ChatArgs, path: Option<PathBuf>) -> Result<()> {
    let config = load(path).await?;
    log_issues(&config);

    let mut cli_config = config.channels.cli.clone();
    if let Some(prompt) = args.prompt {
        cli_config.prompt = prompt;
    }
    if let Some(session) = args.session {
        cli_config.session_id = session;
    }

    let weather = OpenWeatherClient::new(&config.weather)?;
    let responder = Arc::new(Responder::from_config(&config, Arc::new(weather)));
    let bus = MessageBus::new();
    let conversation = ConversationLoop::new(bus.clone(), responder);
    let stop = conversation.stop_handle();
    let loop_task = tokio::spawn(async move { conversation.run().await });

    println!("Carecast chat | type 'exit' to quit\n");

    let result = tokio::select! {
        result = run_interactive(&bus, &cli_config) => result.map(|_| ()).map_err(BotError::from),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    stop.stop();
    loop_task.await??;
    result
}

async fn cmd_ask(args: AskArgs, path: Option<PathBuf>) -> Result<()> {
    let config = load(path).await?;
    log_issues(&config);

    let weather = OpenWeatherClient::new(&config.weather)?;
    let responder = Responder::from_config(&config, Arc::new(weather));

    let msg = InboundMessage::cli(&args.user, &args.message);
    for reply in responder.respond(&msg).await {
        println!("{}", reply.content);
    }
    Ok(())
}

async fn cmd_status(path: Option<PathBuf>) -> Result<()> {
    let config_file = path.clone().unwrap_or_else(config_path);

    println!("Carecast Status\n");
    println!("Configuration:");
    println!("  Path:   {}", config_file.display());
    println!(
        "  Exists: {}",
        if config_file.exists() { "yes" } else { "no" }
    );

    match load(path).await {
        Ok(config) => {
            let errors = config
                .validate()
                .iter()
                .filter(|i| i.level == IssueLevel::Error)
                .count();
            println!("  Valid:  {}", if errors == 0 { "yes" } else { "no" });
            println!();
            println!("Weather:");
            println!("  Endpoint: {}", config.weather.base_url);
            println!("  Units:    {}", config.weather.units.as_query());
            println!();
            println!("Channels:");
            println!(
                "  Telegram: {}",
                if config.channels.telegram.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!();
            println!("Conversation:");
            println!("  Preposition scan: {:?}", config.conversation.preposition_scan);
            match config.conversation.max_sessions {
                Some(max) => println!("  Max sessions:     {max}"),
                None => println!("  Max sessions:     unbounded"),
            }
        }
        Err(e) => println!("  Valid:  no ({e})"),
    }

    println!();
    println!("Environment:");
    print_env_status(WEATHER_API_KEY_ENV);
    print_env_status(TELEGRAM_TOKEN_ENV);
    print_env_status(CONFIG_ENV);

    Ok(())
}

async fn cmd_config(args: ConfigArgs, path: Option<PathBuf>) -> Result<()> {
    let config_file = path.unwrap_or_else(config_path);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            if config_file.exists() {
                let content = tokio::fs::read_to_string(&config_file).await?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'carecast init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            let config = load(Some(config_file)).await?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in &issues {
                println!("{issue}");
            }
            config.ensure_valid()?;
        }
    }

    Ok(())
}

fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok() {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
