mod config_commands;
mod console;
mod token_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tgsync_config::{ConfigStore, FileConfigStore},
    tgsync_runtime::{DeviceIdentity, SupervisorOptions, TelegramSync},
    tgsync_telegram::{BotConnectorConfig, LogUpdates, TelegramBotConnector},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::console::{ConsoleIndicator, TerminalPinPrompt};

#[derive(Parser)]
#[command(name = "tgsync", about = "tgsync: keep Telegram sessions connected for message sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Configuration file (overrides the default search).
    #[arg(long, global = true, env = "TGSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the device id (overrides the default).
    #[arg(long, global = true, env = "TGSYNC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Bot API base URL (e.g. a local Bot API server).
    #[arg(long, global = true, env = "TGSYNC_BOT_API_URL")]
    bot_api_url: Option<String>,

    /// Probe the bot on idle restart ticks (defaults to on for macOS).
    #[arg(long, global = true)]
    probe_idle_bot: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and keep the sessions alive (default when no subcommand is provided).
    Run,
    /// Print this device's id, for use as `main_device_id`.
    DeviceId,
    /// Bot token management.
    Token {
        #[command(subcommand)]
        action: token_commands::TokenAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(tgsync_config::find_or_default_config_path)
}

fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
    cli.data_dir
        .clone()
        .or_else(tgsync_config::data_dir)
        .context("could not determine a data directory; pass --data-dir")
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let path = config_path(cli);
    let store = Arc::new(FileConfigStore::new(&path));
    let mode = store.load().await?.connection_status_indicator;
    let device = DeviceIdentity::load_or_create(&data_dir(cli)?)?;
    info!(config = %path.display(), device_id = device.current(), "tgsync starting");

    let connector = TelegramBotConnector::new(
        BotConnectorConfig {
            api_url: cli.bot_api_url.clone(),
            ..Default::default()
        },
        Arc::new(LogUpdates),
    )?;
    let mut options = SupervisorOptions::default();
    if let Some(probe) = cli.probe_idle_bot {
        options.probe_idle_bot = probe;
    }

    let sync = TelegramSync::builder(store as Arc<dyn ConfigStore>, device)
        .bot_connector(Arc::new(connector))
        .indicator(Arc::new(ConsoleIndicator::new(mode)))
        .pin_prompt(Arc::new(TerminalPinPrompt))
        .options(options)
        .load()
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    sync.unload().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match &cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::DeviceId) => {
            let device = DeviceIdentity::load_or_create(&data_dir(&cli)?)?;
            println!("{}", device.current());
            Ok(())
        },
        Some(Commands::Token { action }) => {
            token_commands::handle_token(action.clone(), &config_path(&cli)).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action.clone(), &config_path(&cli))
        },
    }
}
