//! Changelog relay CLI
//!
//! # Commands
//!
//! - `run` - Deliver the backlog, then poll until interrupted (default)
//! - `status` - Print the delivery state of every known version
//! - `check` - Fetch and parse the changelog without sending anything

use changelog_relay::config::{
    DEFAULT_CHANGELOG_URL, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PRODUCT_NAME, DEFAULT_STORE_PATH,
};
use changelog_relay::transport::ChangelogSource;
use changelog_relay::{
    parse_changelog, DeliveryStore, HttpChangelogSource, Relay, RelayConfig, RelayError, Result,
    Shutdown, TelegramSink,
};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Posts new changelog versions to a Telegram chat.
#[derive(Parser)]
#[command(name = "changelog-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(global = true, long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Settings {
    /// Changelog document to watch
    #[arg(long, env = "CHANGELOG_URL", default_value = DEFAULT_CHANGELOG_URL)]
    changelog_url: String,

    /// Bot API token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Destination chat id
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    chat_id: Option<String>,

    /// Seconds between polls
    #[arg(long, env = "POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Delivery store file
    #[arg(long, env = "DATABASE_PATH", default_value = DEFAULT_STORE_PATH)]
    store_path: PathBuf,

    /// Product name shown in message titles
    #[arg(long, env = "PRODUCT_NAME", default_value = DEFAULT_PRODUCT_NAME)]
    product_name: String,
}

impl Settings {
    fn into_config(self) -> RelayConfig {
        RelayConfig::default()
            .with_changelog_url(self.changelog_url)
            .with_bot_token(self.bot_token.unwrap_or_default())
            .with_chat_id(self.chat_id.unwrap_or_default())
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_store_path(self.store_path)
            .with_product_name(self.product_name)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver the backlog, then poll for new versions until interrupted
    Run,

    /// Print the delivery state of every known version
    Status,

    /// Fetch and parse the changelog once, without sending anything
    Check,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    let config = cli.settings.into_config();
    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config),
        Commands::Status => status(&config),
        Commands::Check => check(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting");
            exit_code(&e)
        }
    }
}

fn exit_code(error: &RelayError) -> ExitCode {
    match error {
        RelayError::Config(_) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level))
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

fn run(mut config: RelayConfig) -> Result<()> {
    config.validate()?;
    info!(config = ?config, "Starting changelog relay");

    let store = DeliveryStore::open(&config.store_path)?;
    let source = HttpChangelogSource::new()?;
    let sink = TelegramSink::new(config.bot_token.clone())?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            shutdown.cancel();
        })
        .map_err(|e| RelayError::Config(format!("failed to install signal handler: {e}")))?;
    }

    let relay = Relay::new(&config, source, sink, store, shutdown);
    relay.run()?;

    let stats = relay.stats();
    info!(
        delivered = stats.delivered,
        cycles = stats.cycles,
        failed_cycles = stats.failed_cycles,
        "Changelog relay stopped"
    );
    Ok(())
}

fn status(config: &RelayConfig) -> Result<()> {
    let path = &config.store_path;
    let Some(records) = DeliveryStore::snapshot(path)? else {
        println!("No delivery store at {}", path.display());
        return Ok(());
    };

    println!("Store: {}", path.display());
    for (version, record) in &records {
        let posted = record
            .posted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<11} {:<28} {}",
            version,
            if record.delivered { "delivered" } else { "pending" },
            posted,
            record.content_hash.short()
        );
    }

    let delivered = records.iter().filter(|(_, r)| r.delivered).count();
    println!(
        "{} versions, {} delivered, {} pending",
        records.len(),
        delivered,
        records.len() - delivered
    );
    Ok(())
}

fn check(config: &RelayConfig) -> Result<()> {
    let source = HttpChangelogSource::new()?;
    let changelog = parse_changelog(&source.fetch_text(&config.changelog_url)?);

    println!("{} versions in {}", changelog.len(), config.changelog_url);
    for version in changelog.versions() {
        println!("  {version}");
    }
    Ok(())
}
