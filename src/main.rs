//! # apodbot — daily NASA Astronomy Picture of the Day bot
//!
//! Usage:
//!   apodbot                       # run the bot (same as `apodbot run`)
//!   apodbot --config bot.toml run # explicit config file
//!   apodbot list                  # show persisted daily schedules
//!   apodbot fetch                 # print today's APOD record
//!   apodbot fetch --date 2023-10-01

mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use apodbot_channels::TelegramChannel;
use apodbot_core::traits::{Messenger, PictureSource};
use apodbot_core::{ApodConfig, BotRegistry, SendTime, parse_apod_date};
use apodbot_delivery::DeliveryPipeline;
use apodbot_providers::{ApodClient, HtmlRenderClient, build_translator};
use apodbot_scheduler::{
    CacheEvictor, DeliveryHandler, ScheduleStore, SchedulerService, TriggerEngine, codec,
    register_janitor,
};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::commands::Frontend;

#[derive(Parser)]
#[command(
    name = "apodbot",
    version,
    about = "🔭 apodbot — daily NASA astronomy picture delivery"
)]
struct Cli {
    /// Config file (default: ~/.apodbot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: restore schedules, start the trigger loop, poll chats
    Run,
    /// List persisted daily schedules
    List,
    /// Fetch and print an APOD record
    Fetch {
        /// YYYY-MM-DD instead of today
        #[arg(long)]
        date: Option<String>,
        /// A random entry instead of today
        #[arg(long, conflicts_with = "date")]
        random: bool,
    },
}

fn load_config(path: Option<&str>) -> Result<ApodConfig> {
    let config = match path {
        Some(p) => {
            let mut config = ApodConfig::load_from(Path::new(&shellexpand::tilde(p).to_string()))?;
            config.apply_env_overrides();
            config
        }
        None => ApodConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "apodbot=debug,apodbot_scheduler=debug,apodbot_delivery=debug,apodbot_channels=debug,apodbot_providers=debug,apodbot_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::List => list(&config).await,
        Commands::Fetch { date, random } => fetch(&config, date.as_deref(), random).await,
    }
}

async fn list(config: &ApodConfig) -> Result<()> {
    let store = ScheduleStore::new(&config.storage.data_path());
    let records = store.load_records().await;
    if records.is_empty() {
        println!("No daily schedules in {}", store.path().display());
        return Ok(());
    }

    println!("📅 {} schedule(s) in {}", records.len(), store.path().display());
    for record in &records {
        match record.decode() {
            Ok(entry) => println!(
                "  {}  {}  {}",
                entry.send_time,
                entry.target,
                codec::job_id(&entry.target)
            ),
            Err(e) => println!("  {}  <invalid: {e}>", record.send_time),
        }
    }
    Ok(())
}

async fn fetch(config: &ApodConfig, date: Option<&str>, random: bool) -> Result<()> {
    if !config.is_enabled() {
        anyhow::bail!("nasa.api_key is not set (config or NASA_API_KEY)");
    }
    let client = ApodClient::new(&config.nasa);
    let picture = match (date, random) {
        (Some(raw), _) => client.fetch_by_date(parse_apod_date(raw)?).await?,
        (None, true) => client.fetch_random().await?,
        (None, false) => Some(client.fetch_today().await?),
    };
    match picture {
        Some(picture) => println!("{}", serde_json::to_string_pretty(&picture)?),
        None => println!("No APOD entry returned"),
    }
    Ok(())
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

async fn run(config: ApodConfig) -> Result<()> {
    tracing::info!("🔭 apodbot v{} starting", env!("CARGO_PKG_VERSION"));
    if !config.is_enabled() {
        tracing::warn!("⚠️ nasa.api_key is empty, APOD commands are disabled");
    }

    let data_dir = ensure_dir(config.storage.data_path())?;
    let cache_dir = ensure_dir(config.storage.cache_path())?;

    let registry = Arc::new(BotRegistry::new());
    let pipeline = Arc::new(DeliveryPipeline::new(
        Arc::clone(&registry),
        Arc::new(ApodClient::new(&config.nasa)),
        build_translator(&config.translate),
        Arc::new(HtmlRenderClient::new(&config.render)),
        &cache_dir,
        config.delivery.clone(),
    ));

    let engine = Arc::new(TriggerEngine::new());
    let service = Arc::new(SchedulerService::new(
        ScheduleStore::new(&data_dir),
        Arc::clone(&engine),
        Arc::clone(&pipeline) as Arc<dyn DeliveryHandler>,
        SendTime::parse(&config.schedule.default_send_time)?,
    ));

    let janitor_time = SendTime::parse(&config.schedule.janitor_time)?;
    register_janitor(
        &engine,
        janitor_time,
        Arc::clone(&pipeline) as Arc<dyn CacheEvictor>,
    );
    tracing::info!("🧹 Cache janitor scheduled daily at {janitor_time}");

    service.recover().await;
    let ticker = Arc::clone(&engine).spawn(Duration::from_secs(config.schedule.check_interval_secs));

    let mut streams = Vec::new();
    match config.channel.telegram.clone() {
        Some(tg) if tg.enabled && !tg.bot_token.is_empty() => match TelegramChannel::connect(tg).await {
            Ok(channel) => {
                streams.push(channel.start_polling());
                registry.register(Arc::new(channel) as Arc<dyn Messenger>).await;
            }
            Err(e) => tracing::error!("❌ Telegram connect failed: {e}"),
        },
        _ => {}
    }
    if registry.is_empty().await {
        tracing::warn!("⚠️ No messaging channel connected, scheduled sends will be skipped");
    }

    let frontend = Arc::new(Frontend::new(
        Arc::clone(&service),
        Arc::clone(&pipeline),
        Arc::clone(&registry),
        config.superusers.clone(),
        config.is_enabled(),
    ));

    let mut incoming = futures::stream::select_all(streams);
    loop {
        tokio::select! {
            next = incoming.next() => {
                let Some(msg) = next else {
                    tokio::signal::ctrl_c().await?;
                    break;
                };
                let frontend = Arc::clone(&frontend);
                tokio::spawn(async move { frontend.handle(msg).await });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("👋 Shutting down");
    ticker.abort();
    Ok(())
}
