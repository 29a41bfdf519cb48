use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bankfeed_core::{IngestionPipeline, LiveFeed, MessageHandler, MessageId, ScanError, Scanner};
use bankfeed_ingest::parser_for;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod actual;
mod config;
mod discord;
mod state;

use actual::ActualClient;
use config::Config;
use discord::{DiscordChannel, DiscordClient};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BANKFEED_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(
    name = "bankfeed",
    version = VERSION,
    about = "Forward bank payment notifications from a Discord channel into an Actual budget"
)]
struct Cli {
    /// Config file (default: ~/.bankfeed/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    Init,

    /// Watch the notification channel and ingest new messages as they arrive
    Watch {
        /// Run a catch-up scan before watching
        #[arg(long)]
        catch_up: bool,
    },

    /// Ingest every message in the channel that doesn't carry the success marker yet
    CatchUp,

    /// Parse a notification without touching Discord or the ledger (reads stdin by default)
    Parse {
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, default_value = "pekao")]
        bank: String,

        #[arg(long, default_value = "Pekao")]
        account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init => config::init_config(cli.config.as_deref())?,
        Command::Parse {
            file,
            bank,
            account,
        } => parse(file.as_deref(), &bank, &account)?,
        Command::CatchUp => {
            let cfg = config::load_config(cli.config.as_deref())?;
            let (handler, channel) = connect(&cfg).await?;
            catch_up(&cfg, handler, channel.as_ref()).await?;
        }
        Command::Watch { catch_up: first } => {
            let cfg = config::load_config(cli.config.as_deref())?;
            let (handler, channel) = connect(&cfg).await?;
            let Some(channel) = channel else {
                bail!("Could not find channel '{}'", cfg.discord.channel);
            };
            watch(&cfg, handler, &channel, first).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve the channel once at startup and wire the pipeline to the ledger.
async fn connect(cfg: &Config) -> Result<(Arc<MessageHandler<ActualClient>>, Option<DiscordChannel>)> {
    info!(version = VERSION, channel = %cfg.discord.channel, "starting");

    let parser = parser_for(&cfg.bank.name, &cfg.bank.account)
        .with_context(|| format!("bank {:?}", cfg.bank.name))?;
    let ledger = ActualClient::new(&cfg.actual)?;
    let handler = Arc::new(MessageHandler::new(IngestionPipeline::new(parser, ledger)));

    let discord = DiscordClient::connect(&cfg.discord.token, &cfg.discord.api_base)
        .await
        .context("connect to discord")?;
    let channel = discord
        .find_channel(&cfg.discord.channel)
        .await
        .context("list discord channels")?;
    if channel.is_none() {
        warn!("Could not find channel '{}'", cfg.discord.channel);
    }

    Ok((handler, channel))
}

async fn catch_up(
    cfg: &Config,
    handler: Arc<MessageHandler<ActualClient>>,
    channel: Option<&DiscordChannel>,
) -> Result<()> {
    let scanner = Scanner::new(handler, cfg.discord.channel.as_str());
    match scanner.scan(channel).await {
        Ok(report) => {
            println!("{}", report.summary());
            Ok(())
        }
        Err(e @ ScanError::ChannelNotFound(_)) => Err(anyhow!(e)),
        Err(e) => Err(anyhow!(e).context("catch-up aborted")),
    }
}

async fn watch(
    cfg: &Config,
    handler: Arc<MessageHandler<ActualClient>>,
    channel: &DiscordChannel,
    catch_up_first: bool,
) -> Result<()> {
    // Taken before the catch-up so nothing posted meanwhile is missed.
    let mut last_seen = channel
        .latest_message_id()
        .await
        .context("read latest message")?
        .unwrap_or(MessageId(0));

    if catch_up_first {
        catch_up(cfg, Arc::clone(&handler), Some(channel)).await?;
    }

    let live = LiveFeed::new(handler);
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.discord.poll_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(channel = %cfg.discord.channel, after = %last_seen, "watching");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let batch = match channel.messages_after(last_seen).await {
            Ok(b) => b,
            Err(e) => {
                warn!("polling failed: {e}");
                continue;
            }
        };

        let report = live.on_batch(last_seen, &batch).await;
        if report.ingested > 0 || report.unmarked > 0 {
            debug!(?report, "batch handled");
        }
        last_seen = report.last_seen;
    }
}

fn parse(file: Option<&Path>, bank: &str, account: &str) -> Result<()> {
    let text = match file {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("read stdin")?;
            s
        }
    };

    let parser = parser_for(bank, account)?;
    let record = parser.parse(&text)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
