use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use brew_signal::{
    Classifier, Monitor, Notifier, Sampler, SessionStats, SessionSummary, StatusBoard,
    TokioClock,
};

mod config;
mod hue;
mod meter;
mod simulator;
mod slack;
mod telemetry;

use crate::config::{ChatConfig, DataDir, FileConfig, Settings};
use crate::hue::HueLights;
use crate::meter::HttpMeter;
use crate::slack::SlackChannel;
use crate::telemetry::PowerLog;

/// Upper bound for any single Slack or Hue request.
const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Readings buffered for the power log before appends start failing.
const TELEMETRY_QUEUE: usize = 1024;

/// Slack allows roughly one `chat.delete` per second.
const DELETE_PAUSE: Duration = Duration::from_secs(1);

const PAIR_PAUSE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "brew-watch")]
#[command(about = "Announces coffee brews from a smart plug's power readings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.brew-watch)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the brewer in the foreground (default)
    Run,

    /// Pair with the Hue bridge and save the username in the data directory
    PairLights(PairLightsArgs),

    /// Delete every message in the configured Slack channel
    ClearChannel,

    /// Serve a replayed brew as a fake power meter
    Simulate(SimulateArgs),
}

#[derive(Parser)]
struct PairLightsArgs {
    /// How many times to ask the bridge before giving up (2s apart)
    #[arg(long, default_value = "30")]
    attempts: u32,
}

#[derive(Parser)]
struct SimulateArgs {
    /// Port for the replay meter
    #[arg(short, long, default_value = "5000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_monitor(DataDir::new(cli.data_dir)?).await,
        Commands::PairLights(args) => pair_lights(DataDir::new(cli.data_dir)?, args).await,
        Commands::ClearChannel => clear_channel(DataDir::new(cli.data_dir)?).await,
        Commands::Simulate(args) => simulator::serve(args.port, shutdown_signal()).await,
    }
}

fn init_logging(debug: bool) {
    let default_directive = if debug {
        "brew_watch=debug,brew_signal=debug,info"
    } else {
        "brew_watch=info,brew_signal=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, cleaning up...");
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(COLLABORATOR_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

async fn run_monitor(paths: DataDir) -> Result<()> {
    let settings = Settings::load(&paths)?;

    info!("Starting brew-watch");
    info!("Config: {}", paths.config_toml_path().display());
    info!("Sensor: {}", settings.sensor.url);
    info!(
        "Collaborators: {}",
        settings.enabled_collaborators().join(", ")
    );

    let stats = Arc::new(SessionStats::new());
    let http = http_client()?;
    let clock = TokioClock;

    let meter = HttpMeter::new(settings.sensor.url.clone(), settings.sensor.timeout)
        .context("Failed to build meter client")?;

    let status = match &settings.chat {
        Some(chat) => {
            let slack = SlackChannel::new(http.clone(), chat);
            // pick up the status left by a previous run so it gets replaced
            let last = match slack.latest_message().await {
                Ok(last) => last,
                Err(e) => {
                    warn!("Could not read the last Slack message: {}", e);
                    None
                }
            };
            Some(StatusBoard::new(slack, last))
        }
        None => None,
    };

    let lights = settings
        .lights
        .as_ref()
        .map(|lights| HueLights::new(http.clone(), lights));

    let (sink, writer) = match &settings.telemetry {
        Some(telemetry) => {
            let log = PowerLog::connect(telemetry).await?;
            match log.count().await {
                Ok(n) => info!("Power log table {} holds {} readings", telemetry.table, n),
                Err(e) => warn!("Could not count power log rows: {}", e),
            }
            let (queue, writer) = log.spawn(TELEMETRY_QUEUE, stats.clone());
            (Some(queue), Some(writer))
        }
        None => (None, None),
    };

    let sampler =
        Sampler::new(meter, clock, settings.sampler.clone(), stats.clone()).with_sink(sink);
    let notifier = Notifier::new(settings.messages.clone(), stats.clone())
        .with_chat(status)
        .with_lights(lights);
    let monitor = Monitor::new(
        sampler,
        Classifier::new(settings.classifier.clone()),
        notifier,
        clock,
        stats,
    );

    let summary = monitor.run(shutdown_signal()).await;

    if let Some(writer) = writer {
        info!("Flushing power log...");
        let written = writer.flush().await;
        info!("Power log: {} readings written this session", written);
    }

    log_summary(&summary);
    info!("Shutdown complete");
    Ok(())
}

fn log_summary(summary: &SessionSummary) {
    info!("Session summary ({}s):", summary.uptime_secs);
    info!("   Pots brewed:    {}", summary.pots_brewed);
    info!("   Brews started:  {}", summary.brews_started);
    info!("   Reheats:        {}", summary.reheats);
    info!("   Power-offs:     {}", summary.power_offs);
    info!(
        "   Samples:        {} stable, {} unstable, {} sensor faults",
        summary.samples.stable, summary.samples.unstable, summary.samples.sensor_faults
    );
    if summary.collaborator_failures > 0 {
        warn!(
            "   Failed collaborator calls: {}",
            summary.collaborator_failures
        );
    }
}

async fn pair_lights(paths: DataDir, args: PairLightsArgs) -> Result<()> {
    let fc = FileConfig::load(&paths)?;
    let bridge_url = config::bridge_url(&fc.lights)?;

    info!("Pairing with Hue bridge at {}", bridge_url);
    let username = hue::pair(
        &http_client()?,
        &bridge_url,
        &hue::device_type(),
        args.attempts,
        PAIR_PAUSE,
    )
    .await?;

    paths.save_hue_username(&username)?;
    info!(
        "Paired. Username saved to {}",
        paths.hue_username_path().display()
    );
    Ok(())
}

async fn clear_channel(paths: DataDir) -> Result<()> {
    let fc = FileConfig::load(&paths)?;
    let chat = ChatConfig::from_file(&fc.chat)?;

    let mut slack = SlackChannel::new(http_client()?, &chat);
    info!("Clearing Slack channel {}", chat.channel_id);
    let deleted = slack
        .clear_channel(DELETE_PAUSE)
        .await
        .with_context(|| format!("Stopped clearing {}", chat.channel_id))?;
    info!("Deleted {} messages", deleted);
    Ok(())
}
