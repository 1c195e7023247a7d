use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use syncplay_core::{
    run_realtime, run_simulated, AppConfig, GameEngine, GameRequest, LinkResolver, MediaDescriptor,
    MediaLibrary, MediaLink, MediaRef, NotificationLog, RunSummary, SilentAudio, SimulatedDevice,
    TracingNotifier,
};
use tracing_subscriber::EnvFilter;

fn main() -> syncplay_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { game, budget_secs } => run_play(&game, budget_secs),
        Commands::Simulate {
            game,
            delta_ms,
            max_ticks,
        } => run_simulate(&game, delta_ms, max_ticks),
        Commands::Resolve { library, refs } => run_resolve(&library, &refs),
    }
}

fn run_play(game: &GameArgs, budget_secs: Option<u64>) -> syncplay_core::Result<()> {
    let config = load_config(game.config.as_deref())?;
    let (mut engine, _log) = build_engine(&config, game.disconnected);
    engine.start_game(load_request(&config, &game.media)?)?;

    let summary = run_realtime(&mut engine, budget_secs.map(Duration::from_secs));
    tracing::info!(reason = ?summary.reason, ticks = summary.ticks, "playback ended");
    Ok(())
}

/// Output of an offline simulation run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    summary: RunSummary,
    notifications: Vec<String>,
}

fn run_simulate(game: &GameArgs, delta_ms: f64, max_ticks: u64) -> syncplay_core::Result<()> {
    let config = load_config(game.config.as_deref())?;
    let (mut engine, log) = build_engine(&config, game.disconnected);
    engine.start_game(load_request(&config, &game.media)?)?;

    let summary = run_simulated(&mut engine, delta_ms, max_ticks);
    let report = SimulationReport {
        summary,
        notifications: log
            .snapshot()
            .into_iter()
            .map(|notification| notification.message)
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_resolve(library: &Path, refs: &[String]) -> syncplay_core::Result<()> {
    let raw = std::fs::read_to_string(library)?;
    let library: MediaLibrary = serde_json::from_str(&raw)?;
    let references: Vec<MediaRef> = refs.iter().map(MediaRef::new).collect();

    let mut resolver = LinkResolver::new(library);
    let links: Vec<MediaLink> = resolver.resolve_all(&references, &TracingNotifier);
    tracing::info!(requested = references.len(), resolved = links.len(), "media resolved");
    println!("{}", serde_json::to_string_pretty(&links)?);
    Ok(())
}

fn build_engine(config: &AppConfig, disconnected: bool) -> (GameEngine, NotificationLog) {
    let device = if disconnected {
        SimulatedDevice::disconnected()
    } else {
        SimulatedDevice::new()
    };
    let log = NotificationLog::new();
    let engine = GameEngine::new(
        config.tuning.clone(),
        Box::new(device),
        Box::new(SilentAudio::new()),
        Box::new((TracingNotifier, log.clone())),
    );
    (engine, log)
}

fn load_config(path: Option<&Path>) -> syncplay_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// A media file holds either a single descriptor or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MediaFile {
    One(MediaDescriptor),
    Many(Vec<MediaDescriptor>),
}

fn load_request(config: &AppConfig, media: &[PathBuf]) -> syncplay_core::Result<GameRequest> {
    let mut playlist = Vec::new();
    for path in media {
        let raw = std::fs::read_to_string(path)?;
        match serde_json::from_str::<MediaFile>(&raw)? {
            MediaFile::One(media) => playlist.push(media),
            MediaFile::Many(items) => playlist.extend(items),
        }
    }
    tracing::info!(items = playlist.len(), "playlist loaded");

    Ok(GameRequest {
        config: config.game.clone(),
        playlist,
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Media-synchronised device playback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GameArgs {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Media descriptor file; repeat to build a playlist.
    #[arg(short, long = "media", required = true)]
    media: Vec<PathBuf>,
    /// Start with the simulated device unplugged.
    #[arg(long)]
    disconnected: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the playlist in real time against a simulated device.
    Play {
        #[command(flatten)]
        game: GameArgs,
        /// Stop after this many seconds.
        #[arg(long)]
        budget_secs: Option<u64>,
    },
    /// Run the playlist offline with a fixed tick and print a JSON summary.
    Simulate {
        #[command(flatten)]
        game: GameArgs,
        /// Milliseconds per simulated tick.
        #[arg(long, default_value_t = 50.0)]
        delta_ms: f64,
        /// Upper bound on the number of ticks.
        #[arg(long, default_value_t = 100_000)]
        max_ticks: u64,
    },
    /// Resolve media references against a JSON library file.
    Resolve {
        /// JSON object mapping references to links.
        library: PathBuf,
        /// References to resolve.
        refs: Vec<String>,
    },
}
