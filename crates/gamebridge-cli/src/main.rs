//! GameBridge CLI
//!
//! Drives the SDK against the local simulator with a persistent store, for
//! inspecting and seeding game data during development.
//!
//! ## Usage
//!
//! ```bash
//! # Show the simulated session
//! gamebridge info
//!
//! # Key/value data
//! gamebridge data set level 3
//! gamebridge data get level
//! gamebridge data remove level
//! gamebridge data clear
//!
//! # Leaderboards (submitting needs a logged-in user)
//! gamebridge --user-id ada --display-name Ada leaderboard submit 18.5 --display 18.5s --key speed
//! gamebridge --user-id ada leaderboard get --key speed
//! gamebridge leaderboard top --key speed --limit 10
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gamebridge_core::{
    BridgeConfig, GameBridge, Languages, RankedEntry, RedbStore, SimulatorConfig, Submission, User,
};

/// GameBridge - game to host messaging SDK
#[derive(Parser)]
#[command(name = "gamebridge")]
#[command(version = "0.1.0")]
#[command(about = "GameBridge - game to host messaging SDK")]
#[command(
    long_about = "Runs the GameBridge SDK against its local simulator, backed by an on-disk store, to inspect and seed game data and leaderboards."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: platform data dir + /gamebridge)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON file with SDK settings (timeouts, debounce window, simulator delay)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Simulate a logged-in player with this id
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Display name of the simulated player (defaults to the id)
    #[arg(long, global = true)]
    display_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the simulated session
    Info,

    /// Key/value data
    Data {
        #[command(subcommand)]
        action: DataAction,
    },

    /// Leaderboards
    Leaderboard {
        #[command(subcommand)]
        action: LeaderboardAction,
    },
}

#[derive(Subcommand)]
enum DataAction {
    /// Read a value
    Get { key: String },

    /// Write a value
    Set { key: String, value: String },

    /// Delete a value
    Remove { key: String },

    /// Delete all game data (leaderboards are kept)
    Clear,
}

#[derive(Subcommand)]
enum LeaderboardAction {
    /// Submit a score for the simulated player
    Submit {
        /// Numeric score used for ranking (higher is better)
        #[arg(allow_negative_numbers = true)]
        score: f64,

        /// Text shown for the score (defaults to the score)
        #[arg(long)]
        display: Option<String>,

        /// Name shown on the board (defaults to the display name)
        #[arg(long)]
        name: Option<String>,

        /// Leaderboard key
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Show the entries around the simulated player
    Get {
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Show the top entries
    Top {
        #[arg(short, long)]
        key: Option<String>,

        /// Number of entries (clamped to 1..=100)
        #[arg(short, long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gamebridge")
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}

fn simulated_user(user_id: Option<String>, display_name: Option<String>) -> Option<User> {
    let id = user_id?;
    Some(User {
        display_name: display_name.unwrap_or_else(|| id.clone()),
        id,
        avatar: None,
        languages: Languages::default(),
    })
}

fn print_entries(entries: &[RankedEntry]) {
    for entry in entries {
        let marker = if entry.is_current_user { "  <- you" } else { "" };
        println!(
            "  {:>4}. {} {}{}",
            entry.rank, entry.player_name, entry.display_value, marker
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config = load_config(cli.config.as_deref())?;
    tracing::info!(data_dir = %data_dir.display(), "Opening local store");
    let store = RedbStore::new(data_dir.join("gamebridge.redb"))
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;

    let mut simulator = SimulatorConfig::default();
    if let Some(user) = simulated_user(cli.user_id, cli.display_name) {
        simulator = simulator.with_user(user);
    }

    let bridge = GameBridge::builder()
        .config(config)
        .store(Arc::new(store))
        .simulator(simulator)
        .build();
    let environment = bridge.init().await?;

    match cli.command {
        Commands::Info => {
            let session = bridge.session();

            println!("GameBridge v0.1.0");
            println!();
            println!("Session:");
            println!("  Environment: {}", environment);
            if let Some(nonce) = &session.nonce {
                println!("  Nonce: {}", nonce);
            }
            println!();
            println!("User:");
            match bridge.user().get() {
                Some(user) => {
                    println!("  ID: {}", user.id);
                    println!("  Name: {}", user.display_name);
                }
                None => println!("  (none)"),
            }
            println!(
                "  Logged in: {}",
                if bridge.user().is_logged_in() { "Yes" } else { "No" }
            );
            println!("  Locales: {}", bridge.user().locales().join(", "));
            let size = bridge.user().container_size();
            println!("  Container: {}x{}", size.width, size.height);
            println!();
            let config = bridge.config();
            println!("Config:");
            println!("  Request timeout: {}ms", config.request_timeout_ms);
            println!("  Debounce window: {}ms", config.debounce_window_ms);
            println!("  Simulator delay: {}ms", config.local_delay_ms);
            println!();
            println!("Data directory: {}", data_dir.display());
        }

        Commands::Data { action } => match action {
            DataAction::Get { key } => match bridge.data().get_item(&key).await? {
                Some(value) => println!("{}", value),
                None => println!("(not set)"),
            },

            DataAction::Set { key, value } => {
                let outcome = bridge.data().set_item(&key, value).await?;
                if outcome.is_superseded() {
                    println!("Superseded: {}", key);
                } else {
                    println!("Saved: {}", key);
                }
            }

            DataAction::Remove { key } => {
                bridge.data().remove_item(&key).await?;
                println!("Removed: {}", key);
            }

            DataAction::Clear => {
                bridge.data().clear().await?;
                println!("Cleared all game data.");
            }
        },

        Commands::Leaderboard { action } => match action {
            LeaderboardAction::Submit {
                score,
                display,
                name,
                key,
            } => {
                let name = name
                    .or_else(|| bridge.user().get().map(|u| u.display_name))
                    .unwrap_or_default();
                let display = display.unwrap_or_else(|| score.to_string());
                let mut submission = Submission::new(name, display, score);
                if let Some(key) = &key {
                    submission = submission.with_key(key);
                }

                let outcome = bridge.leaderboard().submit(submission).await?;
                match outcome.rank {
                    Some(rank) => println!(
                        "Rank: {}{}",
                        rank,
                        if outcome.is_new_best { " (new best)" } else { "" }
                    ),
                    None => println!("Score did not make the leaderboard."),
                }
            }

            LeaderboardAction::Get { key } => {
                let page = bridge.leaderboard().get(key.as_deref()).await?;
                if page.entries.is_empty() {
                    println!("No entries.");
                } else {
                    println!("Leaderboard ({} entries):", page.total);
                    print_entries(&page.entries);
                }
                if let Some(rank) = page.user_rank {
                    println!();
                    println!("Your rank: {}", rank);
                }
            }

            LeaderboardAction::Top { key, limit } => {
                let entries = bridge.leaderboard().get_top(key.as_deref(), limit).await?;
                if entries.is_empty() {
                    println!("No entries.");
                } else {
                    println!("Top {}:", entries.len());
                    print_entries(&entries);
                }
            }
        },
    }

    Ok(())
}
