use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use playlist_sorter::config::Config;
use playlist_sorter::state::{normalize_timestamp, RunState, StateStore, EPOCH_TIMESTAMP};

#[derive(Parser)]
#[command(name = "state-manager")]
#[command(about = "Inspect or adjust the sorter's watermark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State file (defaults to the configured one)
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current watermark
    Show,
    /// Set the watermark to a timestamp (RFC 3339)
    Set {
        /// e.g. 2024-05-01T00:00:00Z
        timestamp: String,
        /// Allow moving the watermark backwards
        #[arg(long)]
        force: bool,
    },
    /// Delete the state file so the next run starts from the epoch
    Reset,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let state_file = match cli.state_file {
        Some(path) => path,
        None => Config::load()?.state.state_file,
    };
    let store = StateStore::new(state_file);

    match cli.command {
        Commands::Show => {
            if !store.path().exists() {
                info!(
                    "📭 No state file at {}; next run starts from {}",
                    store.path().display(),
                    EPOCH_TIMESTAMP
                );
                return Ok(());
            }
            let state = store.load()?;
            info!("📌 Watermark: {}", state.last_published_at);
            info!("   File: {}", store.path().display());
        }

        Commands::Set { timestamp, force } => {
            let timestamp = normalize_timestamp(&timestamp)?;
            let state = RunState::new(&timestamp);

            if force {
                store.save(&state)?;
                info!("✅ Watermark set to {}", timestamp);
            } else if store.save_monotonic(&state)? {
                info!("✅ Watermark set to {}", timestamp);
            } else {
                warn!(
                    "⚠️ Watermark not changed; {} is not after the current value (use --force)",
                    timestamp
                );
            }
        }

        Commands::Reset => {
            if store.reset()? {
                info!("✅ Watermark reset to {}", EPOCH_TIMESTAMP);
            } else {
                warn!("⚠️ No state file at {}", store.path().display());
            }
        }
    }

    Ok(())
}
