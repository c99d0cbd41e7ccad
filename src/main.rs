use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use playlist_sorter::batch::{self, BatchOutcome};
use playlist_sorter::config::Config;
use playlist_sorter::rules::RuleSet;
use playlist_sorter::sorter::{PlaylistSorter, SortOptions, VideoOutcome};
use playlist_sorter::state::StateStore;
use playlist_sorter::youtube::{TokenStore, YouTubeClient};

#[derive(Parser)]
#[command(name = "playlist-sorter")]
#[command(version, about = "Sort new channel uploads into playlists by keyword rules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to playlist-sorter.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add new uploads to matching playlists and advance the watermark
    Sort {
        /// Classify and report without inserting or saving state
        #[arg(long)]
        dry_run: bool,

        /// Channel id (overrides TARGET_CHANNEL_ID)
        #[arg(long)]
        channel_id: Option<String>,

        /// Rules file
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Partition the metadata CSV by title category
    Categorize {
        /// Metadata CSV
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Partition the metadata CSV by playlist membership
    SplitPlaylists {
        /// Metadata CSV
        #[arg(long)]
        input: Option<PathBuf>,

        /// Video to playlist membership CSV
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Partition the metadata CSV by configured keyword groups
    KeywordSplit {
        /// Metadata CSV
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the effective configuration
    ShowConfig {
        /// Also write it as TOML to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("playlist_sorter=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_written(outcome: &BatchOutcome) {
    info!("✅ Wrote {} files", outcome.written.len());
    for (name, count) in &outcome.report.partitions {
        info!("  {}: {} videos", name, count);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up TARGET_CHANNEL_ID and friends from a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Sort {
            dry_run,
            channel_id,
            rules,
        } => {
            if let Some(channel_id) = channel_id {
                config.youtube.channel_id = Some(channel_id);
            }
            if let Some(rules) = rules {
                config.rules.rules_file = rules;
            }
            config.youtube.dry_run |= dry_run;
            config.validate()?;

            let channel_id = config.require_channel_id()?.to_string();
            info!("🚀 Playlist sorter starting...");
            info!("📺 Channel: {}", channel_id);
            if config.youtube.dry_run {
                info!("🧪 Dry run: no playlist changes, no state update");
            }

            let rules = RuleSet::load(&config.rules.rules_file, config.rules.case_sensitive)?;
            let tokens = TokenStore::load(
                &config.youtube.token_file,
                &config.youtube.oauth_token_url,
                config.youtube.timeout_seconds,
            )
            .await?;
            let client = YouTubeClient::new(&config.youtube, tokens)?;
            let state = StateStore::new(config.state.state_file.clone());

            let options = SortOptions {
                channel_id,
                page_size: config.youtube.page_size,
                uploads_page_size: config.youtube.uploads_page_size,
                prefer_exact_title: config.rules.prefer_exact_title,
                sort_index_by_title: config.rules.sort_index_by_title,
                dry_run: config.youtube.dry_run,
            };

            let report = match PlaylistSorter::new(&client, &rules, &state, options).run().await {
                Ok(report) => report,
                Err(e) => {
                    error!("❌ Run aborted: {}", e);
                    return Err(e.into());
                }
            };

            info!("🎉 Run completed in {:.2}s", report.duration.as_secs_f64());
            info!("📋 Playlists indexed: {}", report.playlists_indexed);
            info!("📹 Uploads fetched: {}, new: {}", report.fetched, report.new_videos);
            info!(
                "✅ Added: {}  ⏭️ No match: {}  ❌ Failed: {}",
                report.added, report.skipped_no_match, report.failed
            );
            info!(
                "🕒 Watermark: {} -> {}",
                report.watermark_before, report.watermark_after
            );

            if let Some(reason) = &report.aborted {
                warn!("⚠️ Run stopped early, remaining videos wait for the next run: {}", reason);
            }

            for video in &report.videos {
                if let VideoOutcome::Failed { playlist_id, error } = &video.outcome {
                    warn!(
                        "⚠️ {} ({}) was not added to {}: {}",
                        video.title, video.video_id, playlist_id, error
                    );
                }
            }
        }

        Commands::Categorize { input, output_dir } => {
            if let Some(input) = input {
                config.batch.metadata_file = input;
            }
            if let Some(output_dir) = output_dir {
                config.batch.category_output_dir = output_dir;
            }
            config.validate()?;

            info!("🗂️ Categorizing {}", config.batch.metadata_file.display());
            let outcome = batch::categorize(&config.batch)?;
            log_written(&outcome);
        }

        Commands::SplitPlaylists {
            input,
            mapping,
            output_dir,
        } => {
            if let Some(input) = input {
                config.batch.metadata_file = input;
            }
            if let Some(mapping) = mapping {
                config.batch.mapping_file = mapping;
            }
            if let Some(output_dir) = output_dir {
                config.batch.playlist_output_dir = output_dir;
            }
            config.validate()?;

            info!(
                "🗂️ Splitting {} by {}",
                config.batch.metadata_file.display(),
                config.batch.mapping_file.display()
            );
            let outcome = batch::split_by_playlist(&config.batch)?;
            log_written(&outcome);
        }

        Commands::KeywordSplit { input, output_dir } => {
            if let Some(input) = input {
                config.batch.metadata_file = input;
            }
            if let Some(output_dir) = output_dir {
                config.batch.keyword_output_dir = output_dir;
            }
            config.validate()?;

            info!("🗂️ Keyword split of {}", config.batch.metadata_file.display());
            let outcome = batch::split_by_keywords(&config.batch)?;
            log_written(&outcome);
        }

        Commands::ShowConfig { save } => {
            if let Err(e) = config.validate() {
                warn!("⚠️ Configuration is not valid: {}", e);
            }
            println!("{}", config.summary());

            if let Some(path) = save {
                config.save(&path)?;
            }
        }
    }

    Ok(())
}
