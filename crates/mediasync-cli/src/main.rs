//! Media Sync CLI
//!
//! Thin wrapper around mediasync-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Pull every change published since the last checkpoint
//! mediasync sync
//!
//! # Show checkpoint, ledger and catalog counts
//! mediasync status
//!
//! # List ledger events (optionally only those awaiting retry)
//! mediasync events --pending
//!
//! # List mirrored content
//! mediasync catalog sounds
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mediasync_core::config::default_data_dir;
use mediasync_core::{ContentMirror, ContentRecord, MediaKind, SyncConfig, SyncStatus};
use tracing::debug;

/// Media Sync - local mirror of a remote media catalog
#[derive(Parser)]
#[command(name = "mediasync")]
#[command(version = "0.1.0")]
#[command(about = "Media Sync - local mirror of a remote media catalog")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.mediasync)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Server base URL (overrides config.json)
    #[arg(short, long, global = true)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync against the server
    Sync,

    /// Show checkpoint, ledger and catalog counts
    #[command(alias = "info")]
    Status,

    /// List update events recorded in the ledger
    Events {
        /// Only show events awaiting retry
        #[arg(short, long)]
        pending: bool,
    },

    /// List mirrored content of one kind
    Catalog {
        /// sounds, songs or authors
        kind: MediaKind,
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

fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut config = SyncConfig::load_from_dir(&data_dir)?;
    config.data_dir = data_dir;
    if let Some(url) = &cli.server_url {
        config.server_url = url.clone();
    }
    debug!(?config, "Loaded configuration");
    Ok(config)
}

fn print_record(record: &ContentRecord) {
    match record {
        ContentRecord::Sound(sound) => println!(
            "{}  {}  (author {}, {:.1}s)",
            sound.id, sound.title, sound.author_id, sound.duration
        ),
        ContentRecord::Song(song) => {
            let genre = song.genre_id.as_deref().unwrap_or("-");
            println!(
                "{}  {}  (genre {}, {:.1}s)",
                song.id, song.title, genre, song.duration
            )
        }
        ContentRecord::Author(author) => println!("{}  {}", author.id, author.name),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(&cli)?;
    let mirror = ContentMirror::open(config)?;

    match cli.command {
        Commands::Sync => {
            let mut last_line = String::new();
            let report = mirror
                .sync_with_progress(&mut |status: SyncStatus| {
                    let line = status.to_string();
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                })
                .await;

            println!();
            println!("Checkpoint: {}", report.checkpoint);
            println!("Applied: {}", report.applied);
            println!("Skipped: {}", report.skipped);
            if report.retried > 0 {
                println!("Retried: {} ({} recovered)", report.retried, report.recovered);
            }
            if report.pending > 0 {
                println!("Pending: {} (will retry on next sync)", report.pending);
            }

            if let SyncStatus::UpdateError(failure) = report.status {
                bail!("sync failed: {failure}");
            }
        }

        Commands::Status => {
            let info = mirror.info()?;

            println!("Media Sync v0.1.0");
            println!();
            println!("Server: {}", info.server_url);
            println!("Data directory: {}", info.data_dir.display());
            println!();
            println!("Checkpoint: {}", info.checkpoint);
            println!("Events: {} ({} pending)", info.total_events, info.pending_events);
            println!();
            println!("Catalog:");
            println!("  Sounds: {}", info.sounds);
            println!("  Songs: {}", info.songs);
            println!("  Authors: {}", info.authors);
        }

        Commands::Events { pending } => {
            let events = mirror.events(pending)?;
            if events.is_empty() {
                println!("No events.");
            }
            for event in events {
                let state = if event.succeeded { "ok" } else { "pending" };
                println!(
                    "{}  {}  {} {} {}  [{}]",
                    event.occurred_at.to_rfc3339(),
                    event.id,
                    event.media_type,
                    event.content_id,
                    event.event_type,
                    state
                );
            }
        }

        Commands::Catalog { kind } => {
            let records = mirror.catalog(kind)?;
            if records.is_empty() {
                println!("No {}.", kind.plural());
            }
            for record in &records {
                print_record(record);
            }
        }
    }

    Ok(())
}
