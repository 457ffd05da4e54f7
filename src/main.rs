use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use track_resolver::catalog::{CatalogSearch, SqliteCatalog};
use track_resolver::config::ResolverConfig;
use track_resolver::feedback::FeedbackTracker;
use track_resolver::models::{CatalogResult, PendingEntry, Principal, SourceDescriptor};
use track_resolver::progress::{format_duration, Progress};
use track_resolver::queue::{Choice, ReviewQueue};
use track_resolver::store::SqliteStore;
use track_resolver::sync::{SyncEngine, SyncJob};
use track_resolver::Resolver;

#[derive(Parser)]
#[command(name = "track-resolver")]
#[command(about = "Resolve video titles to catalog tracks, with a review queue for uncertain matches")]
struct Args {
    /// Resolver config (TOML); defaults apply when missing
    #[arg(long, global = true, default_value = "track-resolver.toml")]
    config: PathBuf,

    /// Hide progress bars and log progress periodically instead
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or update the local catalog index from a JSON array of tracks
    Index {
        #[arg(long)]
        catalog: PathBuf,
        input: PathBuf,
    },

    /// Resolve a JSON array of descriptors into a playlist
    Resolve {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        playlist: String,
        input: PathBuf,

        #[arg(long, default_value = "0")]
        workers: usize,

        /// Write sync statistics as JSON
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// List a user's pending review entries
    Pending {
        #[arg(long)]
        store: PathBuf,
        /// Queue owner
        #[arg(long)]
        user: String,
        /// Caller, when different from the owner
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        admin: bool,
    },

    /// Confirm a pending entry with one of its candidates or a manual pick
    Confirm {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        entry: Uuid,
        /// Target track id
        #[arg(long)]
        track: String,
        /// Title of a manually found track (outside the candidate list)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, requires = "title")]
        artist: Option<String>,
    },

    /// Dismiss a pending entry without committing
    Skip {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        entry: Uuid,
    },

    /// Turn exact-match trust on or off for a user
    Trust {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Show a user's review decisions and exact-match trust state
    History {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        user: String,
    },

    /// Print the default configuration as TOML
    DefaultConfig,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Review queue over the store, with trust state loaded from it.
fn open_queue(store_path: &Path, config: &ResolverConfig) -> Result<(Arc<SqliteStore>, Arc<ReviewQueue>)> {
    let store = Arc::new(SqliteStore::open(store_path).context("Failed to open store")?);
    let tracker = Arc::new(FeedbackTracker::new(config.feedback.clone()));
    for (user, state) in store.load_trust()? {
        tracker.seed(&user, state);
    }
    let queue = Arc::new(ReviewQueue::new(
        store.clone(),
        store.clone(),
        tracker,
        config.scoring.exact_ratio,
    ));
    Ok((store, queue))
}

fn print_entry(entry: &PendingEntry) {
    println!(
        "{} [{}] {} (channel: {})",
        entry.entry_id,
        entry.kind.as_str(),
        entry.descriptor.raw_title,
        entry.descriptor.channel_hint.as_deref().unwrap_or("-")
    );
    if entry.candidates.is_empty() {
        println!("    no match found");
    }
    for candidate in &entry.candidates {
        println!(
            "    {} {} - {} ({:.2})",
            candidate.track_id(),
            candidate.result.artist,
            candidate.result.title,
            candidate.overall_confidence
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let progress = Progress::new(args.log_only);
    let config = ResolverConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    match args.command {
        Command::Index { catalog, input } => {
            let start = Instant::now();
            let tracks: Vec<CatalogResult> = read_json(&input)?;
            let index = SqliteCatalog::open(&catalog).context("Failed to open catalog")?;
            let pb = progress.bar(tracks.len() as u64, "Indexing tracks");
            index.insert_tracks(&tracks, &pb)?;
            pb.finish_with_message(format!("Indexed {} tracks", tracks.len()));
            let indexed = index.count()?;
            info!(
                tracks = indexed,
                elapsed = %format_duration(start.elapsed()),
                "catalog ready"
            );
        }

        Command::Resolve {
            catalog,
            store,
            user,
            playlist,
            input,
            workers,
            stats,
        } => {
            if workers > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build_global()
                    .context("Failed to set thread pool size")?;
            }
            let start = Instant::now();
            let descriptors: Vec<SourceDescriptor> = read_json(&input)?;
            let catalog: Arc<dyn CatalogSearch> =
                Arc::new(SqliteCatalog::open(&catalog).context("Failed to open catalog")?);
            let (store, queue) = open_queue(&store, &config)?;
            let resolver = Arc::new(Resolver::from_config(config, catalog));
            let engine = SyncEngine::new(resolver, queue, store);

            let job = SyncJob {
                user_id: user,
                playlist_ref: playlist,
                descriptors,
            };
            let summary = engine.run(&job, &AtomicBool::new(false), &progress);
            summary.log_phase("sync");
            if let Some(path) = stats {
                summary.write_to_file(&path)?;
            }
            info!(
                commit_rate = format!("{:.1}%", summary.commit_rate()),
                elapsed = %format_duration(start.elapsed()),
                "sync complete"
            );
        }

        Command::Pending {
            store,
            user,
            actor,
            admin,
        } => {
            let (_, queue) = open_queue(&store, &config)?;
            let actor = actor.unwrap_or_else(|| user.clone());
            let principal = if admin {
                Principal::admin(&actor)
            } else {
                Principal::user(&actor)
            };
            let entries = queue.list_as(&principal, &user)?;
            if entries.is_empty() {
                println!("No pending entries.");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }

        Command::Confirm {
            store,
            user,
            entry,
            track,
            title,
            artist,
        } => {
            let (store, queue) = open_queue(&store, &config)?;
            let choice = match title {
                Some(title) => Choice::Manual(CatalogResult {
                    target_track_id: track,
                    title,
                    artist: artist.unwrap_or_default(),
                    album: None,
                    label: None,
                }),
                None => Choice::Candidate(track),
            };
            let record = queue.confirm(&user, entry, choice)?;
            store.save_trust(&user, queue.tracker().state(&user))?;
            println!("Recorded {} for {}", record.kind.as_str(), entry);
        }

        Command::Skip { store, user, entry } => {
            let (store, queue) = open_queue(&store, &config)?;
            queue.skip(&user, entry)?;
            store.save_trust(&user, queue.tracker().state(&user))?;
            println!("Skipped {}", entry);
        }

        Command::Trust {
            store,
            user,
            enabled,
        } => {
            let (store, queue) = open_queue(&store, &config)?;
            let state = queue.tracker().set_trust(&user, enabled);
            store.save_trust(&user, state)?;
            println!(
                "Exact-match trust for {} is {}",
                user,
                if state.trust_exact_matches { "on" } else { "off" }
            );
        }

        Command::History { store, user } => {
            let store = SqliteStore::open(&store).context("Failed to open store")?;
            let trust = store.load_trust_for(&user)?;
            println!(
                "{}: exact streak {}, trust {}",
                user,
                trust.exact_streak,
                if trust.trust_exact_matches { "on" } else { "off" }
            );
            for record in store.feedback_for(&user)? {
                let chosen = record
                    .chosen_candidate
                    .as_ref()
                    .map(|c| format!("{} ({} - {})", c.target_track_id, c.artist, c.title))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {:<12} {} -> {}{}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.kind.as_str(),
                    record.descriptor.raw_title,
                    chosen,
                    if record.exact_match { " [exact]" } else { "" }
                );
            }
        }

        Command::DefaultConfig => {
            let rendered = ResolverConfig::default().to_toml_string()?;
            if rendered.is_empty() {
                bail!("Default config rendered empty");
            }
            print!("{rendered}");
        }
    }

    Ok(())
}
