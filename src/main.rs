//! listing-sync: keep a local copy of a paginated remote listing
//!
//! ```text
//! listing-sync [--config PATH] sync
//! listing-sync list [--favorites] [--bookmarked] [--json]
//! listing-sync favorite <ID> | bookmark <ID>
//! listing-sync label <NAME> | labels
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use listing_sync::application::{SyncOptions, SyncPipeline};
use listing_sync::domain::repositories::{LabelStore, RecordStore};
use listing_sync::domain::{Entity, EntityId, SyncStatus};
use listing_sync::infrastructure::{
    AppConfig, ConfigManager, MemoryStore, SiteSource, SqliteStore, init_logging,
};

#[derive(Parser)]
#[command(name = "listing-sync", version)]
#[command(about = "Synchronize a paginated remote listing into a local record set")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "LISTING_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Session cookie header (overrides config file)
    #[arg(long, env = "LISTING_SYNC_SESSION_COOKIE", hide_env_values = true)]
    session_cookie: Option<String>,

    /// Keep records and labels in memory only; the database is not touched
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the full listing and enrich new records
    Sync,
    /// Print the stored records
    List {
        /// Only records marked as favorite
        #[arg(long)]
        favorites: bool,
        /// Only bookmarked records
        #[arg(long)]
        bookmarked: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle the favorite flag of a record
    Favorite { id: EntityId },
    /// Toggle the bookmark flag of a record
    Bookmark { id: EntityId },
    /// Add the label if absent, remove it otherwise
    Label { name: String },
    /// Print the label set
    Labels,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    if let Some(cookie) = cli.session_cookie.clone() {
        config.site.session_cookie = Some(cookie);
    }

    init_logging(&config.logging, &config.log_directory()?)?;
    info!("listing-sync {} starting", env!("CARGO_PKG_VERSION"));
    info!("Config file: {:?}", manager.config_path());

    let pipeline = open_pipeline(&config, cli.ephemeral).await?;

    match cli.command {
        Command::Sync => run_sync(&pipeline).await,
        Command::List {
            favorites,
            bookmarked,
            json,
        } => {
            let records: Vec<Entity> = pipeline
                .records()
                .await
                .into_iter()
                .filter(|e| !favorites || e.favorite)
                .filter(|e| !bookmarked || e.bookmarked)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for entity in &records {
                    print_entity(entity);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Favorite { id } => {
            let found = pipeline.toggle_favorite(id).await?;
            report_toggle(&pipeline, id, found).await
        }
        Command::Bookmark { id } => {
            let found = pipeline.toggle_bookmark(id).await?;
            report_toggle(&pipeline, id, found).await
        }
        Command::Label { name } => {
            let present = pipeline.toggle_label(&name).await?;
            println!("{} label '{}'", if present { "Added" } else { "Removed" }, name);
            Ok(ExitCode::SUCCESS)
        }
        Command::Labels => {
            for label in pipeline.labels().await {
                println!("{label}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn open_pipeline(config: &AppConfig, ephemeral: bool) -> Result<SyncPipeline> {
    let (records, labels): (Arc<dyn RecordStore>, Arc<dyn LabelStore>) = if ephemeral {
        let store = Arc::new(MemoryStore::default());
        (store.clone() as Arc<dyn RecordStore>, store as Arc<dyn LabelStore>)
    } else {
        let store = Arc::new(SqliteStore::open(&config.database_path()?).await?);
        (store.clone() as Arc<dyn RecordStore>, store as Arc<dyn LabelStore>)
    };

    let source = Arc::new(SiteSource::new(config).context("Failed to set up site access")?);
    SyncPipeline::open(
        source.clone(),
        source,
        records,
        labels,
        SyncOptions::from(&config.sync),
    )
    .await
}

async fn run_sync(pipeline: &SyncPipeline) -> Result<ExitCode> {
    let mut updates = pipeline.subscribe();
    let sync = pipeline.sync();
    tokio::pin!(sync);

    let result = loop {
        tokio::select! {
            result = &mut sync => break result,
            Ok(()) = updates.changed() => {
                let status = updates.borrow_and_update().clone();
                print_status(&status);
            }
            _ = tokio::signal::ctrl_c() => {
                error!("Sync interrupted");
                eprintln!("Interrupted; records merged so far are saved.");
                return Ok(ExitCode::from(130));
            }
        }
    };

    match result {
        Ok(summary) => {
            println!(
                "Synced {} records from {} pages ({} new).",
                summary.listing.records, summary.listing.total_pages, summary.listing.new_records
            );
            if summary.enrichment.attempted > 0 {
                println!(
                    "Classified {} of {} records ({} failed).",
                    summary.enrichment.enriched,
                    summary.enrichment.attempted,
                    summary.enrichment.failed
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

// The final error is printed from the run result instead
fn print_status(status: &SyncStatus) {
    match &status.progress {
        Some(progress) if status.in_progress && !progress.is_error => {
            println!("Syncing: {}", progress.message);
        }
        _ => {}
    }
}

fn print_entity(entity: &Entity) {
    let mut flags = String::new();
    if entity.favorite {
        flags.push('*');
    }
    if entity.bookmarked {
        flags.push('b');
    }
    println!(
        "{}\t{}\t{}\t{}",
        entity.id,
        flags,
        entity.category.as_deref().unwrap_or("-"),
        entity.name
    );
}

async fn report_toggle(pipeline: &SyncPipeline, id: EntityId, found: bool) -> Result<ExitCode> {
    match pipeline.record(id).await {
        Some(entity) if found => {
            print_entity(&entity);
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            eprintln!("No record with id {id}");
            Ok(ExitCode::FAILURE)
        }
    }
}
