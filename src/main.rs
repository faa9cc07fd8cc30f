//! # Doc Sync CLI (`docsync`)
//!
//! Reconciles a directory of Markdown documents against a SQLite store.
//!
//! ## Usage
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync init` | Create the SQLite database and its tables |
//! | `docsync sync` | Reconcile the source tree into the store |
//! | `docsync status` | Compare files and records by content hash (read-only) |
//! | `docsync list` | List records, optionally by status, category, tag or author |
//! | `docsync delete` | Delete one record by id |
//! | `docsync stats` | Show record counts per status and category |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_sync::config::{self, Config};
use doc_sync::report;
use doc_sync::stats;
use doc_sync::store::sqlite::SqliteStore;
use doc_sync::store::Store;
use doc_sync::sync::SyncEngine;

/// Doc Sync CLI: keep a store of records in step with a tree of
/// front-matter documents.
#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Doc Sync: reconcile a directory of front-matter documents with a SQLite store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Reconcile the source tree into the store.
    ///
    /// Creates records for new documents, overwrites changed ones, and marks
    /// records whose file disappeared as `lost_sync`. Nothing is deleted.
    Sync {
        /// Compute and report every decision without writing to the store.
        #[arg(long)]
        dry_run: bool,

        /// Override `source.root` from the config file.
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show which files and records match by content hash.
    ///
    /// Read-only: no record is created, changed or re-marked.
    Status {
        /// Override `source.root` from the config file.
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// List records in the store.
    ///
    /// At most one filter may be given.
    List {
        /// Only show records with this status (e.g. `lost_sync`).
        #[arg(long, group = "filter")]
        status: Option<String>,

        /// Only show records in this category.
        #[arg(long, group = "filter")]
        category: Option<String>,

        /// Only show records carrying this tag.
        #[arg(long, group = "filter")]
        tag: Option<String>,

        /// Only show records by this author.
        #[arg(long, group = "filter")]
        author: Option<String>,
    },

    /// Delete a record by id.
    ///
    /// Sync never deletes; use this after reviewing `lost_sync` records.
    Delete {
        /// Record id, as shown by `docsync list`.
        id: String,
    },

    /// Show store statistics.
    Stats,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let store = SqliteStore::open(&cfg).await?;

    let result = run(cli.command, &cfg, &store).await;
    store.close().await;
    result
}

async fn run(command: Commands, cfg: &Config, store: &SqliteStore) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            store.ensure_schema().await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { dry_run, root } => {
            let root = root.unwrap_or_else(|| cfg.source.root.clone());
            let engine = SyncEngine::new(store, &cfg.source)?;
            let stats = engine.run_sync(&root, dry_run).await?;
            report::print_sync_stats(&stats);
        }
        Commands::Status { root } => {
            let root = root.unwrap_or_else(|| cfg.source.root.clone());
            let engine = SyncEngine::new(store, &cfg.source)?;
            let status = engine.preview_status(&root).await?;
            report::print_status_report(&status);
        }
        Commands::List {
            status,
            category,
            tag,
            author,
        } => {
            store.ensure_schema().await?;
            let records = if let Some(status) = status {
                store.list_by_status(&status).await?
            } else if let Some(category) = category {
                store.list_by_category(&category).await?
            } else if let Some(tag) = tag {
                store.list_by_tag(&tag).await?
            } else if let Some(author) = author {
                store.list_by_author(&author).await?
            } else {
                store.list_all().await?
            };
            report::print_records(&records);
        }
        Commands::Delete { id } => {
            store.ensure_schema().await?;
            let record = store.delete(&id).await?;
            tracing::info!(id = %record.id, title = %record.title, "deleted record");
            println!("Deleted record {} ({}).", record.id, record.title);
        }
        Commands::Stats => {
            store.ensure_schema().await?;
            let statistics = stats::collect_statistics(store).await?;
            stats::print_statistics(&statistics, &cfg.db.path);
        }
    }

    Ok(())
}
