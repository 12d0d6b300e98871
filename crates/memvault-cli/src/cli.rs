use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "memvault",
    about = "MemVault: atomic archival storage for conversation records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage root directory.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Lock acquisition timeout in seconds.
    #[arg(long, global = true, default_value_t = 10)]
    pub lock_timeout: u64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a record from a JSON file
    Store(StoreArgs),
    /// Store every *.json record in a directory as one batch
    Batch(BatchArgs),
    /// Fetch a record by id
    Fetch(FetchArgs),
    /// Search records by substring
    Query(QueryArgs),
    /// Show the manifest entry for an id
    Lookup(LookupArgs),
    /// Regenerate the manifest from the record store
    RebuildManifest,
    /// Recompute the search index from the record store
    RebuildIndex,
    /// Migrate a legacy monolithic store
    Migrate(MigrateArgs),
    /// Show the audit event log
    Events(EventsArgs),
}

#[derive(Args)]
pub struct StoreArgs {
    /// Path to a record JSON file.
    pub record: PathBuf,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Directory containing record JSON files.
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Record id.
    pub id: String,
    /// Render human-readable text instead of JSON.
    #[arg(long)]
    pub text: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Search term (case-insensitive substring).
    pub term: String,
}

#[derive(Args)]
pub struct LookupArgs {
    /// Record id.
    pub id: String,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Path to the legacy monolithic JSON store.
    pub legacy: PathBuf,
}

#[derive(Args)]
pub struct EventsArgs {
    /// Show only the last N events.
    #[arg(long)]
    pub tail: Option<usize>,
}
