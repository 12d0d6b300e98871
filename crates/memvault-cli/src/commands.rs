use std::fs;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use memvault_core::{FetchMode, Fetched, Record, RecordId, Vault, VaultConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = VaultConfig::default()
        .with_lock_timeout(Duration::from_secs(cli.lock_timeout));
    let vault = Vault::open(&cli.root, config)
        .with_context(|| format!("opening vault at {}", cli.root.display()))?;

    match cli.command {
        Command::Store(args) => cmd_store(&vault, args),
        Command::Batch(args) => cmd_batch(&vault, args),
        Command::Fetch(args) => cmd_fetch(&vault, args),
        Command::Query(args) => cmd_query(&vault, args),
        Command::Lookup(args) => cmd_lookup(&vault, args),
        Command::RebuildManifest => cmd_rebuild_manifest(&vault),
        Command::RebuildIndex => cmd_rebuild_index(&vault),
        Command::Migrate(args) => cmd_migrate(&vault, args),
        Command::Events(args) => cmd_events(&vault, args),
    }
}

fn parse_id(id: &str) -> anyhow::Result<RecordId> {
    RecordId::new(id).context("invalid record id")
}

fn load_record(path: &std::path::Path) -> anyhow::Result<Record> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_store(vault: &Vault, args: StoreArgs) -> anyhow::Result<()> {
    let record = load_record(&args.record)?;
    let outcome = vault.store(&record)?;
    if outcome.duplicate {
        println!("{} {} already stored (identical content)", "=".yellow(), outcome.id);
    } else {
        println!("{} stored {}", "✓".green().bold(), outcome.id.to_string().yellow());
    }
    Ok(())
}

fn cmd_batch(vault: &Vault, args: BatchArgs) -> anyhow::Result<()> {
    let mut records = Vec::new();
    for entry in fs::read_dir(&args.dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => eprintln!("{} skipping {}: {e:#}", "!".red(), path.display()),
        }
    }
    let outcome = vault.store_batch(&records);
    println!(
        "{} stored {}, skipped {}, failed {}",
        "✓".green().bold(),
        outcome.stored.len().to_string().green(),
        outcome.skipped.len().to_string().yellow(),
        outcome.failed.len().to_string().red(),
    );
    for (id, reason) in &outcome.failed {
        println!("  {} {id}: {reason}", "✗".red());
    }
    Ok(())
}

fn cmd_fetch(vault: &Vault, args: FetchArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let mode = if args.text { FetchMode::Text } else { FetchMode::Raw };
    match vault.fetch(&id, mode)? {
        Fetched::Raw(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        Fetched::Text(text) => print!("{text}"),
    }
    Ok(())
}

fn cmd_query(vault: &Vault, args: QueryArgs) -> anyhow::Result<()> {
    let matches = vault.query(&args.term);
    if matches.is_empty() {
        println!("no matches for {:?}", args.term);
        return Ok(());
    }
    for id in matches {
        println!("{}", id.to_string().yellow());
    }
    Ok(())
}

fn cmd_lookup(vault: &Vault, args: LookupArgs) -> anyhow::Result<()> {
    let entry = vault.lookup(&parse_id(&args.id)?)?;
    println!("{}  {}", entry.id.to_string().yellow().bold(), entry.status.to_string().cyan());
    println!("  location: {}", entry.location);
    println!("  hash: {}", entry.content_hash.to_string().dimmed());
    println!("  size: {} bytes", entry.size);
    println!("  created: {}", entry.created_at.to_rfc3339());
    if let Some(note) = &entry.note {
        println!("  note: {}", note.red());
    }
    Ok(())
}

fn cmd_rebuild_manifest(vault: &Vault) -> anyhow::Result<()> {
    let report = vault.rebuild_manifest()?;
    println!(
        "{} manifest rebuilt: {} entries, {} flagged",
        "✓".green().bold(),
        report.total,
        report.flagged.len(),
    );
    for id in &report.flagged {
        println!("  {} {id}", "flagged:".red());
    }
    Ok(())
}

fn cmd_rebuild_index(vault: &Vault) -> anyhow::Result<()> {
    let indexed = vault.rebuild_index()?;
    println!("{} search index rebuilt: {indexed} records", "✓".green().bold());
    Ok(())
}

fn cmd_migrate(vault: &Vault, args: MigrateArgs) -> anyhow::Result<()> {
    let report = vault.migrate(&args.legacy)?;
    println!(
        "{} migrated {}, skipped {}",
        "✓".green().bold(),
        report.migrated.to_string().green(),
        report.skipped.to_string().yellow(),
    );
    println!("  monolith archived at {}", report.archived_monolith.display());
    Ok(())
}

fn cmd_events(vault: &Vault, args: EventsArgs) -> anyhow::Result<()> {
    let events = vault.events()?;
    let skip = args
        .tail
        .map(|n| events.len().saturating_sub(n))
        .unwrap_or(0);
    for event in &events[skip..] {
        println!(
            "{}  {:?}  {}",
            event.timestamp.to_rfc3339().dimmed(),
            event.action,
            event.context,
        );
    }
    Ok(())
}
