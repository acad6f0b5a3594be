//! Thin external-collaborator binary: argument parsing, file discovery, and
//! wiring `activity-core`'s `Ingestor` to either `activity-store`'s Postgres
//! `Store` or the in-memory one for `--dry-run` (spec §1 "out of scope" /
//! §6 "Invocation surface"). Not covered by the invariants in spec §8.

mod cli;
mod discover;
mod group;
mod parse;

use activity_core::memory::InMemoryStore;
use activity_core::store::Store;
use activity_core::{IngestConfig, Ingestor};
use activity_store::PgStore;
use anyhow::Context;
use clap::Parser;
use cli::Args;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
#[error("no database connection string configured (set --database-url, DB_CONNECTION_STRING, or DATABASE_URL, or pass --dry-run)")]
struct MissingConnectionString;

struct RunSummary {
    guild_count: usize,
    rows_written: usize,
    users_updated: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(summary) => {
            tracing::info!(
                guilds = summary.guild_count,
                rows = summary.rows_written,
                users = summary.users_updated,
                "ingest complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) if err.downcast_ref::<MissingConnectionString>().is_some() => {
            tracing::error!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<RunSummary> {
    args.validate()?;

    if args.dotenv {
        // Missing .env is not an error; the process environment may already
        // carry everything needed.
        let _ = dotenvy::dotenv();
    }

    if args.fast {
        tracing::debug!("--fast requested; this build only implements the merge + bulk-copy path");
    }

    let files = discover::discover_files(args.file.as_deref(), args.dir.as_deref(), &args.pattern)
        .context("discovering input files")?;
    if files.is_empty() {
        anyhow::bail!("no input files matched");
    }

    let mut exports = Vec::with_capacity(files.len());
    for path in &files {
        match parse::parse_export(path) {
            Ok(export) => exports.push(export),
            Err(err) if args.skip_bad_files => {
                tracing::warn!(file = %path.display(), error = %err, "skipping unparsable file");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut batches = group::group_by_guild(exports);
    if let Some(guild_id) = &args.guild_id {
        batches.retain(|b| &b.guild_id_ext == guild_id);
    }
    let guild_count = batches.len();

    let store: Box<dyn Store> = if args.dry_run {
        tracing::info!("dry-run: scoring every message without opening a transaction");
        Box::new(InMemoryStore::new())
    } else {
        let database_url = args
            .database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or(MissingConnectionString)?;
        let pg = PgStore::connect(&database_url)?;
        pg.ensure_schema()
            .await
            .context("creating tables on first run")?;
        Box::new(pg)
    };

    let ingestor = Ingestor::new(IngestConfig::default());
    let mut rows_written = 0usize;
    let mut users_updated = 0usize;

    for batch in batches {
        let txn = store.begin_guild().await?;
        let summary = ingestor
            .ingest_guild(txn, &batch.guild_id_ext, &batch.guild_name, batch.channels)
            .await?;
        tracing::info!(
            guild = %batch.guild_id_ext,
            rows = summary.rows_written,
            users = summary.users_updated,
            "guild ingested"
        );
        rows_written += summary.rows_written;
        users_updated += summary.users_updated;
    }

    Ok(RunSummary {
        guild_count,
        rows_written,
        users_updated,
    })
}
