use clap::Parser;
use std::path::PathBuf;

/// Replay exported chat message files into a relational store, scoring XP
/// per message (spec §6 "Invocation surface").
#[derive(Parser, Debug)]
#[command(name = "activity-ingest", version, about)]
pub struct Args {
    /// A single export file to ingest. Mutually exclusive with --dir.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// A directory of export files to ingest, non-recursively. Mutually
    /// exclusive with --file.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Glob applied under --dir.
    #[arg(long, default_value = "*.json")]
    pub pattern: String,

    /// Only ingest the guild with this external (Discord) id.
    #[arg(long)]
    pub guild_id: Option<String>,

    /// Parse and score every message but open no transaction and persist
    /// nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Use the merge + bulk-copy path. This build only implements that path;
    /// the flag exists for compatibility with the original invocation surface.
    #[arg(long)]
    pub fast: bool,

    /// Log and skip files that fail to parse instead of aborting the run.
    #[arg(long)]
    pub skip_bad_files: bool,

    /// Database connection string. Falls back to the DATABASE_URL
    /// environment variable if unset. Unused in --dry-run mode.
    #[arg(long, env = "DB_CONNECTION_STRING")]
    pub database_url: Option<String>,

    /// Load a .env file before reading the connection string.
    #[arg(long, default_value_t = true)]
    pub dotenv: bool,
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.file, &self.dir) {
            (Some(_), Some(_)) => anyhow::bail!("--file and --dir are mutually exclusive"),
            (None, None) => anyhow::bail!("exactly one of --file or --dir is required"),
            _ => Ok(()),
        }
    }
}
