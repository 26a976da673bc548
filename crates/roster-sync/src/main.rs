//! `roster-sync` moves attendance between a teacher replica and the central
//! server.
//!
//! # Usage
//!
//! ```
//! roster-sync --replica teacher-instances/amal --user amal --password secret push
//! roster-sync --replica teacher-instances/amal pull
//! roster-sync --replica teacher-instances/amal status
//! ```

mod client;
mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use roster_replica::{REPLICA_DB_FILE, ReplicaStore};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "roster-sync", about = "Sync a teacher replica with the central server")]
struct Args {
  /// Replica directory containing the local database.
  #[arg(short, long, default_value = ".", value_name = "DIR")]
  replica: PathBuf,

  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the central server (default: the replica's own setting).
  #[arg(long, env = "ROSTER_URL")]
  url: Option<String>,

  /// Central username.
  #[arg(long, env = "ROSTER_USER")]
  user: Option<String>,

  /// Central password (plaintext).
  #[arg(long, env = "ROSTER_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Send unsynced attendance to the central server.
  Push,
  /// Merge central attendance into the replica.
  Pull,
  /// Show pending/synced counts and recent sync activity.
  Status {
    /// Number of log entries to show.
    #[arg(long, default_value_t = 5)]
    recent: usize,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let db_path = args.replica.join(REPLICA_DB_FILE);
  if !db_path.is_file() {
    anyhow::bail!("no replica database at {}", db_path.display());
  }
  let replica = ReplicaStore::open(&db_path)
    .await
    .with_context(|| format!("opening replica at {}", db_path.display()))?;

  match &args.command {
    Command::Status { recent } => print_status(&replica, *recent).await?,
    Command::Push => {
      let client = connect(&args, &replica).await?;
      let report = sync::push(&replica, &client).await?;
      println!("pushed {} of {} pending records", report.pushed, report.pending);
      if let Some(error) = report.error {
        anyhow::bail!("server stopped the push: {error}");
      }
    }
    Command::Pull => {
      let client = connect(&args, &replica).await?;
      let report = sync::pull(&replica, &client).await?;
      println!(
        "received {}, merged {}, skipped {}",
        report.received, report.merged, report.skipped
      );
    }
  }

  Ok(())
}

/// CLI flags override the config file, which overrides the replica's own
/// owner and central URL.
async fn connect(args: &Args, replica: &ReplicaStore) -> Result<ApiClient> {
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let owner = sync::owner(replica).await?;
  let pick = |flag: &Option<String>, file: &str| {
    flag.clone().or_else(|| (!file.is_empty()).then(|| file.to_owned()))
  };

  ApiClient::new(ApiConfig {
    base_url: pick(&args.url, &file_cfg.url).unwrap_or(owner.central_server_url),
    username: pick(&args.user, &file_cfg.username).unwrap_or(owner.username),
    password: pick(&args.password, &file_cfg.password).unwrap_or_default(),
  })
}

async fn print_status(replica: &ReplicaStore, recent: usize) -> Result<()> {
  let status = sync::status(replica, recent).await?;
  match &status.user {
    Some(user) => println!("owner:    {} ({}) -> {}", user.full_name, user.id, user.central_server_url),
    None => println!("owner:    <not provisioned>"),
  }
  let c = status.counts;
  println!("sections: {}  students: {}", c.sections, c.students);
  println!("pending:  {}  synced:   {}", c.pending, c.synced);
  for entry in status.recent {
    println!("{}  {:<9} {}", entry.timestamp.to_rfc3339(), entry.action, entry.details);
  }
  Ok(())
}
