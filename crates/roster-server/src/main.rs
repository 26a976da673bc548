//! Central roster server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `ROSTER_*` environment variables, opens the central SQLite store, and
//! serves the provisioning and sync API over HTTP.
//!
//! # Bootstrapping
//!
//! ```
//! cargo run -p roster-server --bin server -- --hash-password
//! cargo run -p roster-server --bin server -- --create-admin admin
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use roster_core::teacher::Role;
use roster_server::{AppState, ServerConfig};
use roster_store_sqlite::{NewUser, SqliteStore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roster central server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create the first admin account (password read from stdin) and exit.
  /// Refused once any user exists.
  #[arg(long, value_name = "USERNAME")]
  create_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password_line()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROSTER"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg.store_path     = expand_tilde(&server_cfg.store_path);
  server_cfg.instances_root = expand_tilde(&server_cfg.instances_root);
  server_cfg.bundle_dir     = expand_tilde(&server_cfg.bundle_dir);

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  if let Some(username) = cli.create_admin {
    return create_admin(&store, username).await;
  }

  tracing::info!(
    users = store.count_users().await?,
    attendance = store.count_attendance().await?,
    path = %server_cfg.store_path.display(),
    "central store opened"
  );

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!(
    instances_root = %server_cfg.instances_root.display(),
    bundle_dir = %server_cfg.bundle_dir.display(),
    pull_scope = ?server_cfg.pull_scope,
    "configuration loaded"
  );

  let state = AppState::new(Arc::new(store), server_cfg);
  let app = roster_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn create_admin(store: &SqliteStore, username: String) -> anyhow::Result<()> {
  if store.count_users().await? > 0 {
    anyhow::bail!("users already exist; refusing to create another admin");
  }
  let password = read_password_line()?;
  if password.is_empty() {
    anyhow::bail!("password must not be empty");
  }

  let user = store
    .create_user(NewUser {
      id:            uuid::Uuid::new_v4().to_string(),
      full_name:     username.clone(),
      username,
      password_hash: hash_password(&password)?,
      role:          Role::Admin,
    })
    .await
    .context("failed to create admin")?;

  tracing::info!(id = %user.id, username = %user.username, "admin created");
  println!("{}", user.id);
  Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}

/// Read one password line from stdin. The terminal echoes it; pipe the
/// password in to keep it off screen.
fn read_password_line() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
