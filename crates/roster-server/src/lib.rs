//! HTTP surface for replica provisioning and attendance sync.
//!
//! Exposes an axum [`Router`] backed by any [`CentralStore`]:
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/api/admin/create-instance` | [`handlers::replica::create_instance`] |
//! | `POST` | `/api/sync/import-attendance` | [`handlers::sync::import_attendance`] |
//! | `GET`  | `/api/sync/export-attendance/{teacherId}` | [`handlers::sync::export_attendance`] |
//!
//! Every route requires HTTP Basic credentials of a central user.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use roster_core::store::CentralStore;
use roster_replica::{DEFAULT_CENTRAL_SERVER_URL, ProvisionConfig, ReplicaProvisioner};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{replica, sync};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which attendance rows a pull returns.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PullScope {
  /// The whole central attendance set.
  #[default]
  All,
  /// Only rows in sections assigned to the target teacher.
  Assigned,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROSTER_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// Central SQLite database. Never copied into a replica.
  pub store_path:         PathBuf,
  /// Every replica is created strictly below this directory.
  pub instances_root:     PathBuf,
  /// The deployable application bundle copied into each replica.
  pub bundle_dir:         PathBuf,
  #[serde(default = "default_central_server_url")]
  pub central_server_url: String,
  #[serde(default)]
  pub pull_scope:         PullScope,
}

fn default_central_server_url() -> String { DEFAULT_CENTRAL_SERVER_URL.to_owned() }

impl ServerConfig {
  fn provision_config(&self) -> ProvisionConfig {
    ProvisionConfig {
      instances_root:     self.instances_root.clone(),
      bundle_dir:         self.bundle_dir.clone(),
      central_db_path:    Some(self.store_path.clone()),
      central_server_url: self.central_server_url.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: CentralStore> {
  pub store:       Arc<S>,
  pub config:      Arc<ServerConfig>,
  pub provisioner: Arc<ReplicaProvisioner<S>>,
}

impl<S: CentralStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    let provisioner = ReplicaProvisioner::new(store.clone(), config.provision_config());
    Self {
      store,
      config: Arc::new(config),
      provisioner: Arc::new(provisioner),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the central server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: CentralStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/api/admin/create-instance",               post(replica::create_instance::<S>))
    .route("/api/sync/import-attendance",              post(sync::import_attendance::<S>))
    .route("/api/sync/export-attendance/{teacher_id}", get(sync::export_attendance::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Test fixtures ────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
  use std::sync::Arc;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use roster_core::{
    roster::{Section, Student},
    teacher::Role,
  };
  use roster_store_sqlite::{NewUser, SqliteStore};

  use super::*;

  pub fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  pub async fn make_state() -> (AppState<SqliteStore>, tempfile::TempDir) {
    make_state_with(PullScope::All).await
  }

  /// Users `admin`, `amal` (id `T`, sections A and B) and `nadia` (id `U`,
  /// no sections), all with password `secret`. Students 1 and 2 are in A,
  /// 3 in B, 4 in C.
  pub async fn make_state_with(
    pull_scope: PullScope,
  ) -> (AppState<SqliteStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::write(app.join("package.json"), "{}").unwrap();

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();

    let store = SqliteStore::open_in_memory().await.unwrap();
    for (id, username, role) in [
      ("ADM", "admin", Role::Admin),
      ("T", "amal", Role::Teacher),
      ("U", "nadia", Role::Teacher),
    ] {
      store
        .create_user(NewUser {
          id:            id.into(),
          username:      username.into(),
          password_hash: hash.clone(),
          full_name:     username.into(),
          role,
        })
        .await
        .unwrap();
    }
    for id in ["A", "B", "C"] {
      store
        .create_section(Section {
          id:                id.into(),
          name:              format!("Section {id}"),
          educational_level: Some("middle".into()),
          specialization:    Some("science".into()),
        })
        .await
        .unwrap();
    }
    for (id, section) in [("1", "A"), ("2", "A"), ("3", "B"), ("4", "C")] {
      store
        .create_student(Student {
          id:          id.into(),
          first_name:  format!("F{id}"),
          last_name:   format!("L{id}"),
          section_id:  section.into(),
          class_order: id.parse().ok(),
        })
        .await
        .unwrap();
    }
    store.assign_sections("T", &["A".into(), "B".into()]).await.unwrap();

    let config = ServerConfig {
      host:               "127.0.0.1".to_string(),
      port:               4001,
      store_path:         app.join("attendance-central.db"),
      instances_root:     app.join("teacher-instances"),
      bundle_dir:         app,
      central_server_url: default_central_server_url(),
      pull_scope,
    };

    (AppState::new(Arc::new(store), config), dir)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
