//! Error type for `roster-replica`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("teacher not found: {0}")]
  TeacherNotFound(String),

  #[error("no sections assigned to teacher {0}")]
  NoSectionsAssigned(String),

  /// The destination would resolve outside the instances root.
  #[error("path {candidate:?} is not inside {root:?}")]
  Sandbox { candidate: PathBuf, root: PathBuf },

  /// The destination already holds another teacher's replica.
  #[error("replica belongs to teacher {owner}, not {teacher}")]
  ForeignReplica { owner: String, teacher: String },

  #[error("translation error: {0}")]
  Translate(#[from] roster_core::Error),

  #[error("io error at {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("central store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
