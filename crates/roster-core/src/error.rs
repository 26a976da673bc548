//! Error types for `roster-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing input.
  #[error("validation error: {0}")]
  Validation(String),

  /// A central key has no faithful representation in the replica schema.
  #[error("{entity} id {key:?} cannot be represented as a replica integer key")]
  UnrepresentableKey { entity: &'static str, key: String },

  #[error("unknown role: {0:?}")]
  UnknownRole(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
