//! HTTP Basic-auth extractor resolving credentials to a [`Caller`].
//!
//! Credentials are checked against the central user table; the password is
//! verified against the stored argon2 PHC string.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use roster_core::{guard::Caller, store::CentralStore};

use crate::{AppState, error::ApiError};

/// The authenticated identity behind a request.
pub struct Authenticated(pub Caller);

/// Split an `Authorization: Basic …` header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Resolve the request's credentials to a central user.
pub async fn verify_auth<S>(headers: &HeaderMap, store: &S) -> Result<Caller, ApiError>
where
  S: CentralStore,
{
  let (username, password) = basic_credentials(headers)?;

  let teacher = store
    .find_teacher_by_username(&username)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&teacher.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(teacher.caller())
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: CentralStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match verify_auth(&parts.headers, state.store.as_ref()).await {
      Ok(caller) => Ok(Authenticated(caller)),
      Err(e) => {
        tracing::warn!(uri = %parts.uri, "rejected credentials");
        Err(e)
      }
    }
  }
}
