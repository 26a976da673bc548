//! `POST /api/admin/create-instance`: build or rebuild a teacher replica.

use std::path::PathBuf;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use roster_core::store::CentralStore;
use serde::{Deserialize, Serialize};

use super::authorize;
use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceBody {
  pub teacher_id:    Option<String>,
  /// Accepted and ignored: destinations always derive from the username.
  pub output_folder: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateInstanceResponse {
  pub message:  &'static str,
  pub path:     PathBuf,
  pub sections: usize,
  pub students: usize,
}

pub async fn create_instance<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  body: Result<Json<CreateInstanceBody>, JsonRejection>,
) -> Result<Json<CreateInstanceResponse>, ApiError>
where
  S: CentralStore + Clone + Send + Sync + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

  let teacher_id = body
    .teacher_id
    .filter(|id| !id.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest("teacherId is required".into()))?;

  authorize(&caller, &teacher_id)?;

  if let Some(folder) = &body.output_folder {
    tracing::debug!(%folder, "ignoring requested output folder");
  }

  let manifest = state.provisioner.provision(&teacher_id).await?;

  Ok(Json(CreateInstanceResponse {
    message:  "teacher replica created",
    path:     manifest.path,
    sections: manifest.section_count,
    students: manifest.student_count,
  }))
}
