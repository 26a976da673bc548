//! Attendance sync between replicas and the central store.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/sync/import-attendance` | Body: [`ImportBody`]; upserts in request order |
//! | `GET`  | `/api/sync/export-attendance/{teacherId}` | Joined rows, filtered by `pull_scope` |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use roster_core::{
  attendance::{AttendanceInput, AttendanceView},
  store::{AttendanceScope, CentralStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::authorize;
use crate::{AppState, PullScope, auth::Authenticated, error::ApiError};

// ─── Import ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBody {
  pub teacher_id:         Option<String>,
  /// Checked record by record so a malformed entry names its index.
  pub attendance_records: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
  pub message: &'static str,
  pub count:   usize,
}

/// Parse and validate every record before anything is written.
fn parse_records(records: Option<Value>) -> Result<Vec<AttendanceInput>, ApiError> {
  let items = match records {
    Some(Value::Array(items)) if !items.is_empty() => items,
    _ => return Err(ApiError::BadRequest("attendanceRecords must be a non-empty array".into())),
  };

  items
    .into_iter()
    .enumerate()
    .map(|(i, item)| {
      let input: AttendanceInput = serde_json::from_value(item)
        .map_err(|e| ApiError::BadRequest(format!("record {i}: {e}")))?;
      input
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("record {i}: {e}")))?;
      Ok(input)
    })
    .collect()
}

/// `POST /api/sync/import-attendance`
pub async fn import_attendance<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  body: Result<Json<ImportBody>, JsonRejection>,
) -> Result<Json<ImportResponse>, ApiError>
where
  S: CentralStore + Clone + Send + Sync + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

  let teacher_id = body
    .teacher_id
    .filter(|id| !id.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest("teacherId is required".into()))?;

  authorize(&caller, &teacher_id)?;

  let records = parse_records(body.attendance_records)?;

  let mut count = 0;
  for input in records {
    if let Err(e) = state.store.upsert_attendance(input).await {
      return Err(ApiError::PartialPush { count, source: Box::new(e) });
    }
    count += 1;
  }

  tracing::info!(teacher_id = %teacher_id, count, "attendance imported");
  Ok(Json(ImportResponse { message: "attendance imported", count }))
}

// ─── Export ───────────────────────────────────────────────────────────────────

/// `GET /api/sync/export-attendance/{teacherId}`
pub async fn export_attendance<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(teacher_id): Path<String>,
) -> Result<Json<Vec<AttendanceView>>, ApiError>
where
  S: CentralStore + Clone + Send + Sync + 'static,
{
  authorize(&caller, &teacher_id)?;

  let scope = match state.config.pull_scope {
    PullScope::All => AttendanceScope::All,
    PullScope::Assigned => {
      let teacher = state
        .store
        .get_teacher(&teacher_id)
        .await
        .map_err(|e| ApiError::Store(Box::new(e)))?
        .ok_or_else(|| ApiError::NotFound(format!("teacher {teacher_id} not found")))?;
      AttendanceScope::Sections(teacher.section_ids())
    }
  };

  let rows = state
    .store
    .list_attendance(scope)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(teacher_id = %teacher_id, rows = rows.len(), "attendance exported");
  Ok(Json(rows))
}
