//! API error type and axum `IntoResponse` implementation.
//!
//! Every error body is JSON with at least a `message` field.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden")]
  Forbidden,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A generated path would leave the instances root.
  #[error("invalid path: {0}")]
  Security(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("replica error: {0}")]
  Replica(#[source] roster_replica::Error),

  /// A push stopped part-way; `count` records were committed.
  #[error("push stopped after {count} records: {source}")]
  PartialPush {
    count:  usize,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl From<roster_replica::Error> for ApiError {
  fn from(e: roster_replica::Error) -> Self {
    use roster_replica::Error as E;
    match e {
      E::TeacherNotFound(id) => ApiError::NotFound(format!("teacher {id} not found")),
      E::NoSectionsAssigned(id) => {
        ApiError::BadRequest(format!("no sections assigned to teacher {id}"))
      }
      e @ E::Sandbox { .. } => ApiError::Security(e.to_string()),
      e @ E::ForeignReplica { .. } => ApiError::Conflict(e.to_string()),
      other => ApiError::Replica(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "message": "unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"roster\""),
        );
        res
      }
      ApiError::Forbidden => {
        (StatusCode::FORBIDDEN, Json(json!({ "message": "forbidden" }))).into_response()
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": m }))).into_response()
      }
      ApiError::NotFound(m) => {
        (StatusCode::NOT_FOUND, Json(json!({ "message": m }))).into_response()
      }
      ApiError::Conflict(m) => {
        (StatusCode::CONFLICT, Json(json!({ "message": m }))).into_response()
      }
      ApiError::Security(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": "invalid path", "error": m })))
          .into_response()
      }
      ApiError::Store(e) => internal("store operation failed", &*e),
      ApiError::Replica(e) => internal("failed to create replica", &e),
      ApiError::PartialPush { count, source } => {
        tracing::error!(count, error = %source, "attendance push stopped part-way");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({
            "message": "failed to import attendance",
            "count":   count,
            "error":   source.to_string(),
          })),
        )
          .into_response()
      }
    }
  }
}

fn internal(message: &str, e: &(dyn std::error::Error + 'static)) -> Response {
  tracing::error!(error = %e, "{message}");
  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(json!({ "message": message, "error": e.to_string() })),
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;

  async fn body_json(res: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[test]
  fn replica_errors_map_to_taxonomy() {
    let cases = [
      (roster_replica::Error::TeacherNotFound("t".into()), StatusCode::NOT_FOUND),
      (roster_replica::Error::NoSectionsAssigned("t".into()), StatusCode::BAD_REQUEST),
      (
        roster_replica::Error::Sandbox { candidate: PathBuf::from(".."), root: PathBuf::from("/r") },
        StatusCode::BAD_REQUEST,
      ),
      (
        roster_replica::Error::ForeignReplica { owner: "t1".into(), teacher: "t2".into() },
        StatusCode::CONFLICT,
      ),
      (
        roster_replica::Error::DateParse("x".into()),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), status);
    }
  }

  #[tokio::test]
  async fn unauthorized_carries_challenge() {
    let res = ApiError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(body_json(res).await["message"], "unauthorized");
  }

  #[tokio::test]
  async fn partial_push_reports_count() {
    let err = ApiError::PartialPush { count: 2, source: "disk full".into() };
    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["error"], "disk full");
  }
}
