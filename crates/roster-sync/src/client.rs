//! Async HTTP client for the central server's sync endpoints.

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, StatusCode};
use roster_core::attendance::{AttendanceInput, AttendanceView};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the central server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// What the server reported for one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
  /// Records committed, in request order.
  pub count: usize,
  /// Set when the server stopped part-way through the batch.
  pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushBody<'a> {
  teacher_id:         &'a str,
  attendance_records: &'a [AttendanceInput],
}

#[derive(Deserialize)]
struct PushReply {
  #[serde(default)]
  count:   Option<usize>,
  #[serde(default)]
  message: String,
  #[serde(default)]
  error:   Option<String>,
}

/// Async HTTP client for the central sync API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// `POST /api/sync/import-attendance`
  ///
  /// A 500 that carries a `count` is a partial push, not a client error.
  pub async fn push(&self, teacher_id: &str, records: &[AttendanceInput]) -> Result<PushOutcome> {
    let resp = self
      .auth(self.client.post(self.url("/sync/import-attendance")))
      .json(&PushBody { teacher_id, attendance_records: records })
      .send()
      .await
      .context("POST /sync/import-attendance failed")?;

    let status = resp.status();
    let reply: Option<PushReply> = resp.json().await.ok();

    match (status, reply) {
      (s, Some(PushReply { count: Some(count), .. })) if s.is_success() => {
        Ok(PushOutcome { count, error: None })
      }
      (s, Some(PushReply { count: Some(count), message, error }))
        if s == StatusCode::INTERNAL_SERVER_ERROR =>
      {
        Ok(PushOutcome { count, error: Some(error.unwrap_or(message)) })
      }
      (s, Some(reply)) => Err(anyhow!("POST /sync/import-attendance → {s}: {}", reply.message)),
      (s, None) => Err(anyhow!("POST /sync/import-attendance → {s}")),
    }
  }

  /// `GET /api/sync/export-attendance/{teacherId}`
  pub async fn pull(&self, teacher_id: &str) -> Result<Vec<AttendanceView>> {
    let path = format!("/sync/export-attendance/{teacher_id}");
    let resp = self
      .auth(self.client.get(self.url(&path)))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET {path} → {}", resp.status()));
    }
    resp.json().await.context("deserialising attendance")
  }
}
