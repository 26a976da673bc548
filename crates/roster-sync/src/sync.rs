//! Push, pull and status against one replica directory.

use anyhow::{Context, Result};
use roster_core::{
  attendance::AttendanceView,
  translate::{ReplicaAttendance, ReplicaUser, attendance_from_replica, attendance_to_replica},
};
use roster_replica::{ReplicaCounts, ReplicaStore, SyncLogEntry};
use serde_json::json;

use crate::client::{ApiClient, PushOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
  pub pending: usize,
  pub pushed:  usize,
  pub error:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
  pub received: usize,
  pub merged:   usize,
  /// Rows for students this replica does not hold.
  pub skipped:  usize,
}

pub struct Status {
  pub user:   Option<ReplicaUser>,
  pub counts: ReplicaCounts,
  pub recent: Vec<SyncLogEntry>,
}

pub async fn owner(replica: &ReplicaStore) -> Result<ReplicaUser> {
  replica
    .user()
    .await?
    .context("replica has no user row; provision it first")
}

// ─── Push ─────────────────────────────────────────────────────────────────────

/// Send every unsynced row as one batch for the replica's owner.
pub async fn push(replica: &ReplicaStore, client: &ApiClient) -> Result<PushReport> {
  let user = owner(replica).await?;
  let pending = replica.pending_attendance().await?;
  if pending.is_empty() {
    return Ok(PushReport { pending: 0, pushed: 0, error: None });
  }

  let records: Vec<_> = pending.iter().map(attendance_from_replica).collect();
  let outcome = client.push(&user.id, &records).await?;
  record_push(replica, &pending, outcome).await
}

/// Mark the committed prefix of `pending` as synced and log the push.
pub(crate) async fn record_push(
  replica: &ReplicaStore,
  pending: &[ReplicaAttendance],
  outcome: PushOutcome,
) -> Result<PushReport> {
  let sent = pending.iter().take(outcome.count).cloned().collect();
  let pushed = replica.mark_synced(sent).await?;

  replica
    .log(
      "push",
      json!({ "pending": pending.len(), "count": pushed, "error": outcome.error }),
    )
    .await?;

  match &outcome.error {
    None => tracing::info!(count = pushed, "attendance pushed"),
    Some(e) => tracing::warn!(count = pushed, pending = pending.len(), error = %e, "push stopped part-way"),
  }

  Ok(PushReport { pending: pending.len(), pushed, error: outcome.error })
}

// ─── Pull ─────────────────────────────────────────────────────────────────────

/// Fetch central attendance and merge it into the replica.
pub async fn pull(replica: &ReplicaStore, client: &ApiClient) -> Result<PullReport> {
  let user = owner(replica).await?;
  let rows = client.pull(&user.id).await?;
  apply_pull(replica, rows).await
}

/// Keep rows whose student is in the replica and merge them as synced.
pub(crate) async fn apply_pull(
  replica: &ReplicaStore,
  rows: Vec<AttendanceView>,
) -> Result<PullReport> {
  let received = rows.len();
  let known = replica.student_ids().await?;

  let keep: Vec<_> = rows
    .iter()
    .filter_map(|view| attendance_to_replica(&view.record).ok())
    .filter(|row| known.contains(&row.student_id))
    .collect();
  let skipped = received - keep.len();

  let merged = replica.merge_pulled(keep).await?;
  replica
    .log("pull", json!({ "received": received, "merged": merged, "skipped": skipped }))
    .await?;

  tracing::info!(received, merged, skipped, "attendance pulled");
  Ok(PullReport { received, merged, skipped })
}

// ─── Status ───────────────────────────────────────────────────────────────────

pub async fn status(replica: &ReplicaStore, recent: usize) -> Result<Status> {
  Ok(Status {
    user:   replica.user().await?,
    counts: replica.counts().await?,
    recent: replica.recent_logs(recent).await?,
  })
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, Utc};
  use roster_core::{
    attendance::{AttendanceRecord, SectionRef, StudentRef},
    translate::{ReplicaSection, ReplicaStudent},
  };

  use super::*;

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 10).unwrap() }

  async fn replica() -> ReplicaStore {
    let store = ReplicaStore::open_in_memory().await.unwrap();
    store
      .write_slice(
        ReplicaUser {
          id:                 "T".into(),
          username:           "amal".into(),
          password:           String::new(),
          full_name:          "Amal".into(),
          central_server_url: "http://localhost:4001".into(),
        },
        vec![ReplicaSection { id: "A".into(), name: "A".into(), educational_level: None }],
        (1..=3)
          .map(|id| ReplicaStudent {
            id,
            first_name:  format!("F{id}"),
            last_name:   format!("L{id}"),
            section_id:  "A".into(),
            class_order: None,
          })
          .collect(),
      )
      .await
      .unwrap();
    store
  }

  fn view(student_id: &str, is_present: bool) -> AttendanceView {
    let now = Utc::now();
    AttendanceView {
      record:  AttendanceRecord {
        id: 1,
        student_id: student_id.into(),
        section_id: "A".into(),
        date: date(),
        is_present,
        created_at: now,
        updated_at: now,
      },
      student: StudentRef {
        id:         student_id.into(),
        first_name: "F".into(),
        last_name:  "L".into(),
        section_id: "A".into(),
      },
      section: SectionRef {
        id:                "A".into(),
        name:              "A".into(),
        educational_level: None,
        specialization:    None,
      },
    }
  }

  #[tokio::test]
  async fn full_push_marks_everything_synced() {
    let replica = replica().await;
    for id in 1..=3 {
      replica.record_attendance(id, "A", date(), true).await.unwrap();
    }
    let pending = replica.pending_attendance().await.unwrap();

    let report = record_push(&replica, &pending, PushOutcome { count: 3, error: None })
      .await
      .unwrap();
    assert_eq!(report.pushed, 3);

    let counts = replica.counts().await.unwrap();
    assert_eq!((counts.pending, counts.synced), (0, 3));
    assert_eq!(replica.recent_logs(1).await.unwrap()[0].action, "push");
  }

  #[tokio::test]
  async fn partial_push_marks_only_committed_prefix() {
    let replica = replica().await;
    for id in 1..=3 {
      replica.record_attendance(id, "A", date(), true).await.unwrap();
    }
    let pending = replica.pending_attendance().await.unwrap();

    let outcome = PushOutcome { count: 1, error: Some("boom".into()) };
    let report = record_push(&replica, &pending, outcome).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.error.as_deref(), Some("boom"));

    let still_pending: Vec<_> = replica
      .pending_attendance()
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.student_id)
      .collect();
    assert_eq!(still_pending, [2, 3]);
  }

  #[tokio::test]
  async fn correction_during_push_stays_pending() {
    let replica = replica().await;
    replica.record_attendance(1, "A", date(), true).await.unwrap();
    let pending = replica.pending_attendance().await.unwrap();

    // The teacher corrects the row while the batch is in flight.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    replica.record_attendance(1, "A", date(), false).await.unwrap();

    let report = record_push(&replica, &pending, PushOutcome { count: 1, error: None })
      .await
      .unwrap();
    assert_eq!(report.pushed, 0);

    let still_pending = replica.pending_attendance().await.unwrap();
    assert_eq!(still_pending.len(), 1);
    assert!(!still_pending[0].is_present);
  }

  #[tokio::test]
  async fn pull_skips_foreign_students_and_keeps_local_edits() {
    let replica = replica().await;
    // Student 2 has an unpushed local observation.
    replica.record_attendance(2, "A", date(), false).await.unwrap();

    let report = apply_pull(
      &replica,
      vec![view("1", true), view("2", true), view("99", true), view("S-x", true)],
    )
    .await
    .unwrap();
    assert_eq!(report, PullReport { received: 4, merged: 1, skipped: 2 });

    let pending = replica.pending_attendance().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].is_present);

    let counts = replica.counts().await.unwrap();
    assert_eq!((counts.pending, counts.synced), (1, 1));
  }

  #[tokio::test]
  async fn status_reports_owner_and_log() {
    let replica = replica().await;
    apply_pull(&replica, vec![view("1", true)]).await.unwrap();

    let status = status(&replica, 5).await.unwrap();
    assert_eq!(status.user.unwrap().id, "T");
    assert_eq!(status.counts.students, 3);
    assert_eq!(status.recent.len(), 1);
    assert_eq!(status.recent[0].action, "pull");
  }

  #[tokio::test]
  async fn unprovisioned_replica_has_no_owner() {
    let store = ReplicaStore::open_in_memory().await.unwrap();
    assert!(owner(&store).await.is_err());
  }
}
