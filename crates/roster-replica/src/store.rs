//! [`ReplicaStore`], the replica's local SQLite database.

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use serde::Serialize;

use roster_core::translate::{ReplicaAttendance, ReplicaSection, ReplicaStudent, ReplicaUser};

use crate::{Error, Result, schema::SCHEMA};

const ATTENDANCE_COLUMNS: &str =
  "id, studentId, sectionId, date, isPresent, createdAt, updatedAt, syncedToServer";

/// Row counts used for manifests and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicaCounts {
  pub sections: usize,
  pub students: usize,
  pub pending:  usize,
  pub synced:   usize,
}

/// One row of the append-only `SyncLog` table.
#[derive(Debug, Clone, Serialize)]
pub struct SyncLogEntry {
  pub id:        i64,
  pub action:    String,
  pub timestamp: DateTime<Utc>,
  pub details:   String,
}

/// A replica database file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct ReplicaStore {
  conn: tokio_rusqlite::Connection,
}

impl ReplicaStore {
  /// Open (or create) the replica at `path` and ensure the schema exists.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Provisioning ──────────────────────────────────────────────────────────

  /// Replace the replica's user, sections, and students in one transaction.
  ///
  /// Attendance and the sync log are left untouched. A replica already owned
  /// by a different user is refused with [`Error::ForeignReplica`] and left
  /// unchanged.
  pub async fn write_slice(
    &self,
    user: ReplicaUser,
    sections: Vec<ReplicaSection>,
    students: Vec<ReplicaStudent>,
  ) -> Result<()> {
    let teacher = user.id.clone();
    let foreign_owner = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
          .query_row(
            "SELECT id FROM User WHERE id <> ?1 LIMIT 1",
            rusqlite::params![user.id],
            |r| r.get(0),
          )
          .optional()?;
        if owner.is_some() {
          return Ok(owner);
        }

        tx.execute(
          "INSERT OR REPLACE INTO User (id, username, password, fullName, centralServerUrl)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            user.id,
            user.username,
            user.password,
            user.full_name,
            user.central_server_url,
          ],
        )?;

        tx.execute("DELETE FROM Sections", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO Sections (id, name, educationalLevel) VALUES (?1, ?2, ?3)",
          )?;
          for s in &sections {
            stmt.execute(rusqlite::params![s.id, s.name, s.educational_level])?;
          }
        }

        tx.execute("DELETE FROM Students", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO Students (id, first_name, last_name, section_id, class_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for s in &students {
            stmt.execute(rusqlite::params![
              s.id,
              s.first_name,
              s.last_name,
              s.section_id,
              s.class_order,
            ])?;
          }
        }

        tx.commit()?;
        Ok(None)
      })
      .await?;

    match foreign_owner {
      Some(owner) => Err(Error::ForeignReplica { owner, teacher }),
      None => Ok(()),
    }
  }

  /// The replica's owner, if provisioning has run.
  pub async fn user(&self) -> Result<Option<ReplicaUser>> {
    let user = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            "SELECT id, username, password, fullName, centralServerUrl FROM User LIMIT 1",
            [],
            |row| {
              Ok(ReplicaUser {
                id:                 row.get(0)?,
                username:           row.get(1)?,
                password:           row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                full_name:          row.get(3)?,
                central_server_url: row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;
    Ok(user)
  }

  pub async fn counts(&self) -> Result<ReplicaCounts> {
    let (sections, students, pending, synced): (i64, i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM Sections),
             (SELECT COUNT(*) FROM Students),
             (SELECT COUNT(*) FROM Attendances WHERE syncedToServer = 0),
             (SELECT COUNT(*) FROM Attendances WHERE syncedToServer = 1)",
          [],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?)
      })
      .await?;

    Ok(ReplicaCounts {
      sections: sections as usize,
      students: students as usize,
      pending:  pending as usize,
      synced:   synced as usize,
    })
  }

  pub async fn student_ids(&self) -> Result<HashSet<i64>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM Students")?;
        let ids = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<HashSet<i64>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  /// Record an offline observation. Overwrites the same `(student, date)`
  /// and marks it as not yet pushed.
  pub async fn record_attendance(
    &self,
    student_id: i64,
    section_id: &str,
    date: NaiveDate,
    is_present: bool,
  ) -> Result<ReplicaAttendance> {
    let section_id = section_id.to_owned();
    let date_str   = encode_date(date);
    let at_str     = Utc::now().to_rfc3339();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO Attendances
               (studentId, sectionId, date, isPresent, createdAt, updatedAt, syncedToServer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)
             ON CONFLICT (studentId, date) DO UPDATE SET
               sectionId      = excluded.sectionId,
               isPresent      = excluded.isPresent,
               updatedAt      = excluded.updatedAt,
               syncedToServer = 0
             RETURNING {ATTENDANCE_COLUMNS}"
          ),
          rusqlite::params![student_id, section_id, date_str, is_present, at_str],
          attendance_from_row,
        )?)
      })
      .await?;

    raw.into_attendance()
  }

  /// Rows not yet pushed, oldest first.
  pub async fn pending_attendance(&self) -> Result<Vec<ReplicaAttendance>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ATTENDANCE_COLUMNS} FROM Attendances
           WHERE syncedToServer = 0
           ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([], attendance_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_attendance).collect()
  }

  /// Flag the given rows as pushed. Returns the number of rows changed.
  ///
  /// A row only counts as pushed while it still holds the values that were
  /// sent. An observation recorded after `rows` was read stays pending.
  pub async fn mark_synced(&self, rows: Vec<ReplicaAttendance>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE Attendances SET syncedToServer = 1
             WHERE id = ?1 AND updatedAt = ?2 AND isPresent = ?3 AND sectionId = ?4",
          )?;
          for row in &rows {
            let Some(id) = row.id else { continue };
            changed += stmt.execute(rusqlite::params![
              id,
              row.updated_at.to_rfc3339(),
              row.is_present,
              row.section_id,
            ])?;
          }
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;
    Ok(changed)
  }

  /// Merge rows pulled from the central store.
  ///
  /// Rows still waiting to be pushed are kept as they are; everything else
  /// is overwritten on `(studentId, date)`. Returns the number of rows
  /// inserted or updated.
  pub async fn merge_pulled(&self, rows: Vec<ReplicaAttendance>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO Attendances
               (studentId, sectionId, date, isPresent, createdAt, updatedAt, syncedToServer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
             ON CONFLICT (studentId, date) DO UPDATE SET
               sectionId      = excluded.sectionId,
               isPresent      = excluded.isPresent,
               updatedAt      = excluded.updatedAt,
               syncedToServer = 1
             WHERE Attendances.syncedToServer = 1",
          )?;
          for row in &rows {
            changed += stmt.execute(rusqlite::params![
              row.student_id,
              row.section_id,
              encode_date(row.date),
              row.is_present,
              row.created_at.to_rfc3339(),
              row.updated_at.to_rfc3339(),
            ])?;
          }
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;
    Ok(changed)
  }

  // ── Sync log ──────────────────────────────────────────────────────────────

  pub async fn log(&self, action: &str, details: serde_json::Value) -> Result<()> {
    let action  = action.to_owned();
    let details = details.to_string();
    let at_str  = Utc::now().to_rfc3339();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO SyncLog (action, timestamp, details) VALUES (?1, ?2, ?3)",
          rusqlite::params![action, at_str, details],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Most recent log entries, newest first.
  pub async fn recent_logs(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
    let limit = limit as i64;
    let raws: Vec<(i64, String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, action, timestamp, details FROM SyncLog ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(id, action, timestamp, details)| {
        Ok(SyncLogEntry { id, action, timestamp: decode_dt(&timestamp)?, details })
      })
      .collect()
  }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

struct RawAttendance {
  id:         i64,
  student_id: i64,
  section_id: String,
  date:       String,
  is_present: bool,
  created_at: String,
  updated_at: String,
  synced:     bool,
}

impl RawAttendance {
  fn into_attendance(self) -> Result<ReplicaAttendance> {
    Ok(ReplicaAttendance {
      id:               Some(self.id),
      student_id:       self.student_id,
      section_id:       self.section_id,
      date:             decode_date(&self.date)?,
      is_present:       self.is_present,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
      synced_to_server: self.synced,
    })
  }
}

fn attendance_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAttendance> {
  Ok(RawAttendance {
    id:         row.get(0)?,
    student_id: row.get(1)?,
    section_id: row.get(2)?,
    date:       row.get(3)?,
    is_present: row.get(4)?,
    created_at: row.get(5)?,
    updated_at: row.get(6)?,
    synced:     row.get(7)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(id: &str) -> ReplicaUser {
    ReplicaUser {
      id:                 id.into(),
      username:           "amal".into(),
      password:           String::new(),
      full_name:          "Amal B.".into(),
      central_server_url: "http://central:4001".into(),
    }
  }

  fn section(id: &str) -> ReplicaSection {
    ReplicaSection { id: id.into(), name: format!("S{id}"), educational_level: None }
  }

  fn student(id: i64, section_id: &str) -> ReplicaStudent {
    ReplicaStudent {
      id,
      first_name: "F".into(),
      last_name: "L".into(),
      section_id: section_id.into(),
      class_order: Some(id),
    }
  }

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, d).unwrap() }

  #[tokio::test]
  async fn write_slice_replaces_previous_slice() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.write_slice(user("t1"), vec![section("A"), section("B")], vec![student(1, "A"), student(3, "B")])
      .await
      .unwrap();
    s.write_slice(user("t1"), vec![section("A")], vec![student(1, "A")])
      .await
      .unwrap();

    let counts = s.counts().await.unwrap();
    assert_eq!((counts.sections, counts.students), (1, 1));
    assert_eq!(s.user().await.unwrap().unwrap().id, "t1");
  }

  #[tokio::test]
  async fn write_slice_refuses_another_owner() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.write_slice(user("t1"), vec![section("A")], vec![student(1, "A")]).await.unwrap();
    s.record_attendance(1, "A", day(10), true).await.unwrap();

    let err = s
      .write_slice(user("t2"), vec![section("B")], vec![student(3, "B")])
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ForeignReplica { ref owner, ref teacher } if owner == "t1" && teacher == "t2"));

    assert_eq!(s.user().await.unwrap().unwrap().id, "t1");
    let counts = s.counts().await.unwrap();
    assert_eq!((counts.sections, counts.students, counts.pending), (1, 1, 1));
    assert_eq!(s.student_ids().await.unwrap(), HashSet::from([1]));
  }

  #[tokio::test]
  async fn write_slice_keeps_attendance() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.write_slice(user("t1"), vec![section("A")], vec![student(1, "A")]).await.unwrap();
    s.record_attendance(1, "A", day(10), true).await.unwrap();
    s.write_slice(user("t1"), vec![section("A")], vec![student(1, "A")]).await.unwrap();
    assert_eq!(s.counts().await.unwrap().pending, 1);
  }

  #[tokio::test]
  async fn record_attendance_is_unique_per_student_and_date() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    let a = s.record_attendance(1, "A", day(10), true).await.unwrap();
    let b = s.record_attendance(1, "A", day(10), false).await.unwrap();
    assert_eq!(a.id, b.id);
    assert!(!b.is_present);
    assert_eq!(s.pending_attendance().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn mark_synced_clears_pending() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    let a = s.record_attendance(1, "A", day(10), true).await.unwrap();
    s.record_attendance(2, "A", day(10), true).await.unwrap();

    let changed = s.mark_synced(vec![a]).await.unwrap();
    assert_eq!(changed, 1);
    let pending = s.pending_attendance().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].student_id, 2);
  }

  #[tokio::test]
  async fn edit_after_sync_is_pending_again() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    let a = s.record_attendance(1, "A", day(10), true).await.unwrap();
    s.mark_synced(vec![a]).await.unwrap();
    s.record_attendance(1, "A", day(10), false).await.unwrap();
    assert_eq!(s.pending_attendance().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn mark_synced_skips_rows_edited_since_read() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.record_attendance(1, "A", day(10), true).await.unwrap();
    let sent = s.pending_attendance().await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    s.record_attendance(1, "A", day(10), false).await.unwrap();

    assert_eq!(s.mark_synced(sent).await.unwrap(), 0);
    let pending = s.pending_attendance().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].is_present);
  }

  #[tokio::test]
  async fn merge_pulled_skips_unpushed_rows() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.record_attendance(1, "A", day(10), true).await.unwrap();

    let now = Utc::now();
    let pulled = |student_id, present| ReplicaAttendance {
      id: None,
      student_id,
      section_id: "A".into(),
      date: day(10),
      is_present: present,
      created_at: now,
      updated_at: now,
      synced_to_server: true,
    };

    let changed = s.merge_pulled(vec![pulled(1, false), pulled(2, false)]).await.unwrap();
    assert_eq!(changed, 1);

    let pending = s.pending_attendance().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_present, "local edit must survive a pull");
    assert_eq!(s.counts().await.unwrap().synced, 1);
  }

  #[tokio::test]
  async fn log_is_append_only_and_newest_first() {
    let s = ReplicaStore::open_in_memory().await.unwrap();
    s.log("provision", serde_json::json!({"sections": 2})).await.unwrap();
    s.log("push", serde_json::json!({"count": 1})).await.unwrap();

    let logs = s.recent_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, "push");
    assert_eq!(logs[1].action, "provision");
    assert!(logs[1].details.contains("sections"));
  }
}
