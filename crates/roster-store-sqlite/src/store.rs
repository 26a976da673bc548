//! [`SqliteStore`], the SQLite implementation of [`CentralStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use roster_core::{
  attendance::{AttendanceInput, AttendanceRecord, AttendanceView, SectionRef, StudentRef},
  roster::{Section, Student},
  store::{AttendanceScope, CentralStore},
  teacher::{Role, Teacher},
};

use crate::{
  encode::{
    encode_date, encode_dt, encode_role, RawAttendance, RawAttendanceView, RawUser,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The central roster store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Input for [`SqliteStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub id:            String,
  pub username:      String,
  /// argon2 PHC string.
  pub password_hash: String,
  pub full_name:     String,
  pub role:          Role,
}

const ATTENDANCE_COLUMNS: &str =
  "id, studentId, sectionId, date, isPresent, createdAt, updatedAt";

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
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

  /// Load a user row by `column = key` together with its assigned sections.
  async fn load_teacher(&self, column: &'static str, key: String) -> Result<Option<Teacher>> {
    let loaded: Option<(RawUser, Vec<Section>)> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT id, username, password, fullName, role FROM Users WHERE {column} = ?1"
            ),
            rusqlite::params![key],
            |row| {
              Ok(RawUser {
                id:            row.get(0)?,
                username:      row.get(1)?,
                password_hash: row.get(2)?,
                full_name:     row.get(3)?,
                role:          row.get(4)?,
              })
            },
          )
          .optional()?;

        let Some(raw) = raw else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT s.id, s.name, s.educationalLevel, s.specialization
           FROM TeacherSections ts
           JOIN Sections s ON s.id = ts.sectionId
           WHERE ts.teacherId = ?1
           ORDER BY ts.rowid",
        )?;
        let sections = stmt
          .query_map(rusqlite::params![raw.id], section_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((raw, sections)))
      })
      .await?;

    loaded
      .map(|(raw, sections)| raw.into_teacher(sections))
      .transpose()
  }

  // ── Collaborator surface (seeding) ────────────────────────────────────────

  /// Number of user accounts of any role.
  pub async fn count_users(&self) -> Result<i64> {
    let n = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM Users", [], |r| r.get(0))?))
      .await?;
    Ok(n)
  }

  /// Create a user account with no assigned sections.
  pub async fn create_user(&self, user: NewUser) -> Result<Teacher> {
    let teacher = Teacher {
      id:            user.id,
      username:      user.username,
      password_hash: user.password_hash,
      full_name:     user.full_name,
      role:          user.role,
      sections:      vec![],
    };

    let id        = teacher.id.clone();
    let username  = teacher.username.clone();
    let password  = teacher.password_hash.clone();
    let full_name = teacher.full_name.clone();
    let role      = encode_role(teacher.role);
    let at        = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO Users (id, username, password, fullName, role, createdAt)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, username, password, full_name, role, at],
        )?;
        Ok(())
      })
      .await?;

    Ok(teacher)
  }

  pub async fn create_section(&self, section: Section) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO Sections (id, name, educationalLevel, specialization)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            section.id,
            section.name,
            section.educational_level,
            section.specialization,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn create_student(&self, student: Student) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO Students (id, first_name, last_name, section_id, class_order)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            student.id,
            student.first_name,
            student.last_name,
            student.section_id,
            student.class_order,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Replace the teacher's assigned sections with `section_ids`.
  pub async fn assign_sections(&self, teacher_id: &str, section_ids: &[String]) -> Result<()> {
    let teacher_id  = teacher_id.to_owned();
    let section_ids = section_ids.to_vec();

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM Users WHERE id = ?1",
            rusqlite::params![teacher_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(Err(teacher_id));
        }

        tx.execute(
          "DELETE FROM TeacherSections WHERE teacherId = ?1",
          rusqlite::params![teacher_id],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO TeacherSections (teacherId, sectionId) VALUES (?1, ?2)",
          )?;
          for section_id in &section_ids {
            stmt.execute(rusqlite::params![teacher_id, section_id])?;
          }
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    found.map_err(Error::TeacherNotFound)
  }

  /// The central record for `(student_id, date)`, if any.
  #[cfg(test)]
  pub(crate) async fn get_attendance(
    &self,
    student_id: &str,
    date: chrono::NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let student_id = student_id.to_owned();
    let date_str   = encode_date(date);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {ATTENDANCE_COLUMNS} FROM Attendances WHERE studentId = ?1 AND date = ?2"
            ),
            rusqlite::params![student_id, date_str],
            attendance_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  /// Total number of central attendance rows, reported at startup.
  pub async fn count_attendance(&self) -> Result<i64> {
    let n = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM Attendances", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n)
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn section_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Section> {
  Ok(Section {
    id:                row.get(0)?,
    name:              row.get(1)?,
    educational_level: row.get(2)?,
    specialization:    row.get(3)?,
  })
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
  })
}

/// `?1, ?2, …, ?n` for an `IN (…)` clause.
fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

// ─── CentralStore impl ───────────────────────────────────────────────────────

impl CentralStore for SqliteStore {
  type Error = Error;

  // ── Identity ──────────────────────────────────────────────────────────────

  async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>> {
    self.load_teacher("id", id.to_owned()).await
  }

  async fn find_teacher_by_username(&self, username: &str) -> Result<Option<Teacher>> {
    self.load_teacher("username", username.to_owned()).await
  }

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn sections_by_ids(&self, ids: &[String]) -> Result<Vec<Section>> {
    if ids.is_empty() {
      return Ok(vec![]);
    }
    let ids = ids.to_vec();

    let sections = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT id, name, educationalLevel, specialization
           FROM Sections WHERE id IN ({})
           ORDER BY id",
          placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), section_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(sections)
  }

  async fn students_in_sections(&self, section_ids: &[String]) -> Result<Vec<Student>> {
    if section_ids.is_empty() {
      return Ok(vec![]);
    }
    let ids = section_ids.to_vec();

    let students = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT id, first_name, last_name, section_id, class_order
           FROM Students WHERE section_id IN ({})
           ORDER BY section_id, class_order, id",
          placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(Student {
              id:          row.get(0)?,
              first_name:  row.get(1)?,
              last_name:   row.get(2)?,
              section_id:  row.get(3)?,
              class_order: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(students)
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn upsert_attendance(&self, input: AttendanceInput) -> Result<AttendanceRecord> {
    input.validate()?;

    let date_str = encode_date(input.date);
    let at_str   = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO Attendances (studentId, sectionId, date, isPresent, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (studentId, date) DO UPDATE SET
               sectionId = excluded.sectionId,
               isPresent = excluded.isPresent,
               updatedAt = excluded.updatedAt
             RETURNING {ATTENDANCE_COLUMNS}"
          ),
          rusqlite::params![
            input.student_id,
            input.section_id,
            date_str,
            input.is_present,
            at_str,
          ],
          attendance_from_row,
        )?)
      })
      .await?;

    raw.into_record()
  }

  async fn list_attendance(&self, scope: AttendanceScope) -> Result<Vec<AttendanceView>> {
    let section_ids = match scope {
      AttendanceScope::All => None,
      AttendanceScope::Sections(ids) if ids.is_empty() => return Ok(vec![]),
      AttendanceScope::Sections(ids) => Some(ids),
    };

    let raws: Vec<RawAttendanceView> = self
      .conn
      .call(move |conn| {
        let where_clause = match &section_ids {
          Some(ids) => format!("WHERE a.sectionId IN ({})", placeholders(ids.len())),
          None => String::new(),
        };

        let sql = format!(
          "SELECT
             a.id, a.studentId, a.sectionId, a.date, a.isPresent, a.createdAt, a.updatedAt,
             st.id, st.first_name, st.last_name, st.section_id,
             se.id, se.name, se.educationalLevel, se.specialization
           FROM Attendances a
           JOIN Students st ON st.id = a.studentId
           JOIN Sections se ON se.id = a.sectionId
           {where_clause}
           ORDER BY a.date, a.sectionId, a.studentId"
        );

        let params = section_ids.unwrap_or_default();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(RawAttendanceView {
              attendance: attendance_from_row(row)?,
              student:    StudentRef {
                id:         row.get(7)?,
                first_name: row.get(8)?,
                last_name:  row.get(9)?,
                section_id: row.get(10)?,
              },
              section:    SectionRef {
                id:                row.get(11)?,
                name:              row.get(12)?,
                educational_level: row.get(13)?,
                specialization:    row.get(14)?,
              },
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendanceView::into_view).collect()
  }
}
