//! Translation between central and replica representations.
//!
//! The central store keys students and sections with strings and names
//! columns in camelCase; the replica keys students with integers and keeps
//! the snake_case student columns of the deployable bundle. Every crossing of
//! that boundary goes through one of the functions below, one per entity.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  Error, Result,
  attendance::{AttendanceInput, AttendanceRecord},
  roster::{Section, Student},
  teacher::Teacher,
};

// ─── Replica row types ───────────────────────────────────────────────────────

/// Row of the replica `User` table. The password is never copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaUser {
  pub id:                 String,
  pub username:           String,
  pub password:           String,
  pub full_name:          String,
  pub central_server_url: String,
}

/// Row of the replica `Sections` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSection {
  pub id:                String,
  pub name:              String,
  pub educational_level: Option<String>,
}

/// Row of the replica `Students` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStudent {
  pub id:          i64,
  pub first_name:  String,
  pub last_name:   String,
  pub section_id:  String,
  pub class_order: Option<i64>,
}

/// Row of the replica `Attendances` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaAttendance {
  /// `None` until the row has been stored.
  pub id:               Option<i64>,
  pub student_id:       i64,
  pub section_id:       String,
  pub date:             NaiveDate,
  pub is_present:       bool,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
  pub synced_to_server: bool,
}

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Map a central student key to the replica's integer key.
///
/// Only canonical decimal strings are accepted, so that formatting the
/// integer back yields the original central key.
pub fn replica_student_key(central_id: &str) -> Result<i64> {
  central_id
    .parse::<i64>()
    .ok()
    .filter(|n| n.to_string() == central_id)
    .ok_or_else(|| Error::UnrepresentableKey {
      entity: "student",
      key:    central_id.to_owned(),
    })
}

/// Map a replica student key back to the central string key.
pub fn central_student_key(replica_id: i64) -> String { replica_id.to_string() }

// ─── Central → replica ───────────────────────────────────────────────────────

pub fn user_to_replica(teacher: &Teacher, central_server_url: &str) -> ReplicaUser {
  ReplicaUser {
    id:                 teacher.id.clone(),
    username:           teacher.username.clone(),
    password:           String::new(),
    full_name:          teacher.full_name.clone(),
    central_server_url: central_server_url.to_owned(),
  }
}

/// Specialization has no replica column and is dropped.
pub fn section_to_replica(section: &Section) -> ReplicaSection {
  ReplicaSection {
    id:                section.id.clone(),
    name:              section.name.clone(),
    educational_level: section.educational_level.clone(),
  }
}

pub fn student_to_replica(student: &Student) -> Result<ReplicaStudent> {
  Ok(ReplicaStudent {
    id:          replica_student_key(&student.id)?,
    first_name:  student.first_name.clone(),
    last_name:   student.last_name.clone(),
    section_id:  student.section_id.clone(),
    class_order: student.class_order,
  })
}

/// A central row pulled into a replica is by definition already synced.
pub fn attendance_to_replica(record: &AttendanceRecord) -> Result<ReplicaAttendance> {
  Ok(ReplicaAttendance {
    id:               None,
    student_id:       replica_student_key(&record.student_id)?,
    section_id:       record.section_id.clone(),
    date:             record.date,
    is_present:       record.is_present,
    created_at:       record.created_at,
    updated_at:       record.updated_at,
    synced_to_server: true,
  })
}

// ─── Replica → central ───────────────────────────────────────────────────────

pub fn attendance_from_replica(row: &ReplicaAttendance) -> AttendanceInput {
  AttendanceInput {
    student_id: central_student_key(row.student_id),
    section_id: row.section_id.clone(),
    date:       row.date,
    is_present: row.is_present,
  }
}
