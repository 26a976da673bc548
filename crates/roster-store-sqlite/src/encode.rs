//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, booleans
//! are `0`/`1` integers, and roles are their lowercase names.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use roster_core::{
  attendance::{AttendanceRecord, AttendanceView, SectionRef, StudentRef},
  roster::Section,
  teacher::{Role, Teacher},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> String { r.to_string() }

pub fn decode_role(s: &str) -> Result<Role> {
  Role::from_str(s).map_err(|_| roster_core::Error::UnknownRole(s.to_owned()).into())
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `Users` row before decoding. Sections are attached separately.
pub struct RawUser {
  pub id:            String,
  pub username:      String,
  pub password_hash: String,
  pub full_name:     String,
  pub role:          String,
}

impl RawUser {
  pub fn into_teacher(self, sections: Vec<Section>) -> Result<Teacher> {
    Ok(Teacher {
      id: self.id,
      username: self.username,
      password_hash: self.password_hash,
      full_name: self.full_name,
      role: decode_role(&self.role)?,
      sections,
    })
  }
}

pub struct RawAttendance {
  pub id:         i64,
  pub student_id: String,
  pub section_id: String,
  pub date:       String,
  pub is_present: bool,
  pub created_at: String,
  pub updated_at: String,
}

impl RawAttendance {
  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      id:         self.id,
      student_id: self.student_id,
      section_id: self.section_id,
      date:       decode_date(&self.date)?,
      is_present: self.is_present,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// An attendance row joined with its student and section, before decoding.
pub struct RawAttendanceView {
  pub attendance: RawAttendance,
  pub student:    StudentRef,
  pub section:    SectionRef,
}

impl RawAttendanceView {
  pub fn into_view(self) -> Result<AttendanceView> {
    Ok(AttendanceView {
      record:  self.attendance.into_record()?,
      student: self.student,
      section: self.section,
    })
  }
}
