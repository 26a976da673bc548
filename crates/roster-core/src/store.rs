//! The `CentralStore` trait: the subsystem's view of the central database.
//!
//! Implemented by storage backends (e.g. `roster-store-sqlite`). The HTTP
//! layer and the provisioner depend on this abstraction only.

use std::future::Future;

use crate::{
  attendance::{AttendanceInput, AttendanceRecord, AttendanceView},
  roster::{Section, Student},
  teacher::Teacher,
};

/// Which attendance rows [`CentralStore::list_attendance`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceScope {
  /// Every row in the central store.
  All,
  /// Only rows whose section is one of these ids.
  Sections(Vec<String>),
}

/// Abstraction over the central store.
///
/// All methods return `Send` futures so implementations can be shared across
/// a multi-threaded runtime behind axum.
pub trait CentralStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identity ──────────────────────────────────────────────────────────

  /// Look up a teacher by id, including assigned sections.
  fn get_teacher<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Teacher>, Self::Error>> + Send + 'a;

  /// Look up a teacher by login name, including assigned sections.
  fn find_teacher_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Teacher>, Self::Error>> + Send + 'a;

  // ── Roster ────────────────────────────────────────────────────────────

  /// Sections whose id is in `ids`. Unknown ids are skipped.
  fn sections_by_ids<'a>(
    &'a self,
    ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<Section>, Self::Error>> + Send + 'a;

  /// Students whose section id is in `section_ids`, ordered by section then
  /// class order.
  fn students_in_sections<'a>(
    &'a self,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + 'a;

  // ── Attendance ────────────────────────────────────────────────────────

  /// Insert or overwrite the record for `(student_id, date)`.
  ///
  /// On conflict `is_present`, `section_id`, and `updated_at` are replaced;
  /// `created_at` and the row id are preserved.
  fn upsert_attendance(
    &self,
    input: AttendanceInput,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  /// Attendance rows joined with their student and section.
  fn list_attendance(
    &self,
    scope: AttendanceScope,
  ) -> impl Future<Output = Result<Vec<AttendanceView>, Self::Error>> + Send + '_;
}
