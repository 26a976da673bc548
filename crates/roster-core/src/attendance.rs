//! Attendance records.
//!
//! At most one record exists per `(student_id, date)` pair, in the central
//! store and in every replica. Writes that hit an existing pair overwrite it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

// ─── Input ───────────────────────────────────────────────────────────────────

/// One attendance observation as pushed by a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceInput {
  /// Replica clients send integer keys; central clients send strings.
  #[serde(deserialize_with = "string_or_integer")]
  pub student_id: String,
  pub section_id: String,
  pub date:       NaiveDate,
  pub is_present: bool,
}

impl AttendanceInput {
  pub fn validate(&self) -> Result<()> {
    if self.student_id.trim().is_empty() {
      return Err(Error::Validation("studentId must not be empty".into()));
    }
    if self.section_id.trim().is_empty() {
      return Err(Error::Validation("sectionId must not be empty".into()));
    }
    Ok(())
  }
}

fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Key {
    Text(String),
    Integer(i64),
  }

  Ok(match Key::deserialize(deserializer)? {
    Key::Text(s) => s,
    Key::Integer(n) => n.to_string(),
  })
}

// ─── Stored ──────────────────────────────────────────────────────────────────

/// A row of the central attendance table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
  pub id:         i64,
  pub student_id: String,
  pub section_id: String,
  pub date:       NaiveDate,
  pub is_present: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Identifying student attributes nested in pulled attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
  pub id:         String,
  pub first_name: String,
  pub last_name:  String,
  pub section_id: String,
}

/// Identifying section attributes nested in pulled attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
  pub id:                String,
  pub name:              String,
  pub educational_level: Option<String>,
  pub specialization:    Option<String>,
}

/// An attendance row joined with its student and section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceView {
  #[serde(flatten)]
  pub record:  AttendanceRecord,
  pub student: StudentRef,
  pub section: SectionRef,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_integer_student_key() {
    let input: AttendanceInput = serde_json::from_str(
      r#"{"studentId":42,"sectionId":"A","date":"2024-01-10","isPresent":true}"#,
    )
    .unwrap();
    assert_eq!(input.student_id, "42");
    assert_eq!(input.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
  }

  #[test]
  fn accepts_string_student_key() {
    let input: AttendanceInput = serde_json::from_str(
      r#"{"studentId":"S1","sectionId":"A","date":"2024-01-10","isPresent":false}"#,
    )
    .unwrap();
    assert_eq!(input.student_id, "S1");
    assert!(!input.is_present);
  }

  #[test]
  fn rejects_malformed_date() {
    let parsed = serde_json::from_str::<AttendanceInput>(
      r#"{"studentId":"S1","sectionId":"A","date":"10/01/2024","isPresent":true}"#,
    );
    assert!(parsed.is_err());
  }

  #[test]
  fn blank_keys_fail_validation() {
    let input = AttendanceInput {
      student_id: "  ".into(),
      section_id: "A".into(),
      date:       NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
      is_present: true,
    };
    assert!(matches!(input.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn view_flattens_record_fields() {
    let at = DateTime::parse_from_rfc3339("2024-01-10T08:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let view = AttendanceView {
      record:  AttendanceRecord {
        id:         1,
        student_id: "S1".into(),
        section_id: "A".into(),
        date:       NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        is_present: true,
        created_at: at,
        updated_at: at,
      },
      student: StudentRef {
        id:         "S1".into(),
        first_name: "Amina".into(),
        last_name:  "Haddad".into(),
        section_id: "A".into(),
      },
      section: SectionRef {
        id:                "A".into(),
        name:              "1AS-1".into(),
        educational_level: Some("secondary".into()),
        specialization:    None,
      },
    };
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["studentId"], "S1");
    assert_eq!(json["isPresent"], true);
    assert_eq!(json["student"]["firstName"], "Amina");
    assert_eq!(json["section"]["educationalLevel"], "secondary");
  }
}
