//! Sections and students as the central store represents them.

use serde::{Deserialize, Serialize};

/// A class section. Central key is an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
  pub id:                String,
  pub name:              String,
  pub educational_level: Option<String>,
  pub specialization:    Option<String>,
}

/// A student enrolled in exactly one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id:          String,
  pub first_name:  String,
  pub last_name:   String,
  pub section_id:  String,
  /// Ordinal used for display and seating.
  pub class_order: Option<i64>,
}
