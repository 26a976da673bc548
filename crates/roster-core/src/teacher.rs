//! Teachers, owned by the identity subsystem, read-only here.

use serde::{Deserialize, Serialize};

use crate::{guard::Caller, roster::Section};

/// Role of a central user account.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  Teacher,
}

/// A central user together with the sections assigned to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
  pub id:            String,
  pub username:      String,
  /// argon2 PHC string. Never serialised.
  #[serde(skip)]
  pub password_hash: String,
  pub full_name:     String,
  pub role:          Role,
  pub sections:      Vec<Section>,
}

impl Teacher {
  /// Ids of the assigned sections, in assignment order.
  pub fn section_ids(&self) -> Vec<String> {
    self.sections.iter().map(|s| s.id.clone()).collect()
  }

  /// The identity this account acts as when it calls the subsystem.
  pub fn caller(&self) -> Caller {
    Caller { id: self.id.clone(), role: self.role }
  }
}
