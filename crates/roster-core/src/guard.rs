//! Authorization policy for every operation exposed to non-admin callers.

use serde::{Deserialize, Serialize};

use crate::teacher::Role;

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
  pub id:   String,
  pub role: Role,
}

impl Caller {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

/// An administrator may act on any teacher; a teacher only on themselves.
pub fn is_authorized(caller: &Caller, target_teacher_id: &str) -> bool {
  caller.is_admin() || caller.id == target_teacher_id
}

#[cfg(test)]
mod tests {
  use super::*;

  fn caller(id: &str, role: Role) -> Caller {
    Caller { id: id.into(), role }
  }

  #[test]
  fn admin_may_target_anyone() {
    assert!(is_authorized(&caller("u1", Role::Admin), "t9"));
  }

  #[test]
  fn teacher_may_target_self() {
    assert!(is_authorized(&caller("t1", Role::Teacher), "t1"));
  }

  #[test]
  fn teacher_may_not_target_other() {
    assert!(!is_authorized(&caller("t1", Role::Teacher), "t2"));
  }

  #[test]
  fn id_match_is_exact() {
    assert!(!is_authorized(&caller("t1", Role::Teacher), "t1 "));
    assert!(!is_authorized(&caller("t1", Role::Teacher), ""));
  }
}
