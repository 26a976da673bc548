pub mod replica;
pub mod sync;

use roster_core::guard::{Caller, is_authorized};

use crate::error::ApiError;

/// Reject the request unless `caller` may act on `target_teacher_id`.
pub(super) fn authorize(caller: &Caller, target_teacher_id: &str) -> Result<(), ApiError> {
  if is_authorized(caller, target_teacher_id) {
    return Ok(());
  }
  tracing::warn!(caller = %caller.id, target = %target_teacher_id, "forbidden");
  Err(ApiError::Forbidden)
}
