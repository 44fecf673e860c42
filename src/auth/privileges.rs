use crate::error::{AppError, AppResult};

/// Flags granted by the group an account belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privileges {
    pub manage_users: bool,
}

/// An actor may act on an account when they manage users, or when the
/// account is their own real (positive id) account.
pub fn may_act_on(actor_id: i64, privileges: Privileges, target_id: i64) -> bool {
    privileges.manage_users || (actor_id == target_id && actor_id >= 1)
}

pub fn require_act_on(actor_id: i64, privileges: Privileges, target_id: i64) -> AppResult<()> {
    if may_act_on(actor_id, privileges, target_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn require_manage_users(privileges: Privileges) -> AppResult<()> {
    if privileges.manage_users {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
