use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rusqlite::{params, OptionalExtension};

use crate::auth::privileges::{self, Privileges};
use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
    pub name: String,
    pub privileges: Privileges,
}

impl CurrentUser {
    /// Fails with 403 unless this user may act on account `id`.
    pub fn authorize(&self, id: i64) -> AppResult<()> {
        privileges::require_act_on(self.id, self.privileges, id)
    }

    pub fn is_manager(&self) -> bool {
        self.privileges.manage_users
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        conn.query_row(
            "SELECT u.id, u.login, u.name, g.manage_users FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             JOIN groups g ON g.id = u.groupid \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    login: row.get(1)?,
                    name: row.get(2)?,
                    privileges: Privileges {
                        manage_users: row.get(3)?,
                    },
                })
            },
        )
        .optional()?
        .ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor — returns None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}
