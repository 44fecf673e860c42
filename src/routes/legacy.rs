//! Redirects for old `?action=` links, which still circulate in mailed
//! notifications and bookmarks.

use axum::extract::Query;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// One branch of the old `users.php` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateUser,
    InsertUser,
    ResetPassword,
    ChangePassword,
    UpdatePassword,
    EditUser,
    UpdateUser,
    RemoveUser,
    DeleteUser,
    ListUsers,
}

impl Action {
    /// Unknown or missing actions fall through to the user list.
    pub fn parse(action: Option<&str>) -> Self {
        match action.unwrap_or_default() {
            "createuser" => Self::CreateUser,
            "insertuser" => Self::InsertUser,
            "resetpwd" => Self::ResetPassword,
            "changepwd" => Self::ChangePassword,
            "updatepwd" => Self::UpdatePassword,
            "edituser" => Self::EditUser,
            "updateuser" => Self::UpdateUser,
            "removeuser" => Self::RemoveUser,
            "deleteuser" => Self::DeleteUser,
            _ => Self::ListUsers,
        }
    }

    /// Route serving this action. POST-only actions point at the form that
    /// submits them. `None` when the action needs an account id and none
    /// was given.
    pub fn location(self, id: Option<i64>) -> Option<String> {
        let location = match self {
            Self::CreateUser | Self::InsertUser => "/users/new".to_string(),
            Self::ResetPassword => "/password/reset".to_string(),
            Self::ChangePassword | Self::UpdatePassword => format!("/users/{}/password", id?),
            Self::EditUser | Self::UpdateUser => format!("/users/{}", id?),
            Self::RemoveUser | Self::DeleteUser => format!("/users/{}/remove", id?),
            Self::ListUsers => "/users".to_string(),
        };
        Some(location)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LegacyQuery {
    pub action: Option<String>,
    pub id: Option<String>,
}

impl LegacyQuery {
    fn id(&self) -> Option<i64> {
        self.id.as_deref().and_then(|id| id.trim().parse().ok())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users.php", get(users_page))
        .route("/index.php", get(index_page))
}

/// GET /users.php?action=..&id=..
async fn users_page(Query(query): Query<LegacyQuery>) -> AppResult<Redirect> {
    let action = Action::parse(query.action.as_deref());
    let location = action.location(query.id()).ok_or(AppError::NotFound)?;
    tracing::debug!(?action, %location, "legacy link redirected");
    Ok(Redirect::permanent(&location))
}

/// GET /index.php?action=showloginform|showresetform
async fn index_page(Query(query): Query<LegacyQuery>) -> Redirect {
    let location = match query.action.as_deref() {
        Some("showloginform") => "/login",
        Some("showresetform") => "/password/reset",
        _ => "/",
    };
    Redirect::permanent(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_actions() {
        assert_eq!(Action::parse(Some("edituser")), Action::EditUser);
        assert_eq!(Action::parse(Some("resetpwd")), Action::ResetPassword);
        assert_eq!(Action::parse(Some("deleteuser")), Action::DeleteUser);
    }

    #[test]
    fn unknown_action_lists_users() {
        assert_eq!(Action::parse(None), Action::ListUsers);
        assert_eq!(Action::parse(Some("bogus")), Action::ListUsers);
        assert_eq!(Action::parse(Some("")), Action::ListUsers);
    }

    #[test]
    fn post_only_actions_point_at_their_form() {
        assert_eq!(Action::InsertUser.location(None).unwrap(), "/users/new");
        assert_eq!(
            Action::UpdatePassword.location(Some(3)).unwrap(),
            "/users/3/password"
        );
        assert_eq!(
            Action::DeleteUser.location(Some(3)).unwrap(),
            "/users/3/remove"
        );
        assert_eq!(Action::UpdateUser.location(Some(3)).unwrap(), "/users/3");
    }

    #[test]
    fn id_actions_need_an_id() {
        assert!(Action::EditUser.location(None).is_none());
        assert_eq!(Action::ListUsers.location(None).unwrap(), "/users");
    }

    #[test]
    fn malformed_id_is_ignored() {
        let query = LegacyQuery {
            action: Some("edituser".into()),
            id: Some("12abc".into()),
        };
        assert_eq!(query.id(), None);

        let query = LegacyQuery {
            action: None,
            id: Some(" 12 ".into()),
        };
        assert_eq!(query.id(), Some(12));
    }
}
