//! Account management: registration, profile edit, password change and
//! deletion. Every handler acting on `/users/{id}` lets members act on their
//! own account only; user managers may act on any account.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use rusqlite::Connection;

use crate::auth::password;
use crate::auth::privileges;
use crate::auth::session;
use crate::db::models::{User, UserListing, DEFAULT_GROUP_ID};
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::{looks_like_email, PasswordForm, ProfileForm, RegistrationForm};
use crate::mail::Template as Mail;
use crate::routes::home::{Html, NoticeTemplate};
use crate::state::AppState;

const LOGIN_TAKEN: &str = "That login is used by someone else. Please choose another one...";

// --- View structs ---

pub struct GroupOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "users/list.html")]
pub struct UserListTemplate {
    pub site_name: String,
    pub users: Vec<UserListing>,
}

#[derive(Template)]
#[template(path = "users/new.html")]
pub struct NewUserTemplate {
    pub site_name: String,
    pub login: String,
    pub name: String,
    pub email: String,
}

#[derive(Template)]
#[template(path = "users/edit.html")]
pub struct EditUserTemplate {
    pub site_name: String,
    pub id: i64,
    pub login: String,
    pub name: String,
    pub email: String,
    pub flash: String,
    pub show_groups: bool,
    pub groups: Vec<GroupOption>,
    pub show_delete: bool,
    pub back_href: String,
}

#[derive(Template)]
#[template(path = "users/password.html")]
pub struct ChangePasswordTemplate {
    pub site_name: String,
    pub id: i64,
    pub login: String,
    pub ask_old_password: bool,
}

#[derive(Template)]
#[template(path = "users/remove.html")]
pub struct RemoveUserTemplate {
    pub site_name: String,
    pub id: i64,
    pub login: String,
    pub cancel_href: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(insert_user))
        .route("/users/new", get(create_user_form))
        .route("/users/{id}", get(edit_user).post(update_user))
        .route(
            "/users/{id}/password",
            get(change_password_form).post(update_password),
        )
        .route("/users/{id}/remove", get(remove_user))
        .route("/users/{id}/delete", post(delete_user))
}

// --- Helpers ---

/// Check the actor may touch account `id`, then load it.
fn load_target(conn: &Connection, actor: &CurrentUser, id: i64) -> AppResult<User> {
    actor.authorize(id)?;
    users::find_by_id(conn, id)?.ok_or(AppError::NotFound)
}

/// Where "back" leads: the home page for one's own account, the user list
/// for someone else's.
fn back_href(actor: &CurrentUser, id: i64) -> &'static str {
    if actor.id == id {
        "/"
    } else {
        "/users"
    }
}

fn render_edit(
    state: &AppState,
    conn: &Connection,
    actor: &CurrentUser,
    user: User,
    flash: &str,
) -> AppResult<Html<EditUserTemplate>> {
    let groups = if actor.is_manager() {
        users::assignable_groups(conn)?
            .into_iter()
            .map(|g| GroupOption {
                selected: g.id == user.groupid,
                id: g.id,
                name: g.name,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(Html(EditUserTemplate {
        site_name: state.config.site.name.clone(),
        back_href: back_href(actor, user.id).to_string(),
        id: user.id,
        login: user.login,
        name: user.name,
        email: user.email,
        flash: flash.to_string(),
        show_groups: actor.is_manager(),
        groups,
        show_delete: !actor.is_manager(),
    }))
}

// --- Handlers ---

/// GET /users — every account, for user managers
async fn list_users(
    State(state): State<AppState>,
    actor: CurrentUser,
) -> AppResult<Html<UserListTemplate>> {
    privileges::require_manage_users(actor.privileges)?;

    let users = {
        let conn = state.db.get()?;
        users::list(&conn)?
    };

    Ok(Html(UserListTemplate {
        site_name: state.config.site.name.clone(),
        users,
    }))
}

/// GET /users/new — registration form, optionally prefilled from the query
async fn create_user_form(
    State(state): State<AppState>,
    Query(prefill): Query<RegistrationForm>,
) -> Html<NewUserTemplate> {
    Html(NewUserTemplate {
        site_name: state.config.site.name.clone(),
        login: prefill.login,
        name: prefill.name,
        email: prefill.email,
    })
}

/// POST /users — register a new account and mail its generated password
async fn insert_user(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> AppResult<Response> {
    let registration = form.validate()?;

    if !looks_like_email(registration.email) {
        let retry = url::form_urlencoded::Serializer::new(String::from("/users/new?"))
            .append_pair("login", registration.login)
            .append_pair("name", registration.name)
            .finish();
        let notice = NoticeTemplate::new(
            &state,
            &[
                "You must provide a valid e-mail address.",
                "This address is never publicly visible, and is only used to recover your \
                 password and by the administrators to contact you if it ever becomes necessary.",
            ],
        )
        .link(retry, "Re-enter your e-mail address");
        return Ok((StatusCode::BAD_REQUEST, Html(notice)).into_response());
    }

    let plain = password::generate_password();
    let id = {
        let conn = state.db.get()?;
        if users::login_exists(&conn, registration.login)? {
            return Err(AppError::BadRequest(LOGIN_TAKEN.into()));
        }
        let hash = password::hash_password(&plain, state.config.auth.bcrypt_cost)?;
        users::insert(
            &conn,
            &NewUser {
                groupid: DEFAULT_GROUP_ID,
                login: registration.login,
                password_hash: &hash,
                name: registration.name,
                email: registration.email,
            },
        )
        .map_err(|e| {
            if users::is_unique_violation(&e) {
                AppError::BadRequest(LOGIN_TAKEN.into())
            } else {
                AppError::Database(e)
            }
        })?
    };
    tracing::info!(user_id = id, login = registration.login, "user registered");

    state.mail.send(
        Mail::NewUser {
            login: registration.login.to_string(),
            password: plain,
        },
        registration.email,
    );
    state.mail.send(
        Mail::NewUserNotice {
            login: registration.login.to_string(),
            name: registration.name.to_string(),
            email: registration.email.to_string(),
        },
        state.mail.webmaster(),
    );

    let notice = NoticeTemplate::new(
        &state,
        &["You are now registered and your password has been mailed to the address you provided."],
    )
    .link("/login", "Login");
    Ok((StatusCode::CREATED, Html(notice)).into_response())
}

/// GET /users/{id} — profile form
async fn edit_user(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<EditUserTemplate>> {
    let conn = state.db.get()?;
    let user = load_target(&conn, &actor, id)?;
    render_edit(&state, &conn, &actor, user, "")
}

/// POST /users/{id} — save the profile, then show the form again
async fn update_user(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ProfileForm>,
) -> AppResult<Html<EditUserTemplate>> {
    let mut conn = state.db.get()?;
    load_target(&conn, &actor, id)?;

    let profile = form.validate()?;
    let groupid = match form.groupid {
        Some(groupid) if actor.is_manager() => {
            if !users::is_assignable_group(&conn, groupid)? {
                return Err(AppError::BadRequest("Unknown group.".into()));
            }
            Some(groupid)
        }
        _ => None,
    };

    users::update_profile(&mut conn, id, profile.name, profile.email, groupid)?;
    tracing::info!(user_id = id, actor_id = actor.id, "profile updated");

    let user = users::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    render_edit(&state, &conn, &actor, user, "Updated !")
}

/// GET /users/{id}/password — password form
async fn change_password_form(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<ChangePasswordTemplate>> {
    let user = {
        let conn = state.db.get()?;
        load_target(&conn, &actor, id)?
    };

    Ok(Html(ChangePasswordTemplate {
        site_name: state.config.site.name.clone(),
        id: user.id,
        login: user.login,
        ask_old_password: !actor.is_manager(),
    }))
}

/// POST /users/{id}/password — set a new password
async fn update_password(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<PasswordForm>,
) -> AppResult<Html<NoticeTemplate>> {
    let conn = state.db.get()?;
    let user = load_target(&conn, &actor, id)?;

    if !actor.is_manager() && !password::verify_password(&form.oldpass, &user.password) {
        return Err(AppError::BadRequest("Wrong password !".into()));
    }

    let new_password = form.new_password()?;
    let hash = password::hash_password(new_password, state.config.auth.bcrypt_cost)?;
    users::set_password(&conn, id, &hash)?;
    tracing::info!(user_id = id, actor_id = actor.id, "password changed");

    state
        .mail
        .send(Mail::PasswordChanged { login: user.login }, &user.email);

    Ok(Html(
        NoticeTemplate::new(&state, &["Updated !"]).link(format!("/users/{id}"), "back"),
    ))
}

/// GET /users/{id}/remove — ask for confirmation
async fn remove_user(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<RemoveUserTemplate>> {
    let user = {
        let conn = state.db.get()?;
        load_target(&conn, &actor, id)?
    };

    let cancel_href = if actor.id == id {
        format!("/users/{id}")
    } else {
        "/users".to_string()
    };

    Ok(Html(RemoveUserTemplate {
        site_name: state.config.site.name.clone(),
        id: user.id,
        login: user.login,
        cancel_href,
    }))
}

/// POST /users/{id}/delete — remove the account, handing its content to the
/// deleted-user sentinel
async fn delete_user(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    actor.authorize(id)?;

    let removed = {
        let mut conn = state.db.get()?;
        users::delete(&mut conn, id)?
    };
    if !removed {
        return Err(AppError::NotFound);
    }
    tracing::info!(user_id = id, actor_id = actor.id, "user deleted");

    let notice = NoticeTemplate::new(&state, &["Deleted !"]).link(back_href(&actor, id), "back");
    let page = Html(notice);

    if actor.id == id {
        // The session row went away with the account; drop the cookie too.
        let cookie = session::clear_session_cookie(&state.config.auth.cookie_name);
        return Ok(([(header::SET_COOKIE, cookie)], page).into_response());
    }

    Ok(page.into_response())
}
