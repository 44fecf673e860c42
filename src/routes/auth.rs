use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::auth::{password, session};
use crate::db::users;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::forms::{LoginForm, ResetForm};
use crate::mail::Template as Mail;
use crate::routes::home::{Html, NoticeTemplate};
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub site_name: String,
    pub login: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "pages/reset.html")]
pub struct ResetTemplate {
    pub site_name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/password/reset", get(reset_page).post(reset_password))
}

/// GET /login — render login form
async fn login_page(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    Html(LoginTemplate {
        site_name: state.config.site.name.clone(),
        login: String::new(),
        error: String::new(),
    })
    .into_response()
}

/// POST /login — check credentials and open a session
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let user = {
        let conn = state.db.get()?;
        users::find_by_login(&conn, form.login.trim())?
    };

    let user = match user {
        Some(user) if password::verify_password(&form.password, &user.password) => user,
        _ => {
            tracing::info!(login = %form.login, "failed login");
            return Ok((
                StatusCode::UNAUTHORIZED,
                Html(LoginTemplate {
                    site_name: state.config.site.name.clone(),
                    login: form.login,
                    error: "Invalid login or password".into(),
                }),
            )
                .into_response());
        }
    };

    let auth = &state.config.auth;
    let token = session::create_session(&state.db, user.id, auth.session_hours)?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (
                header::SET_COOKIE,
                session::session_cookie(&auth.cookie_name, &token, auth.session_hours),
            ),
        ],
    )
        .into_response())
}

/// POST /logout — delete session and redirect
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::cookie_value(&headers, cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("failed to delete session: {}", e);
        }
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, session::clear_session_cookie(cookie_name)),
        ],
    )
        .into_response()
}

/// GET /password/reset — ask for a login or an e-mail address
async fn reset_page(State(state): State<AppState>) -> Html<ResetTemplate> {
    Html(ResetTemplate {
        site_name: state.config.site.name.clone(),
    })
}

/// POST /password/reset — replace the password and mail the new one
async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetForm>,
) -> AppResult<Response> {
    let key = form.key()?;

    let conn = state.db.get()?;
    let Some(user) = users::find_for_reset(&conn, key)? else {
        let notice = NoticeTemplate::new(
            &state,
            &["That login or e-mail address is not valid."],
        )
        .link("/password/reset", "Enter the one you want to reset again");
        return Ok((StatusCode::BAD_REQUEST, Html(notice)).into_response());
    };

    let plain = password::generate_password();
    let hash = password::hash_password(&plain, state.config.auth.bcrypt_cost)?;
    users::set_password(&conn, user.id, &hash)?;
    tracing::info!(user_id = user.id, "password reset");

    state.mail.send(
        Mail::PasswordReset {
            login: user.login,
            password: plain,
        },
        &user.email,
    );

    let notice = NoticeTemplate::new(
        &state,
        &["Your new password has been mailed to the address of your account."],
    )
    .link("/login", "Login");
    Ok(Html(notice).into_response())
}
