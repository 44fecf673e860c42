use askama::Template;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorMessage;
use crate::extractors::MaybeUser;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub site_name: String,
    pub logged_in: bool,
    pub login: String,
    pub user_id: i64,
    pub is_manager: bool,
}

/// Short result page: a few paragraphs and an optional link onwards.
#[derive(Template)]
#[template(path = "pages/notice.html")]
pub struct NoticeTemplate {
    pub site_name: String,
    pub paragraphs: Vec<String>,
    pub link_href: String,
    pub link_text: String,
}

impl NoticeTemplate {
    pub fn new(state: &AppState, paragraphs: &[&str]) -> Self {
        Self {
            site_name: state.config.site.name.clone(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
            link_href: String::new(),
            link_text: String::new(),
        }
    }

    pub fn link(mut self, href: impl Into<String>, text: impl Into<String>) -> Self {
        self.link_href = href.into();
        self.link_text = text.into();
        self
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Html<HomeTemplate> {
    let site_name = state.config.site.name.clone();
    let template = match user {
        Some(user) => HomeTemplate {
            site_name,
            logged_in: true,
            is_manager: user.is_manager(),
            login: user.login,
            user_id: user.id,
        },
        None => HomeTemplate {
            site_name,
            logged_in: false,
            login: String::new(),
            user_id: 0,
            is_manager: false,
        },
    };

    Html(template)
}

/// Render client errors as a page inside the site layout.
pub async fn error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(ErrorMessage(message)) = response.extensions().get::<ErrorMessage>().cloned() else {
        return response;
    };

    let status = response.status();
    let page = NoticeTemplate::new(&state, &[message.as_str()]);
    let page = if status == StatusCode::UNAUTHORIZED {
        page.link("/login", "Login")
    } else {
        page.link("/", "Back to the home page")
    };
    (status, Html(page)).into_response()
}
