// Library exports for Homesite
// This allows integration tests and the binary to share one router

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod mail;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home::index))
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::legacy::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::home::error_pages,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
