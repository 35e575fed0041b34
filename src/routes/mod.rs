//! API routes

pub mod assets;
pub mod health;
pub mod runs;
pub mod session;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Multipart framing on top of the file itself
const FORM_OVERHEAD: usize = 64 * 1024;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config().limits.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD);

    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1/session", session::router())
        .nest("/api/v1/assets", assets::router())
        .nest("/api/v1/runs", runs::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
