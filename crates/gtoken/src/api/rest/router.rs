//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

/// Path conventionally used by sidecar orchestration to stop a helper
pub const QUIT_PATH: &str = "/quitquitquit";

/// Create the control router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(QUIT_PATH, post(handlers::quit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
