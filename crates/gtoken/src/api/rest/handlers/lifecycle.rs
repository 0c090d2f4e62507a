//! Termination handler

use crate::api::rest::state::AppState;
use axum::{extract::State, http::StatusCode};

/// Stop the refresher and answer once it has returned.
///
/// The response only confirms that the refresher stopped; a refresher error
/// is reported by the process, not here.
pub async fn quit(State(state): State<AppState>) -> StatusCode {
    tracing::info!("Termination requested");
    state.cancel.cancel();

    let mut finished = state.finished.clone();
    if finished.wait_for(|done| *done).await.is_err() {
        tracing::debug!("Refresher completion channel closed");
    }

    tracing::info!("Refresher stopped, acknowledging termination");
    StatusCode::OK
}
