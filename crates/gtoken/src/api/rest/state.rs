//! Application state for API handlers

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cancellation shared with the refresher
    pub cancel: CancellationToken,

    /// Flips to `true` once the refresher has returned
    pub finished: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(cancel: CancellationToken, finished: watch::Receiver<bool>) -> Self {
        Self { cancel, finished }
    }
}
