//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::error::{GtokenError, GtokenResult};
use crate::refresher::Refresher;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Control server running alongside one refresher
pub struct Server {
    listen_addr: SocketAddr,
    refresher: Refresher,
}

impl Server {
    /// Create a new server with the given listen address
    pub fn new(listen_addr: SocketAddr, refresher: Refresher) -> Self {
        Self {
            listen_addr,
            refresher,
        }
    }

    /// Bind the listen address and run until the refresher stops
    pub async fn run(self, cancel: CancellationToken) -> GtokenResult<()> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        self.serve(listener, cancel).await
    }

    /// Run the refresher and the control API on an already bound listener.
    ///
    /// The control API shuts down once the refresher has returned, so a
    /// one-shot run ends on its own. The refresher's outcome is returned.
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> GtokenResult<()> {
        let addr = listener.local_addr()?;
        let (finished_tx, finished_rx) = watch::channel(false);

        let app = create_router(AppState::new(cancel.clone(), finished_rx.clone()));

        tracing::info!("gtoken control server listening on {}", addr);

        let mut shutdown_rx = finished_rx;
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|done| *done).await;
                })
                .await
        });

        let result = self.refresher.run(&cancel).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Token refresher failed");
        }

        finished_tx.send_replace(true);
        cancel.cancel();

        let served = match server.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GtokenError::Server(e.to_string())),
            Err(e) => Err(GtokenError::Server(e.to_string())),
        };

        tracing::info!("gtoken control server stopped");

        result.and(served)
    }
}
