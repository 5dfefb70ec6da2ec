// natswatch-server: HTTP surface (SSE subscriptions + JSON actions) over natswatch-core

pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;

use natswatch_core::Broker;
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;

/// Serve until `shutdown` resolves, then close every pooled connection.
pub async fn serve<B: Broker>(
    listener: TcpListener,
    state: AppState<B>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let registry = std::sync::Arc::clone(&state.registry);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "natswatch listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("shutting down, closing broker connections");
    registry.close_all().await;
    Ok(())
}

/// Resolves on Ctrl-C (and SIGTERM on unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
