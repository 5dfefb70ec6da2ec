//! `natswatch serve`: run the HTTP console.

use natswatch_config::Settings;
use natswatch_server::AppState;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::ServeArgs;
use crate::config;
use crate::error::CliError;

pub async fn handle(args: ServeArgs, settings: &Settings) -> Result<(), CliError> {
    let listen = args.listen.unwrap_or_else(|| settings.listen.clone());
    let listener = TcpListener::bind(&listen).await?;

    let registry = config::registry(settings);
    match registry.catalog().default_cluster() {
        Ok(cluster) => info!(cluster = %cluster.id, url = %cluster.url, "default cluster"),
        Err(e) => tracing::warn!(error = %e, "no default cluster; requests must name one"),
    }

    let state = AppState::new(registry, settings.bridge_config(), settings.range_idle());
    natswatch_server::serve(listener, state, natswatch_server::shutdown_signal()).await?;
    Ok(())
}
