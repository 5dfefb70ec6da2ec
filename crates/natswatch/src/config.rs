//! Settings and registry wiring for commands.

use std::sync::Arc;

use natswatch_config::{FileCatalog, ResolvedCredentials, Settings};
use natswatch_core::{ClusterCatalog, ConnectionRegistry, NatsBroker};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub type Registry = Arc<ConnectionRegistry<NatsBroker>>;

/// Load settings from `--config` (or the platform default) plus env.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(natswatch_config::config_path);
    tracing::debug!(path = %path.display(), "loading settings");
    Ok(natswatch_config::load_settings_from(&path)?)
}

pub fn catalog(settings: &Settings) -> FileCatalog {
    FileCatalog::from_settings(settings)
}

/// Registry over the real broker, backed by the file catalog.
pub fn registry(settings: &Settings) -> Registry {
    Arc::new(ConnectionRegistry::new(
        NatsBroker,
        Arc::new(catalog(settings)),
        Arc::new(ResolvedCredentials),
        settings.transport_config(),
    ))
}

/// The cluster a command targets: `--cluster` when given, else the default.
pub fn target_cluster(catalog: &dyn ClusterCatalog, global: &GlobalOpts) -> Result<String, CliError> {
    Ok(catalog.resolve(global.cluster.as_deref())?.id)
}
