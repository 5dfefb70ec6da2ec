//! Cluster command handlers.

use natswatch_config::{ClusterDraft, PASSWORD_ENV, Settings};
use natswatch_core::{ClusterAuth, ClusterCatalog, ClusterConfig, ClusterStatus, Health, Monitor};
use tabled::Tabled;

use crate::cli::{ClusterAddArgs, ClustersArgs, ClustersCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Default")]
    default: String,
}

fn auth_label(auth: &ClusterAuth) -> String {
    match auth {
        ClusterAuth::Anonymous => "anonymous".into(),
        ClusterAuth::CredsFile { creds_file } => format!("creds {creds_file}"),
        ClusterAuth::UsernamePassword { username, .. } => format!("user {username}"),
    }
}

fn to_row(c: &ClusterConfig) -> ClusterRow {
    ClusterRow {
        id: c.id.clone(),
        name: c.name.clone(),
        url: c.url.clone(),
        auth: auth_label(&c.auth),
        default: if c.is_default { "*".into() } else { String::new() },
    }
}

pub async fn handle(
    args: ClustersArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let catalog = config::catalog(settings);

    match args.command {
        ClustersCommand::List => {
            let clusters: Vec<ClusterConfig> = catalog
                .clusters()?
                .iter()
                .map(ClusterConfig::redacted)
                .collect();
            let out = output::render_list(&global.output, &clusters, to_row, |c| c.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ClustersCommand::Add(add) => {
            let cluster = add_cluster(&catalog, add)?;
            if !global.quiet {
                eprintln!("Cluster '{}' added with id {}", cluster.name, cluster.id);
            }
            Ok(())
        }

        ClustersCommand::Remove { id } => {
            let store = catalog.store()?;
            let cluster = store.get(&id)?;
            if !util::confirm(
                &format!("Remove cluster '{}' ({id})?", cluster.name),
                global.yes,
                "clusters remove",
            )? {
                return Ok(());
            }
            store.remove(&id)?;
            natswatch_config::forget_password(&id)?;
            if !global.quiet {
                eprintln!("Cluster removed");
            }
            Ok(())
        }

        ClustersCommand::Import { file } => {
            let drafts: Vec<ClusterDraft> = util::read_json_file(&file)?;
            let merged = catalog.store()?.import(drafts)?;
            if !global.quiet {
                eprintln!("{} clusters stored", merged.len());
            }
            Ok(())
        }

        ClustersCommand::Test { id } => {
            let cluster = catalog.resolve(id.as_deref())?;
            let monitor = Monitor::new(config::registry(settings));
            let status = monitor.test_connection(&cluster).await;

            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &status,
                |s| status_detail(s, color),
                |s| s.status.to_string(),
            );
            output::print_output(&out, global.quiet);

            match status.status {
                Health::Healthy => Ok(()),
                Health::Unhealthy => Err(CliError::ConnectionFailed {
                    cluster: cluster.id,
                    reason: status.error.unwrap_or_default(),
                }),
            }
        }
    }
}

fn add_cluster(
    catalog: &natswatch_config::FileCatalog,
    add: ClusterAddArgs,
) -> Result<ClusterConfig, CliError> {
    let store = catalog.store()?;

    let auth = match (&add.creds, &add.username) {
        (Some(path), _) => ClusterAuth::CredsFile {
            creds_file: path.display().to_string(),
        },
        (None, Some(username)) => ClusterAuth::UsernamePassword {
            username: username.clone(),
            password: None,
        },
        (None, None) => ClusterAuth::Anonymous,
    };

    let draft = ClusterDraft {
        auth,
        is_default: add.default,
        ..ClusterDraft::new(add.name, add.url)
    };
    let cluster = store.add(draft)?;

    if add.username.is_some() {
        match std::env::var(PASSWORD_ENV) {
            Ok(password) => natswatch_config::store_password(&cluster.id, &password)?,
            Err(_) => tracing::warn!(
                cluster = %cluster.id,
                "no {PASSWORD_ENV} set; connections will fail until a password is provided"
            ),
        }
    }
    Ok(cluster)
}

fn status_detail(status: &ClusterStatus, color: bool) -> String {
    let health = match status.status {
        Health::Healthy => output::paint(color, "healthy", output::good),
        Health::Unhealthy => output::paint(color, "unhealthy", output::bad),
    };
    let mut lines = vec![
        format!("Cluster:  {}", status.name),
        format!("URL:      {}", status.url),
        format!("Status:   {health}"),
    ];
    if let Some(error) = &status.error {
        lines.push(format!("Error:    {error}"));
    }
    lines.join("\n")
}
