//! Stream and consumer listings.

use natswatch_api::{ConsumerInfo, Durability, Flow, StreamInfo};
use natswatch_config::Settings;
use natswatch_core::Monitor;
use tabled::Tabled;

use crate::cli::{ConsumersArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Subjects")]
    subjects: String,
    #[tabled(rename = "Last Seq")]
    last_sequence: u64,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&StreamInfo> for StreamRow {
    fn from(s: &StreamInfo) -> Self {
        Self {
            name: s.name.clone(),
            subjects: s.subject_prefixes.join(", "),
            last_sequence: s.last_sequence,
            description: s.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ConsumerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Filter")]
    filter: String,
    #[tabled(rename = "Pending")]
    pending: u64,
    #[tabled(rename = "Ack Pending")]
    ack_pending: u64,
    #[tabled(rename = "Redelivered")]
    redelivered: u64,
    #[tabled(rename = "Last Delivered")]
    last_delivered: u64,
}

impl From<&ConsumerInfo> for ConsumerRow {
    fn from(c: &ConsumerInfo) -> Self {
        let durability = match c.durability {
            Durability::Durable => "durable",
            Durability::Ephemeral => "ephemeral",
        };
        let flow = match c.flow {
            Flow::Push => "push",
            Flow::Pull => "pull",
        };
        Self {
            name: c.name.clone(),
            kind: format!("{durability}/{flow}"),
            filter: c.filter_subjects.join(", "),
            pending: c.pending_count,
            ack_pending: c.ack_pending_count,
            redelivered: c.redelivered_count,
            last_delivered: c.last_delivered,
        }
    }
}

pub async fn list_streams(settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = config::registry(settings);
    let cluster = config::target_cluster(registry.catalog(), global)?;
    let streams = Monitor::new(registry.clone()).list_streams(&cluster).await;
    registry.close_all().await;

    let streams = streams?;
    let out = output::render_list(&global.output, &streams, |s: &StreamInfo| StreamRow::from(s), |s| s.name.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn list_consumers(
    args: ConsumersArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let registry = config::registry(settings);
    let cluster = config::target_cluster(registry.catalog(), global)?;
    let consumers = Monitor::new(registry.clone())
        .list_consumers(&cluster, &args.stream)
        .await;
    registry.close_all().await;

    let consumers = consumers?;
    let out = output::render_list(&global.output, &consumers, |c: &ConsumerInfo| ConsumerRow::from(c), |c| {
        c.name.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
