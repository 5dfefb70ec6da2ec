//! Stored-message reads: single fetch and range pages.

use natswatch_api::StreamMessage;
use natswatch_config::Settings;
use natswatch_core::{Monitor, RangeReader, RangeRequest};
use tabled::Tabled;

use crate::cli::{GlobalOpts, MessagesArgs, MessagesCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Longest payload preview shown in table mode.
const PREVIEW_CHARS: usize = 60;

#[derive(Tabled)]
struct MessageRow {
    #[tabled(rename = "Seq")]
    seq: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Payload")]
    payload: String,
}

fn preview(payload: &str) -> String {
    let flat = payload.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

impl From<&StreamMessage> for MessageRow {
    fn from(m: &StreamMessage) -> Self {
        Self {
            seq: m.seq,
            time: m.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            subject: m.subject.clone(),
            payload: preview(&m.payload),
        }
    }
}

fn detail(m: &StreamMessage) -> String {
    let mut lines = vec![
        format!("Stream:   {}", m.stream),
        format!("Sequence: {}", m.seq),
        format!("Subject:  {}", m.subject),
        format!("Time:     {}", m.timestamp.to_rfc3339()),
    ];
    for (key, values) in &m.headers {
        lines.push(format!("Header:   {key}: {}", values.join(", ")));
    }
    lines.push(String::new());
    lines.push(m.payload.clone());
    lines.join("\n")
}

pub async fn handle(
    args: MessagesArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let registry = config::registry(settings);
    let cluster = config::target_cluster(registry.catalog(), global)?;

    let rendered = match args.command {
        MessagesCommand::Get { stream, seq } => {
            let msg = Monitor::new(registry.clone())
                .get_message(&cluster, &stream, seq)
                .await;
            msg.map(|m| output::render_single(&global.output, &m, detail, |m| m.payload.clone()))
        }

        MessagesCommand::Range {
            stream,
            start,
            limit,
            subject,
        } => {
            let mut request = RangeRequest::new(stream, start, limit);
            if let Some(subject) = subject {
                request = request.with_subject(subject);
            }
            let page = RangeReader::new(registry.clone())
                .with_idle(settings.range_idle())
                .read_range(&cluster, &request)
                .await;
            page.map(|page| {
                output::render_list(&global.output, &page, |m: &StreamMessage| MessageRow::from(m), |m| {
                    m.seq.to_string()
                })
            })
        }
    };

    registry.close_all().await;
    output::print_output(&rendered?, global.quiet);
    Ok(())
}
