//! `natswatch tail`: follow a subject in the terminal.
//!
//! Runs the same Event Bridge the HTTP console uses, with a channel in
//! place of the SSE body. Filtering happens here, on the display side.

use natswatch_api::BrokerMessage;
use natswatch_config::Settings;
use natswatch_core::{
    BridgeExit, ConnectionStatus, ConnectionStatusEvent, ControlEvent, EventBridge, EventEnvelope,
    Filter, SubscribeRequest, SubscriptionFactory,
};
use tokio::sync::mpsc;

use crate::cli::{GlobalOpts, OutputFormat, TailArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

const TAIL_BUFFER: usize = 256;

/// Filter from `--filter` JSON, or from the individual condition flags.
pub fn build_filter(args: &TailArgs) -> Result<Filter, CliError> {
    if let Some(raw) = &args.filter {
        return serde_json::from_str(raw).map_err(|e| CliError::Validation {
            field: "filter".into(),
            reason: e.to_string(),
        });
    }

    let mut leaves: Vec<Filter> = Vec::new();
    leaves.extend(args.subject_contains.iter().map(Filter::subject_contains));
    leaves.extend(args.payload_contains.iter().map(Filter::payload_contains));
    for header in &args.header {
        let (key, value) = header.split_once('=').ok_or_else(|| CliError::Validation {
            field: "header".into(),
            reason: format!("expected KEY=TEXT, got '{header}'"),
        })?;
        leaves.push(Filter::header_contains(key, value));
    }

    Ok(match (leaves.len(), args.any) {
        (0, _) => Filter::default(),
        (_, true) => Filter::any(leaves),
        (_, false) => Filter::all(leaves),
    })
}

pub async fn handle(args: TailArgs, settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = build_filter(&args)?;
    let registry = config::registry(settings);
    let cluster = config::target_cluster(registry.catalog(), global)?;
    let color = output::should_color(&global.color);

    if !filter.is_unfiltered() && !global.quiet {
        eprintln!("{}", output::paint(color, &format!("filter: {filter}"), output::dim));
    }

    let mut request = SubscribeRequest::new(cluster, &args.subject);
    if let Some(stream) = &args.stream {
        request = request.on_stream(stream);
    }

    let bridge = EventBridge::new(SubscriptionFactory::new(registry.clone()), settings.bridge_config());
    let (tx, mut rx) = mpsc::channel(TAIL_BUFFER);
    let task = bridge.spawn(request, tx);

    let mut shown = 0usize;
    let mut last_error: Option<String> = None;
    let interrupted = loop {
        let envelope = tokio::select! {
            envelope = rx.recv() => envelope,
            _ = tokio::signal::ctrl_c() => break true,
        };
        let Some(envelope) = envelope else {
            break false;
        };

        match envelope {
            EventEnvelope::Message(msg) => {
                if !filter.matches(&msg) {
                    continue;
                }
                if !global.quiet {
                    println!("{}", render_message(&global.output, &msg, color));
                }
                shown += 1;
                if args.count.is_some_and(|n| shown >= n) {
                    break false;
                }
            }
            EventEnvelope::Control(ControlEvent::ConnectionStatus(status)) => {
                if status.status == ConnectionStatus::Error {
                    last_error.clone_from(&status.message);
                }
                if !global.quiet {
                    eprintln!("{}", render_status(&status, color));
                }
            }
            EventEnvelope::Control(ControlEvent::Heartbeat { timestamp }) => {
                if args.heartbeats && !global.quiet {
                    let line = format!("heartbeat {}", timestamp.to_rfc3339());
                    eprintln!("{}", output::paint(color, &line, output::dim));
                }
            }
        }
    };

    // Leaving the channel is the viewer-gone signal; wait for the teardown.
    drop(rx);
    let exit = task.await.unwrap_or(BridgeExit::ViewerGone);
    registry.close_all().await;
    tracing::debug!(%exit, interrupted, shown, "tail finished");

    match exit {
        BridgeExit::TimedOut => Err(CliError::Timeout),
        BridgeExit::OpenFailed | BridgeExit::BrokerError => Err(CliError::Broker {
            message: last_error.unwrap_or_else(|| "subscription failed".into()),
        }),
        BridgeExit::ViewerGone | BridgeExit::BrokerClosed => Ok(()),
    }
}

fn render_message(format: &OutputFormat, msg: &BrokerMessage, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(msg, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(msg)),
        OutputFormat::Plain => msg.payload().to_owned(),
        OutputFormat::Table => {
            let (time, origin) = match msg {
                BrokerMessage::Core(m) => (m.timestamp, String::new()),
                BrokerMessage::Stream(m) => (m.timestamp, format!(" {}#{}", m.stream, m.seq)),
            };
            let stamp = time.format("%H:%M:%S%.3f").to_string();
            format!(
                "{} {}{} {}",
                output::paint(color, &stamp, output::dim),
                output::paint(color, msg.subject(), output::accent),
                output::paint(color, &origin, output::dim),
                msg.payload()
            )
        }
    }
}

fn render_status(status: &ConnectionStatusEvent, color: bool) -> String {
    let text = status.message.clone().unwrap_or_else(|| status.status.to_string());
    match status.status {
        ConnectionStatus::Connected => output::paint(color, &text, output::good),
        ConnectionStatus::Disconnected => output::paint(color, &text, output::dim),
        ConnectionStatus::Error => output::paint(color, &text, output::bad),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn tail_args(argv: &[&str]) -> TailArgs {
        let mut full = vec!["natswatch", "tail"];
        full.extend_from_slice(argv);
        match crate::cli::Cli::parse_from(full).command {
            crate::cli::Command::Tail(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_flags_means_unfiltered() {
        let filter = build_filter(&tail_args(&["orders.>"])).unwrap();
        assert!(filter.is_unfiltered());
    }

    #[test]
    fn flags_combine_with_and_by_default() {
        let filter = build_filter(&tail_args(&[
            "orders.>",
            "--subject-contains",
            "created",
            "--header",
            "tenant=acme",
        ]))
        .unwrap();
        assert_eq!(filter.count(), 2);
        assert_eq!(
            filter.to_string(),
            "and (subject contains created, headers tenant contains acme)"
        );
    }

    #[test]
    fn any_switches_to_or() {
        let filter = build_filter(&tail_args(&[
            "orders.>",
            "--payload-contains",
            "a",
            "--payload-contains",
            "b",
            "--any",
        ]))
        .unwrap();
        assert_eq!(filter.to_string(), "or (payload contains a, payload contains b)");
    }

    #[test]
    fn json_filter_overrides_flags() {
        let filter = build_filter(&tail_args(&[
            "orders.>",
            "--subject-contains",
            "ignored",
            "--filter",
            r#"{"type":"value","field":"payload","operator":"contains","value":"x"}"#,
        ]))
        .unwrap();
        assert_eq!(filter.to_string(), "payload contains x");
    }

    #[test]
    fn malformed_header_flag_is_rejected() {
        let err = build_filter(&tail_args(&["orders.>", "--header", "tenant"])).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
