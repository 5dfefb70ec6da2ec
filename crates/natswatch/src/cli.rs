//! Clap derive structures for the `natswatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// natswatch -- live view of NATS subjects and JetStream streams
#[derive(Debug, Parser)]
#[command(
    name = "natswatch",
    version,
    about = "Watch NATS subjects and JetStream streams",
    long_about = "Monitoring console for NATS.\n\n\
        `natswatch serve` runs the browser console (Server-Sent Events + JSON API);\n\
        the other commands inspect clusters, streams and live traffic from the terminal.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "NATSWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Cluster id (defaults to the configured default cluster)
    #[arg(long, short = 'c', env = "NATSWATCH_CLUSTER", global = true)]
    pub cluster: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NATSWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP console (SSE subscriptions + JSON API)
    Serve(ServeArgs),

    /// Manage configured clusters
    #[command(alias = "cl")]
    Clusters(ClustersArgs),

    /// List JetStream streams
    #[command(alias = "st")]
    Streams,

    /// List consumers on a stream
    Consumers(ConsumersArgs),

    /// Read stored stream messages
    #[command(alias = "msg")]
    Messages(MessagesArgs),

    /// Follow live traffic on a subject
    Tail(TailArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Serve ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind (overrides `listen` in the config)
    #[arg(long, short = 'l')]
    pub listen: Option<String>,
}

// ── Clusters ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClustersArgs {
    #[command(subcommand)]
    pub command: ClustersCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClustersCommand {
    /// List configured clusters
    #[command(alias = "ls")]
    List,

    /// Add a cluster (requires multi-cluster mode)
    Add(ClusterAddArgs),

    /// Remove a stored cluster
    #[command(alias = "rm")]
    Remove {
        /// Cluster id
        id: String,
    },

    /// Merge clusters from a JSON file (matched by name)
    Import {
        /// JSON array of `{name, url, auth?, isDefault?}`
        file: PathBuf,
    },

    /// Check that a cluster is reachable
    Test {
        /// Cluster id (defaults to the default cluster)
        id: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ClusterAddArgs {
    /// Display name
    pub name: String,

    /// Server URL(s), comma separated
    pub url: String,

    /// Authenticate with a `.creds` file
    #[arg(long, conflicts_with = "username")]
    pub creds: Option<PathBuf>,

    /// Authenticate with a username; the password is read from
    /// NATSWATCH_PASSWORD and stored in the system keyring
    #[arg(long)]
    pub username: Option<String>,

    /// Make this the default cluster
    #[arg(long)]
    pub default: bool,
}

// ── Streams / consumers / messages ───────────────────────────────────

#[derive(Debug, Args)]
pub struct ConsumersArgs {
    /// Stream name
    pub stream: String,
}

#[derive(Debug, Args)]
pub struct MessagesArgs {
    #[command(subcommand)]
    pub command: MessagesCommand,
}

#[derive(Debug, Subcommand)]
pub enum MessagesCommand {
    /// Fetch one message by sequence
    Get {
        stream: String,
        seq: u64,
    },

    /// Read a page of messages starting at a sequence
    Range {
        stream: String,

        /// First sequence (0 is read as 1)
        #[arg(long, short = 's', default_value = "1")]
        start: u64,

        /// Page size (clamped to 1..=1000)
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,

        /// Only messages on this subject
        #[arg(long)]
        subject: Option<String>,
    },
}

// ── Tail ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Subject to subscribe to (wildcards allowed)
    pub subject: String,

    /// Follow a JetStream stream instead of core NATS
    #[arg(long)]
    pub stream: Option<String>,

    /// Only show messages whose subject contains this text
    #[arg(long, value_name = "TEXT")]
    pub subject_contains: Vec<String>,

    /// Only show messages whose payload contains this text
    #[arg(long, value_name = "TEXT")]
    pub payload_contains: Vec<String>,

    /// Only show messages with a header value containing text
    #[arg(long, value_name = "KEY=TEXT")]
    pub header: Vec<String>,

    /// Match any condition instead of all of them
    #[arg(long)]
    pub any: bool,

    /// Full filter as JSON (overrides the flags above)
    #[arg(long, value_name = "JSON")]
    pub filter: Option<String>,

    /// Stop after this many displayed messages
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Also print heartbeats
    #[arg(long)]
    pub heartbeats: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
