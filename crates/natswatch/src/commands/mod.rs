//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod clusters;
pub mod messages;
pub mod serve;
pub mod streams;
pub mod tail;
pub mod util;

use natswatch_config::Settings;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(
    cmd: Command,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Serve(args) => serve::handle(args, settings).await,
        Command::Clusters(args) => clusters::handle(args, settings, global).await,
        Command::Streams => streams::list_streams(settings, global).await,
        Command::Consumers(args) => streams::list_consumers(args, settings, global).await,
        Command::Messages(args) => messages::handle(args, settings, global).await,
        Command::Tail(args) => tail::handle(args, settings, global).await,
        // Completions are handled before settings are loaded
        Command::Completions(_) => Ok(()),
    }
}
