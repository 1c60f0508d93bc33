//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `Execute` implementation producing a serializable result
//! - An `Outputable` implementation for table output

mod inspect;
mod query;
mod record;
mod replay;

pub use inspect::{InspectCmd, InspectEntry, InspectResult};
pub use query::{parse_param, run_query, ExecuteKind, ParamArg, QueryOutcome};
pub use record::{RecordCmd, RecordResult};
pub use replay::{ReplayCmd, ReplayResult};

use clap::Subcommand;
use std::error::Error;
use std::path::Path;

use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, cache_path: &Path) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a statement against a live database and record its result
    Record(RecordCmd),

    /// Answer a statement from recorded results only
    Replay(ReplayCmd),

    /// List the recorded results in a cache file
    Inspect(InspectCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, cache_path: &Path, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Record(cmd) => {
                let result = cmd.execute(cache_path)?;
                Ok(result.format(format))
            }
            Command::Replay(cmd) => {
                let result = cmd.execute(cache_path)?;
                Ok(result.format(format))
            }
            Command::Inspect(cmd) => {
                let result = cmd.execute(cache_path)?;
                Ok(result.format(format))
            }
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}
