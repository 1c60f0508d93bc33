mod execute;
mod output;

pub use execute::{InspectEntry, InspectResult};

use clap::Args;

use super::query::ExecuteKind;

/// List the recorded results in a cache file
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sql_replay inspect                          # Everything in the default cache
  sql_replay inspect --cache recorded.json -k scalar
  sql_replay inspect --grep users -o json     # Entries whose SQL mentions 'users'")]
pub struct InspectCmd {
    /// Only list recordings of this kind
    #[arg(short, long, value_enum)]
    pub kind: Option<ExecuteKind>,

    /// Only list recordings whose SQL contains this text (case-insensitive)
    #[arg(short, long)]
    pub grep: Option<String>,
}
