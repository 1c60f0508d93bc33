mod cli_tests;
mod execute;
mod output;

pub(crate) use execute::open_cache;
pub use execute::ReplayResult;

use clap::Args;

use super::query::{parse_param, ExecuteKind, ParamArg};

/// Answer a statement from recorded results only
///
/// No database is contacted. The statement, its parameters (names, values and
/// order) and the kind must match a recording exactly.
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sql_replay replay --sql 'SELECT * FROM users'
  sql_replay replay --sql 'SELECT name FROM users WHERE id = @id' -p @id=2 -k scalar
  sql_replay replay --cache ./fixtures/recorded.json --sql 'DELETE FROM jobs' -k non-query")]
pub struct ReplayCmd {
    /// SQL statement to answer
    #[arg(short, long)]
    pub sql: String,

    /// Parameter as name=value, repeatable, bound in the order given
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<ParamArg>,

    /// Which execute call to issue
    #[arg(short, long, value_enum, default_value_t = ExecuteKind::Rows)]
    pub kind: ExecuteKind,
}
