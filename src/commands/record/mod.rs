mod execute;
mod output;

pub use execute::RecordResult;

use clap::Args;
use std::path::PathBuf;

use super::query::{parse_param, ExecuteKind, ParamArg};

/// Run a statement against a live database and record its result
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sql_replay record --db app.db --sql 'SELECT * FROM users'
  sql_replay record --db app.db --sql 'SELECT name FROM users WHERE id = @id' -p @id=2 -k scalar
  sql_replay record --db :memory: --init seed.sql --sql 'SELECT count(*) FROM users' -k scalar
  sql_replay record --db postgres://localhost/app --sql 'DELETE FROM jobs' -k non-query")]
pub struct RecordCmd {
    /// SQL statement to run
    #[arg(short, long)]
    pub sql: String,

    /// Parameter as name=value, repeatable, bound in the order given
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<ParamArg>,

    /// Which execute call to issue
    #[arg(short, long, value_enum, default_value_t = ExecuteKind::Rows)]
    pub kind: ExecuteKind,

    /// Backing database URL or path (`:memory:`, `sqlite://path`, `postgres://...`)
    ///
    /// If not specified, uses .sql_replay.json, then SQL_REPLAY_DATABASE_URL,
    /// then an empty in-memory database.
    #[arg(long)]
    pub db: Option<String>,

    /// SQL script run against the database before recording (statements separated by `;`)
    #[arg(long)]
    pub init: Option<PathBuf>,
}
