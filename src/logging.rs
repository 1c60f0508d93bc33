//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "SQL_REPLAY_LOG";

/// Install the global subscriber.
///
/// Filter directives come from `SQL_REPLAY_LOG` (e.g. `sql_replay=debug`),
/// defaulting to `info`. Logs go to stderr so command output on stdout stays
/// machine-readable. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
