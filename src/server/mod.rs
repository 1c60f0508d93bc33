//! Serving side of the remote capability protocol.
//!
//! `SqlServer` owns every driver object behind a handle and implements the
//! whole protocol. What happens when a statement executes is delegated to a
//! `CommandExecutor`:
//! - `SqlProxy` runs statements against a live database and records them;
//! - `SqlReplayer` answers from recorded snapshots and never needs a database.

mod command;
mod connection;
mod executor;
mod parameter;
mod proxy;
mod reader;
mod registry;
mod replayer;

pub use executor::{Backing, CommandExecutor};
pub use proxy::{ProxyExecutor, SqlProxy};
pub use registry::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT};
pub use replayer::{ReplayExecutor, SqlReplayer};

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::backing::BackingConnection;
use registry::{HandleRegistry, TransactionEntry};

/// How many live handles of each kind a server holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleCounts {
    pub connections: usize,
    pub commands: usize,
    pub parameters: usize,
    pub readers: usize,
    pub transactions: usize,
}

impl HandleCounts {
    pub fn total(&self) -> usize {
        self.connections + self.commands + self.parameters + self.readers + self.transactions
    }
}

/// Protocol server over an executor.
///
/// Share it as an `Arc`; every method takes `&self`.
pub struct SqlServer<E> {
    registry: HandleRegistry,
    executor: E,
}

impl<E: CommandExecutor> SqlServer<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            registry: HandleRegistry::new(),
            executor,
        }
    }

    pub fn handle_counts(&self) -> HandleCounts {
        HandleCounts {
            connections: self.registry.connections.len(),
            commands: self.registry.commands.len(),
            parameters: self.registry.parameters.len(),
            readers: self.registry.readers.len(),
            transactions: self.registry.transactions.len(),
        }
    }

    /// Roll back a transaction that is being thrown away unfinished.
    fn abandon_transaction(&self, entry: TransactionEntry) {
        if !entry.completed {
            self.roll_back_quietly(entry.backing);
        }
    }

    /// Runs during close and dispose, which must not fail because of it.
    fn roll_back_quietly(&self, backing: Option<Arc<dyn BackingConnection>>) {
        if let Err(err) = self.executor.rollback(backing.as_ref()) {
            warn!(error = %err, "Failed to roll back abandoned transaction");
        }
    }
}
