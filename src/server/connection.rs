//! Connection and transaction surfaces.

use tracing::debug;

use super::executor::CommandExecutor;
use super::registry::TransactionEntry;
use super::SqlServer;
use crate::ids::{CommandId, ConnectionId, TransactionId};
use crate::protocol::{
    ConnectionState, IsolationLevel, ProtocolError, ProtocolResult, RemoteSqlConnection, RemoteSqlTransaction,
};

impl<E: CommandExecutor> SqlServer<E> {
    /// Roll back and detach every unfinished transaction on `connection`.
    fn abandon_transactions_on(&self, connection: ConnectionId) {
        let pending = self
            .registry
            .transactions
            .ids_where(|entry| entry.connection == Some(connection) && !entry.completed);
        for id in pending {
            let taken = self.registry.transactions.update(id, |entry| {
                let backing = entry.backing.take();
                entry.completed = true;
                entry.connection = None;
                Ok(backing)
            });
            if let Ok(backing) = taken {
                self.roll_back_quietly(backing);
            }
        }
    }

    fn close_readers_on(&self, connection: ConnectionId) {
        for id in self.registry.readers.ids_where(|entry| entry.connection == Some(connection)) {
            let _ = self.registry.readers.update(id, |entry| {
                entry.closed = true;
                Ok(())
            });
        }
    }

    /// Shared by commit and rollback: fails once the transaction completed.
    fn complete_transaction(&self, transaction: TransactionId, commit: bool) -> ProtocolResult<()> {
        let (completed, backing) = self
            .registry
            .transactions
            .read(transaction, |entry| (entry.completed, entry.backing.clone()))?;
        if completed {
            return Err(ProtocolError::invalid_operation(
                "This transaction has completed; it is no longer usable",
            ));
        }
        if commit {
            self.executor.commit(backing.as_ref())?;
        } else {
            self.executor.rollback(backing.as_ref())?;
        }
        self.registry.transactions.update(transaction, |entry| {
            entry.completed = true;
            entry.connection = None;
            entry.backing = None;
            Ok(())
        })?;
        debug!(transaction = %transaction, commit, "Completed transaction");
        Ok(())
    }
}

impl<E: CommandExecutor> RemoteSqlConnection for SqlServer<E> {
    fn create_connection(&self) -> ProtocolResult<ConnectionId> {
        Ok(self.registry.insert_connection())
    }

    fn get_connection_string(&self, connection: ConnectionId) -> ProtocolResult<String> {
        self.registry
            .connections
            .read(connection, |entry| entry.connection_string.clone())
    }

    fn set_connection_string(&self, connection: ConnectionId, value: &str) -> ProtocolResult<()> {
        self.registry.connections.update(connection, |entry| {
            if entry.state == ConnectionState::Open {
                return Err(ProtocolError::invalid_operation(
                    "The connection string cannot be changed while the connection is open",
                ));
            }
            entry.connection_string = value.to_string();
            Ok(())
        })
    }

    fn get_connection_timeout(&self, connection: ConnectionId) -> ProtocolResult<i32> {
        self.registry.connections.read(connection, |entry| entry.timeout)
    }

    fn get_connection_state(&self, connection: ConnectionId) -> ProtocolResult<ConnectionState> {
        self.registry.connections.read(connection, |entry| entry.state)
    }

    fn open(&self, connection: ConnectionId) -> ProtocolResult<()> {
        let (state, connection_string) = self
            .registry
            .connections
            .read(connection, |entry| (entry.state, entry.connection_string.clone()))?;
        if state == ConnectionState::Open {
            return Err(ProtocolError::invalid_operation("The connection is already open"));
        }

        let backing = self.executor.open_connection(&connection_string)?;
        self.registry.connections.update(connection, |entry| {
            entry.state = ConnectionState::Open;
            entry.backing = backing;
            Ok(())
        })?;
        debug!(connection = %connection, "Opened connection");
        Ok(())
    }

    /// Closing a closed connection is a no-op.
    fn close(&self, connection: ConnectionId) -> ProtocolResult<()> {
        let was_open = self.registry.connections.update(connection, |entry| {
            let was_open = entry.state == ConnectionState::Open;
            entry.state = ConnectionState::Closed;
            entry.backing = None;
            Ok(was_open)
        })?;
        if was_open {
            self.close_readers_on(connection);
            self.abandon_transactions_on(connection);
            debug!(connection = %connection, "Closed connection");
        }
        Ok(())
    }

    fn begin_transaction(
        &self,
        connection: ConnectionId,
        isolation_level: IsolationLevel,
    ) -> ProtocolResult<TransactionId> {
        let (state, backing) = self
            .registry
            .connections
            .read(connection, |entry| (entry.state, entry.backing.clone()))?;
        if state != ConnectionState::Open {
            return Err(ProtocolError::ConnectionNotOpen(connection));
        }
        let active = self
            .registry
            .transactions
            .ids_where(|entry| entry.connection == Some(connection) && !entry.completed);
        if !active.is_empty() {
            return Err(ProtocolError::invalid_operation(
                "Parallel transactions are not supported on one connection",
            ));
        }

        self.executor.begin_transaction(backing.as_ref(), isolation_level)?;
        let id = self.registry.insert_transaction(TransactionEntry {
            connection: Some(connection),
            isolation_level,
            backing,
            completed: false,
        });
        debug!(transaction = %id, connection = %connection, "Began transaction");
        Ok(id)
    }

    fn create_command(&self, connection: ConnectionId) -> ProtocolResult<CommandId> {
        self.registry.insert_command(connection)
    }

    fn dispose_connection(&self, connection: ConnectionId) -> ProtocolResult<()> {
        for pending in self.registry.dispose_connection(connection)? {
            self.abandon_transaction(pending);
        }
        Ok(())
    }
}

impl<E: CommandExecutor> RemoteSqlTransaction for SqlServer<E> {
    fn get_transaction_connection(&self, transaction: TransactionId) -> ProtocolResult<Option<ConnectionId>> {
        self.registry.transactions.read(transaction, |entry| entry.connection)
    }

    fn get_isolation_level(&self, transaction: TransactionId) -> ProtocolResult<IsolationLevel> {
        self.registry.transactions.read(transaction, |entry| entry.isolation_level)
    }

    fn commit(&self, transaction: TransactionId) -> ProtocolResult<()> {
        self.complete_transaction(transaction, true)
    }

    fn rollback(&self, transaction: TransactionId) -> ProtocolResult<()> {
        self.complete_transaction(transaction, false)
    }

    /// Disposing an unfinished transaction rolls it back.
    fn dispose_transaction(&self, transaction: TransactionId) -> ProtocolResult<()> {
        let entry = self.registry.transactions.remove(transaction)?;
        self.abandon_transaction(entry);
        Ok(())
    }
}
