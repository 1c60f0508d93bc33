//! Command surface and statement execution.

use std::sync::Arc;

use tracing::debug;

use super::executor::CommandExecutor;
use super::registry::ReaderEntry;
use super::SqlServer;
use crate::backing::BackingConnection;
use crate::cache::{ParameterCriteria, QueryCriteria};
use crate::ids::{CommandId, ConnectionId, DataReaderId, ParameterId, TransactionId};
use crate::protocol::{
    CommandBehavior, CommandLifecycle, CommandType, ConnectionState, Operation, ProtocolError, ProtocolResult,
    RemoteSqlCommand, UpdateRowSource,
};
use crate::value::Value;

/// Everything an execution needs, gathered before the executor runs.
struct Execution {
    connection: ConnectionId,
    backing: Option<Arc<dyn BackingConnection>>,
    criteria: QueryCriteria,
}

impl<E: CommandExecutor> SqlServer<E> {
    /// The connection `command` runs on, provided it is open.
    fn open_connection_of(
        &self,
        command: CommandId,
    ) -> ProtocolResult<(ConnectionId, Option<Arc<dyn BackingConnection>>)> {
        let connection = self
            .registry
            .commands
            .read(command, |entry| entry.connection)?
            .ok_or_else(|| ProtocolError::invalid_operation("The command has no connection"))?;
        let (state, backing) = self
            .registry
            .connections
            .read(connection, |entry| (entry.state, entry.backing.clone()))?;
        if state != ConnectionState::Open {
            return Err(ProtocolError::ConnectionNotOpen(connection));
        }
        Ok((connection, backing))
    }

    /// Snapshot the command and its parameters into criteria.
    fn begin_execution(&self, command: CommandId, operation: Operation) -> ProtocolResult<Execution> {
        let (connection, backing) = self.open_connection_of(command)?;
        let (text, command_type, timeout, transaction, parameters) = self.registry.commands.read(command, |entry| {
            (
                entry.text.clone(),
                entry.command_type,
                entry.timeout,
                entry.transaction,
                entry.parameters.clone(),
            )
        })?;
        if text.trim().is_empty() {
            return Err(ProtocolError::invalid_operation("The command text has not been set"));
        }
        if let Some(transaction) = transaction {
            let (completed, owner) = self
                .registry
                .transactions
                .read(transaction, |entry| (entry.completed, entry.connection))?;
            if completed {
                return Err(ProtocolError::invalid_operation(
                    "The command's transaction has already completed",
                ));
            }
            if owner != Some(connection) {
                return Err(ProtocolError::invalid_operation(
                    "The command's transaction belongs to a different connection",
                ));
            }
        }

        let parameters = parameters
            .into_iter()
            .map(|parameter| {
                self.registry.parameters.read(parameter, |entry| ParameterCriteria {
                    name: entry.name.clone(),
                    value: entry.value.clone(),
                    db_type: entry.effective_db_type(),
                    direction: entry.direction,
                    size: entry.size,
                })
            })
            .collect::<ProtocolResult<Vec<_>>>()?;

        let criteria = QueryCriteria {
            command_text: text,
            command_type,
            command_timeout: timeout,
            parameters,
        };
        debug!(
            command = %command,
            operation = ?operation,
            retriable = operation.is_idempotent(),
            fingerprint = criteria.fingerprint().short(),
            "Executing command"
        );
        Ok(Execution {
            connection,
            backing,
            criteria,
        })
    }
}

impl<E: CommandExecutor> RemoteSqlCommand for SqlServer<E> {
    fn get_command_text(&self, command: CommandId) -> ProtocolResult<String> {
        self.registry.commands.read(command, |entry| entry.text.clone())
    }

    fn set_command_text(&self, command: CommandId, value: &str) -> ProtocolResult<()> {
        self.registry.commands.update(command, |entry| {
            entry.text = value.to_string();
            entry.lifecycle = CommandLifecycle::Created;
            Ok(())
        })
    }

    fn get_command_timeout(&self, command: CommandId) -> ProtocolResult<i32> {
        self.registry.commands.read(command, |entry| entry.timeout)
    }

    fn set_command_timeout(&self, command: CommandId, value: i32) -> ProtocolResult<()> {
        if value < 0 {
            return Err(ProtocolError::invalid_argument(format!(
                "Command timeout must not be negative, got {value}"
            )));
        }
        self.registry.commands.update(command, |entry| {
            entry.timeout = value;
            Ok(())
        })
    }

    fn get_command_type(&self, command: CommandId) -> ProtocolResult<CommandType> {
        self.registry.commands.read(command, |entry| entry.command_type)
    }

    fn set_command_type(&self, command: CommandId, value: CommandType) -> ProtocolResult<()> {
        self.registry.commands.update(command, |entry| {
            entry.command_type = value;
            Ok(())
        })
    }

    fn get_command_connection(&self, command: CommandId) -> ProtocolResult<Option<ConnectionId>> {
        self.registry.commands.read(command, |entry| entry.connection)
    }

    fn set_command_connection(&self, command: CommandId, connection: Option<ConnectionId>) -> ProtocolResult<()> {
        if let Some(connection) = connection {
            self.registry.connections.exists(connection)?;
        }
        self.registry.commands.update(command, |entry| {
            entry.connection = connection;
            Ok(())
        })
    }

    fn get_transaction(&self, command: CommandId) -> ProtocolResult<Option<TransactionId>> {
        self.registry.commands.read(command, |entry| entry.transaction)
    }

    fn set_transaction(&self, command: CommandId, transaction: Option<TransactionId>) -> ProtocolResult<()> {
        if let Some(transaction) = transaction {
            self.registry.transactions.exists(transaction)?;
        }
        self.registry.commands.update(command, |entry| {
            entry.transaction = transaction;
            Ok(())
        })
    }

    fn get_updated_row_source(&self, command: CommandId) -> ProtocolResult<UpdateRowSource> {
        self.registry.commands.read(command, |entry| entry.updated_row_source)
    }

    fn set_updated_row_source(&self, command: CommandId, value: UpdateRowSource) -> ProtocolResult<()> {
        self.registry.commands.update(command, |entry| {
            entry.updated_row_source = value;
            Ok(())
        })
    }

    fn create_parameter(&self, command: CommandId) -> ProtocolResult<ParameterId> {
        self.registry.insert_parameter(command)
    }

    fn prepare(&self, command: CommandId) -> ProtocolResult<()> {
        self.open_connection_of(command)?;
        self.registry.commands.update(command, |entry| {
            if entry.text.trim().is_empty() {
                return Err(ProtocolError::invalid_operation("The command text has not been set"));
            }
            entry.lifecycle = CommandLifecycle::Prepared;
            Ok(())
        })
    }

    /// Executions run to completion synchronously, so there is never anything
    /// in flight to cancel.
    fn cancel(&self, command: CommandId) -> ProtocolResult<()> {
        self.registry.commands.exists(command)?;
        debug!(command = %command, "Cancel requested with nothing in flight");
        Ok(())
    }

    fn dispose_command(&self, command: CommandId) -> ProtocolResult<()> {
        self.registry.dispose_command(command)
    }

    fn execute_non_query(&self, command: CommandId) -> ProtocolResult<i64> {
        let execution = self.begin_execution(command, Operation::ExecuteNonQuery)?;
        self.executor
            .execute_non_query(execution.backing.as_ref(), &execution.criteria)
    }

    fn execute_scalar(&self, command: CommandId) -> ProtocolResult<Value> {
        let execution = self.begin_execution(command, Operation::ExecuteScalar)?;
        self.executor
            .execute_scalar(execution.backing.as_ref(), &execution.criteria)
    }

    fn execute_reader(&self, command: CommandId, behavior: CommandBehavior) -> ProtocolResult<DataReaderId> {
        let execution = self.begin_execution(command, Operation::ExecuteReader)?;
        let table = self
            .executor
            .execute_reader(execution.backing.as_ref(), &execution.criteria)?;
        let reader = self
            .registry
            .insert_reader(ReaderEntry::new(command, execution.connection, table, behavior));
        debug!(command = %command, reader = %reader, behavior = ?behavior, "Opened reader");
        Ok(reader)
    }
}
