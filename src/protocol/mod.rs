//! The remote capability protocol.
//!
//! Every operation a client adapter can perform on a server-side driver object
//! is a method here, addressed by an opaque handle plus plain serializable
//! values. Nothing in these signatures refers to a live resource, so the same
//! surface can sit behind any transport.
//!
//! Both the live proxy and the cache-backed replayer implement the whole
//! surface; client adapters only ever see `dyn RemoteSqlClient`.

mod operation;
mod types;

pub use operation::Operation;
pub use types::{
    CommandBehavior, CommandLifecycle, CommandType, ConnectionState, IsolationLevel,
    ParameterDirection, UpdateRowSource,
};

use thiserror::Error;

use crate::backing::BackingError;
use crate::cache::CacheError;
use crate::ids::{
    CommandId, ConnectionId, DataReaderId, HandleKind, ParameterId, TransactionId,
};
use crate::value::{DbType, Value};

/// Errors raised by the serving side of the protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("No {kind} is registered for handle {id}")]
    HandleNotFound { kind: HandleKind, id: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Parameter {parameter} was not created by command {command} and may not be used with it")]
    OwnershipViolation { parameter: ParameterId, command: CommandId },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Index {index} is out of range for a collection of {count}")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Connection {0} is not open")]
    ConnectionNotOpen(ConnectionId),

    #[error(transparent)]
    Backing(#[from] BackingError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ProtocolError {
    pub fn not_found(kind: HandleKind, id: impl ToString) -> Self {
        ProtocolError::HandleNotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ProtocolError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ProtocolError::InvalidOperation {
            message: message.into(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Connection surface.
pub trait RemoteSqlConnection: Send + Sync {
    /// Register a new, closed connection and return its handle.
    fn create_connection(&self) -> ProtocolResult<ConnectionId>;
    fn get_connection_string(&self, connection: ConnectionId) -> ProtocolResult<String>;
    fn set_connection_string(&self, connection: ConnectionId, value: &str) -> ProtocolResult<()>;
    fn get_connection_timeout(&self, connection: ConnectionId) -> ProtocolResult<i32>;
    fn get_connection_state(&self, connection: ConnectionId) -> ProtocolResult<ConnectionState>;
    fn open(&self, connection: ConnectionId) -> ProtocolResult<()>;
    fn close(&self, connection: ConnectionId) -> ProtocolResult<()>;
    fn begin_transaction(
        &self,
        connection: ConnectionId,
        isolation_level: IsolationLevel,
    ) -> ProtocolResult<TransactionId>;
    /// Create a command bound to (and disposed along with) `connection`.
    fn create_command(&self, connection: ConnectionId) -> ProtocolResult<CommandId>;
    fn dispose_connection(&self, connection: ConnectionId) -> ProtocolResult<()>;
}

/// Transaction surface.
pub trait RemoteSqlTransaction: Send + Sync {
    fn get_transaction_connection(&self, transaction: TransactionId) -> ProtocolResult<Option<ConnectionId>>;
    fn get_isolation_level(&self, transaction: TransactionId) -> ProtocolResult<IsolationLevel>;
    fn commit(&self, transaction: TransactionId) -> ProtocolResult<()>;
    fn rollback(&self, transaction: TransactionId) -> ProtocolResult<()>;
    fn dispose_transaction(&self, transaction: TransactionId) -> ProtocolResult<()>;
}

/// Command surface.
pub trait RemoteSqlCommand: Send + Sync {
    fn get_command_text(&self, command: CommandId) -> ProtocolResult<String>;
    fn set_command_text(&self, command: CommandId, value: &str) -> ProtocolResult<()>;
    fn get_command_timeout(&self, command: CommandId) -> ProtocolResult<i32>;
    fn set_command_timeout(&self, command: CommandId, value: i32) -> ProtocolResult<()>;
    fn get_command_type(&self, command: CommandId) -> ProtocolResult<CommandType>;
    fn set_command_type(&self, command: CommandId, value: CommandType) -> ProtocolResult<()>;
    fn get_command_connection(&self, command: CommandId) -> ProtocolResult<Option<ConnectionId>>;
    fn set_command_connection(&self, command: CommandId, connection: Option<ConnectionId>) -> ProtocolResult<()>;
    fn get_transaction(&self, command: CommandId) -> ProtocolResult<Option<TransactionId>>;
    fn set_transaction(&self, command: CommandId, transaction: Option<TransactionId>) -> ProtocolResult<()>;
    fn get_updated_row_source(&self, command: CommandId) -> ProtocolResult<UpdateRowSource>;
    fn set_updated_row_source(&self, command: CommandId, value: UpdateRowSource) -> ProtocolResult<()>;
    /// Create a parameter owned by `command`. It is not added to the command's
    /// parameter collection.
    fn create_parameter(&self, command: CommandId) -> ProtocolResult<ParameterId>;
    fn prepare(&self, command: CommandId) -> ProtocolResult<()>;
    fn cancel(&self, command: CommandId) -> ProtocolResult<()>;
    fn dispose_command(&self, command: CommandId) -> ProtocolResult<()>;
    fn execute_non_query(&self, command: CommandId) -> ProtocolResult<i64>;
    fn execute_scalar(&self, command: CommandId) -> ProtocolResult<Value>;
    fn execute_reader(&self, command: CommandId, behavior: CommandBehavior) -> ProtocolResult<DataReaderId>;
}

/// The ordered, name-addressable parameter collection of a command.
pub trait RemoteSqlParameterSet: Send + Sync {
    fn get_parameter_by_index(&self, command: CommandId, index: usize) -> ProtocolResult<ParameterId>;
    fn get_parameter_by_name(&self, command: CommandId, name: &str) -> ProtocolResult<ParameterId>;
    fn set_parameter_by_index(&self, command: CommandId, index: usize, parameter: ParameterId) -> ProtocolResult<()>;
    fn set_parameter_by_name(&self, command: CommandId, name: &str, parameter: ParameterId) -> ProtocolResult<()>;
    fn get_parameter_count(&self, command: CommandId) -> ProtocolResult<usize>;
    /// Append and return the new position.
    fn add_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<usize>;
    fn clear_parameters(&self, command: CommandId) -> ProtocolResult<()>;
    fn contains_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<bool>;
    fn contains_parameter_name(&self, command: CommandId, name: &str) -> ProtocolResult<bool>;
    fn index_of_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<Option<usize>>;
    fn index_of_parameter_name(&self, command: CommandId, name: &str) -> ProtocolResult<Option<usize>>;
    fn insert_parameter(&self, command: CommandId, index: usize, parameter: ParameterId) -> ProtocolResult<()>;
    fn remove_parameter(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<()>;
    fn remove_parameter_at(&self, command: CommandId, index: usize) -> ProtocolResult<()>;
    fn remove_parameter_by_name(&self, command: CommandId, name: &str) -> ProtocolResult<()>;
}

/// A single parameter.
pub trait RemoteSqlParameter: Send + Sync {
    fn get_parameter_name(&self, parameter: ParameterId) -> ProtocolResult<String>;
    fn set_parameter_name(&self, parameter: ParameterId, value: &str) -> ProtocolResult<()>;
    fn get_value(&self, parameter: ParameterId) -> ProtocolResult<Value>;
    fn set_value(&self, parameter: ParameterId, value: Value) -> ProtocolResult<()>;
    fn get_direction(&self, parameter: ParameterId) -> ProtocolResult<ParameterDirection>;
    fn set_direction(&self, parameter: ParameterId, value: ParameterDirection) -> ProtocolResult<()>;
    /// The declared type, or the type inferred from the current value.
    fn get_db_type(&self, parameter: ParameterId) -> ProtocolResult<DbType>;
    fn set_db_type(&self, parameter: ParameterId, value: DbType) -> ProtocolResult<()>;
    /// Forget any declared type and go back to inferring it from the value.
    fn reset_db_type(&self, parameter: ParameterId) -> ProtocolResult<()>;
    fn get_is_nullable(&self, parameter: ParameterId) -> ProtocolResult<bool>;
    fn set_is_nullable(&self, parameter: ParameterId, value: bool) -> ProtocolResult<()>;
    fn get_size(&self, parameter: ParameterId) -> ProtocolResult<i32>;
    fn set_size(&self, parameter: ParameterId, value: i32) -> ProtocolResult<()>;
    fn get_precision(&self, parameter: ParameterId) -> ProtocolResult<u8>;
    fn set_precision(&self, parameter: ParameterId, value: u8) -> ProtocolResult<()>;
    fn get_scale(&self, parameter: ParameterId) -> ProtocolResult<u8>;
    fn set_scale(&self, parameter: ParameterId, value: u8) -> ProtocolResult<()>;
    fn get_source_column(&self, parameter: ParameterId) -> ProtocolResult<String>;
    fn set_source_column(&self, parameter: ParameterId, value: &str) -> ProtocolResult<()>;
}

/// Forward-only reader over a result.
pub trait RemoteSqlDataReader: Send + Sync {
    fn read(&self, reader: DataReaderId) -> ProtocolResult<bool>;
    fn next_result(&self, reader: DataReaderId) -> ProtocolResult<bool>;
    fn get_field_count(&self, reader: DataReaderId) -> ProtocolResult<usize>;
    fn get_ordinal(&self, reader: DataReaderId, name: &str) -> ProtocolResult<usize>;
    fn get_name(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<String>;
    fn get_data_type_name(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<String>;
    fn get_field_type(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<DbType>;
    fn get_reader_value(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<Value>;
    fn get_reader_values(&self, reader: DataReaderId) -> ProtocolResult<Vec<Value>>;
    fn is_db_null(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<bool>;
    fn get_records_affected(&self, reader: DataReaderId) -> ProtocolResult<i64>;
    fn get_depth(&self, reader: DataReaderId) -> ProtocolResult<usize>;
    fn is_closed(&self, reader: DataReaderId) -> ProtocolResult<bool>;
    fn close_reader(&self, reader: DataReaderId) -> ProtocolResult<()>;
    fn dispose_reader(&self, reader: DataReaderId) -> ProtocolResult<()>;
}

/// The complete surface a client adapter talks to.
pub trait RemoteSqlClient:
    RemoteSqlConnection
    + RemoteSqlTransaction
    + RemoteSqlCommand
    + RemoteSqlParameterSet
    + RemoteSqlParameter
    + RemoteSqlDataReader
{
}

impl<T> RemoteSqlClient for T where
    T: RemoteSqlConnection
        + RemoteSqlTransaction
        + RemoteSqlCommand
        + RemoteSqlParameterSet
        + RemoteSqlParameter
        + RemoteSqlDataReader
{
}
