//! The seam between the protocol server and whatever answers executions.

use std::sync::Arc;

use crate::backing::BackingConnection;
use crate::cache::{QueryCriteria, Table};
use crate::protocol::{IsolationLevel, ProtocolError, ProtocolResult};
use crate::value::Value;

/// The backing connection of an open connection, if its executor uses one.
pub type Backing<'a> = Option<&'a Arc<dyn BackingConnection>>;

/// Answers the operations of `SqlServer` that need something beyond the
/// registry: opening connections, transactions and statement execution.
///
/// Chosen once, when the server is built; clients cannot tell which one they
/// are talking to.
pub trait CommandExecutor: Send + Sync {
    /// Called when a connection is opened. A live executor returns the backing
    /// connection every later call on that connection receives.
    fn open_connection(&self, connection_string: &str) -> ProtocolResult<Option<Arc<dyn BackingConnection>>>;

    fn begin_transaction(&self, backing: Backing<'_>, isolation_level: IsolationLevel) -> ProtocolResult<()>;

    fn commit(&self, backing: Backing<'_>) -> ProtocolResult<()>;

    fn rollback(&self, backing: Backing<'_>) -> ProtocolResult<()>;

    fn execute_non_query(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<i64>;

    fn execute_scalar(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Value>;

    fn execute_reader(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Arc<Table>>;
}

/// The backing connection, or an error naming the operation that needed it.
pub(crate) fn require_backing<'a>(
    backing: Backing<'a>,
    operation: &str,
) -> ProtocolResult<&'a Arc<dyn BackingConnection>> {
    backing.ok_or_else(|| {
        ProtocolError::invalid_operation(format!("{operation} requires a live backing connection"))
    })
}
