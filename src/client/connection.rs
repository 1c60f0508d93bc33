use std::fmt;

use super::{report_drop_dispose, ClientResult, Remote, SqlCommandClient, SqlTransactionClient};
use crate::ids::{ConnectionId, HandleKind};
use crate::protocol::{ConnectionState, IsolationLevel};

/// A remote connection.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use sql_replay::backing::{shared_factory, SqliteBacking};
/// # use sql_replay::client::SqlConnectionClient;
/// # use sql_replay::server::SqlProxy;
/// let backing = Arc::new(SqliteBacking::open_in_memory()?);
/// let remote = Arc::new(SqlProxy::without_recording(shared_factory(backing)));
/// let connection = SqlConnectionClient::new(remote)?;
/// connection.open()?;
/// let command = connection.create_command()?;
/// command.set_text("SELECT 1")?;
/// assert_eq!(command.execute_scalar()?.to_string(), "1");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SqlConnectionClient {
    id: ConnectionId,
    remote: Remote,
    disposed: bool,
}

impl SqlConnectionClient {
    /// Create a closed connection on `remote`.
    pub fn new(remote: Remote) -> ClientResult<Self> {
        let id = remote.create_connection()?;
        Ok(Self {
            id,
            remote,
            disposed: false,
        })
    }

    pub fn with_connection_string(remote: Remote, connection_string: &str) -> ClientResult<Self> {
        let connection = Self::new(remote)?;
        connection.set_connection_string(connection_string)?;
        Ok(connection)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connection_string(&self) -> ClientResult<String> {
        Ok(self.remote.get_connection_string(self.id)?)
    }

    pub fn set_connection_string(&self, value: &str) -> ClientResult<()> {
        Ok(self.remote.set_connection_string(self.id, value)?)
    }

    pub fn connection_timeout(&self) -> ClientResult<i32> {
        Ok(self.remote.get_connection_timeout(self.id)?)
    }

    pub fn state(&self) -> ClientResult<ConnectionState> {
        Ok(self.remote.get_connection_state(self.id)?)
    }

    pub fn open(&self) -> ClientResult<()> {
        Ok(self.remote.open(self.id)?)
    }

    pub fn close(&self) -> ClientResult<()> {
        Ok(self.remote.close(self.id)?)
    }

    pub fn begin_transaction(&self) -> ClientResult<SqlTransactionClient> {
        self.begin_transaction_with(IsolationLevel::Unspecified)
    }

    pub fn begin_transaction_with(&self, isolation_level: IsolationLevel) -> ClientResult<SqlTransactionClient> {
        let id = self.remote.begin_transaction(self.id, isolation_level)?;
        Ok(SqlTransactionClient::from_handle(id, self.remote.clone()))
    }

    pub fn create_command(&self) -> ClientResult<SqlCommandClient> {
        let id = self.remote.create_command(self.id)?;
        Ok(SqlCommandClient::from_handle(id, self.remote.clone()))
    }

    /// Dispose now and report failure, instead of waiting for drop.
    pub fn dispose(mut self) -> ClientResult<()> {
        self.disposed = true;
        Ok(self.remote.dispose_connection(self.id)?)
    }
}

impl fmt::Debug for SqlConnectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlConnectionClient").field("id", &self.id).finish()
    }
}

impl Drop for SqlConnectionClient {
    fn drop(&mut self) {
        if !self.disposed {
            report_drop_dispose(HandleKind::Connection, self.id, self.remote.dispose_connection(self.id));
        }
    }
}
