use std::fmt;

use super::{report_drop_dispose, ClientResult, Remote};
use crate::ids::{ConnectionId, HandleKind, TransactionId};
use crate::protocol::IsolationLevel;

/// A transaction begun on a remote connection.
///
/// Dropping it without commit rolls it back.
pub struct SqlTransactionClient {
    id: TransactionId,
    remote: Remote,
    disposed: bool,
}

impl SqlTransactionClient {
    pub(crate) fn from_handle(id: TransactionId, remote: Remote) -> Self {
        Self {
            id,
            remote,
            disposed: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The connection, or `None` once committed or rolled back.
    pub fn connection(&self) -> ClientResult<Option<ConnectionId>> {
        Ok(self.remote.get_transaction_connection(self.id)?)
    }

    pub fn isolation_level(&self) -> ClientResult<IsolationLevel> {
        Ok(self.remote.get_isolation_level(self.id)?)
    }

    pub fn commit(&self) -> ClientResult<()> {
        Ok(self.remote.commit(self.id)?)
    }

    pub fn rollback(&self) -> ClientResult<()> {
        Ok(self.remote.rollback(self.id)?)
    }

    pub fn dispose(mut self) -> ClientResult<()> {
        self.disposed = true;
        Ok(self.remote.dispose_transaction(self.id)?)
    }
}

impl fmt::Debug for SqlTransactionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTransactionClient").field("id", &self.id).finish()
    }
}

impl Drop for SqlTransactionClient {
    fn drop(&mut self) {
        if !self.disposed {
            report_drop_dispose(HandleKind::Transaction, self.id, self.remote.dispose_transaction(self.id));
        }
    }
}
