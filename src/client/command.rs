use std::fmt;

use super::{
    report_drop_dispose, ClientResult, Remote, SqlConnectionClient, SqlDataReaderClient,
    SqlParameterClient, SqlParameterSetClient, SqlTransactionClient,
};
use crate::ids::{CommandId, ConnectionId, HandleKind, TransactionId};
use crate::protocol::{CommandBehavior, CommandType, UpdateRowSource};
use crate::value::Value;

/// A remote command, usually created through [`SqlConnectionClient::create_command`].
pub struct SqlCommandClient {
    id: CommandId,
    remote: Remote,
    disposed: bool,
}

impl SqlCommandClient {
    pub(crate) fn from_handle(id: CommandId, remote: Remote) -> Self {
        Self {
            id,
            remote,
            disposed: false,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn text(&self) -> ClientResult<String> {
        Ok(self.remote.get_command_text(self.id)?)
    }

    pub fn set_text(&self, value: &str) -> ClientResult<()> {
        Ok(self.remote.set_command_text(self.id, value)?)
    }

    /// Timeout in seconds.
    pub fn timeout(&self) -> ClientResult<i32> {
        Ok(self.remote.get_command_timeout(self.id)?)
    }

    pub fn set_timeout(&self, value: i32) -> ClientResult<()> {
        Ok(self.remote.set_command_timeout(self.id, value)?)
    }

    pub fn command_type(&self) -> ClientResult<CommandType> {
        Ok(self.remote.get_command_type(self.id)?)
    }

    pub fn set_command_type(&self, value: CommandType) -> ClientResult<()> {
        Ok(self.remote.set_command_type(self.id, value)?)
    }

    pub fn connection(&self) -> ClientResult<Option<ConnectionId>> {
        Ok(self.remote.get_command_connection(self.id)?)
    }

    /// Move the command to another connection, or detach it with `None`.
    pub fn set_connection(&self, connection: Option<&SqlConnectionClient>) -> ClientResult<()> {
        Ok(self
            .remote
            .set_command_connection(self.id, connection.map(SqlConnectionClient::id))?)
    }

    pub fn transaction(&self) -> ClientResult<Option<TransactionId>> {
        Ok(self.remote.get_transaction(self.id)?)
    }

    pub fn set_transaction(&self, transaction: Option<&SqlTransactionClient>) -> ClientResult<()> {
        Ok(self
            .remote
            .set_transaction(self.id, transaction.map(SqlTransactionClient::id))?)
    }

    pub fn updated_row_source(&self) -> ClientResult<UpdateRowSource> {
        Ok(self.remote.get_updated_row_source(self.id)?)
    }

    pub fn set_updated_row_source(&self, value: UpdateRowSource) -> ClientResult<()> {
        Ok(self.remote.set_updated_row_source(self.id, value)?)
    }

    pub fn parameters(&self) -> SqlParameterSetClient {
        SqlParameterSetClient::new(self.id, self.remote.clone())
    }

    /// Create a parameter owned by this command. It is not added to the collection.
    pub fn create_parameter(&self) -> ClientResult<SqlParameterClient> {
        let id = self.remote.create_parameter(self.id)?;
        Ok(SqlParameterClient::from_handle(id, self.id, self.remote.clone()))
    }

    pub fn prepare(&self) -> ClientResult<()> {
        Ok(self.remote.prepare(self.id)?)
    }

    pub fn cancel(&self) -> ClientResult<()> {
        Ok(self.remote.cancel(self.id)?)
    }

    pub fn execute_non_query(&self) -> ClientResult<i64> {
        Ok(self.remote.execute_non_query(self.id)?)
    }

    pub fn execute_scalar(&self) -> ClientResult<Value> {
        Ok(self.remote.execute_scalar(self.id)?)
    }

    pub fn execute_reader(&self) -> ClientResult<SqlDataReaderClient> {
        self.execute_reader_with(CommandBehavior::Default)
    }

    pub fn execute_reader_with(&self, behavior: CommandBehavior) -> ClientResult<SqlDataReaderClient> {
        let id = self.remote.execute_reader(self.id, behavior)?;
        Ok(SqlDataReaderClient::from_handle(id, self.remote.clone()))
    }

    pub fn dispose(mut self) -> ClientResult<()> {
        self.disposed = true;
        Ok(self.remote.dispose_command(self.id)?)
    }
}

impl fmt::Debug for SqlCommandClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlCommandClient").field("id", &self.id).finish()
    }
}

impl Drop for SqlCommandClient {
    fn drop(&mut self) {
        if !self.disposed {
            report_drop_dispose(HandleKind::Command, self.id, self.remote.dispose_command(self.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::protocol::{ProtocolError, RemoteSqlCommand};
    use crate::test_utils::{recording_proxy, replayer_for};
    use rstest::rstest;

    #[rstest]
    fn test_recorded_query_replays_through_clients() {
        let (proxy, cache) = recording_proxy();
        {
            let connection = SqlConnectionClient::new(proxy).unwrap();
            connection.open().unwrap();
            let command = connection.create_command().unwrap();
            command.set_text("SELECT name FROM test WHERE id = @id").unwrap();
            command.parameters().add_with_value("@id", 2).unwrap();
            assert_eq!(command.execute_scalar().unwrap(), Value::from("Jack"));
        }

        let connection = SqlConnectionClient::new(replayer_for(&cache)).unwrap();
        connection.open().unwrap();
        let command = connection.create_command().unwrap();
        command.set_text("SELECT name FROM test WHERE id = @id").unwrap();
        command.parameters().add_with_value("@id", 2).unwrap();
        assert_eq!(command.execute_scalar().unwrap(), Value::from("Jack"));

        command.parameters().get(0).unwrap().set_value(1).unwrap();
        let err = command.execute_scalar().unwrap_err();
        assert!(err.is_no_recorded_result(), "{err:?}");
    }

    #[rstest]
    fn test_properties_round_trip() {
        let (proxy, _cache) = recording_proxy();
        let connection = SqlConnectionClient::new(proxy).unwrap();
        let command = connection.create_command().unwrap();

        command.set_timeout(5).unwrap();
        command.set_command_type(CommandType::StoredProcedure).unwrap();
        command.set_updated_row_source(UpdateRowSource::None).unwrap();

        assert_eq!(command.timeout().unwrap(), 5);
        assert_eq!(command.command_type().unwrap(), CommandType::StoredProcedure);
        assert_eq!(command.updated_row_source().unwrap(), UpdateRowSource::None);
        assert_eq!(command.connection().unwrap(), Some(connection.id()));

        command.set_connection(None).unwrap();
        assert_eq!(command.connection().unwrap(), None);
    }

    #[rstest]
    fn test_drop_releases_handle() {
        let (proxy, _cache) = recording_proxy();
        let connection = SqlConnectionClient::new(proxy.clone()).unwrap();
        let command = connection.create_command().unwrap();
        let id = command.id();
        drop(command);

        assert!(matches!(
            proxy.get_command_text(id),
            Err(ProtocolError::HandleNotFound { .. })
        ));
    }

    #[rstest]
    fn test_drop_after_connection_dispose_is_quiet() {
        let (proxy, _cache) = recording_proxy();
        let connection = SqlConnectionClient::new(proxy).unwrap();
        let command = connection.create_command().unwrap();
        connection.dispose().unwrap();

        assert!(matches!(
            command.text(),
            Err(ClientError::Protocol(ProtocolError::HandleNotFound { .. }))
        ));
        drop(command);
    }
}
