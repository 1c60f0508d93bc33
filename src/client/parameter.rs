use std::fmt;

use super::{ClientResult, Remote};
use crate::ids::{CommandId, ParameterId};
use crate::protocol::ParameterDirection;
use crate::value::{DbType, Value};

/// A view of one parameter, bound to the command that created it.
///
/// Views are cheap and recreatable: fetching the same parameter twice gives two
/// equal views. Parameters are released with their command, so dropping a
/// view releases nothing.
#[derive(Clone)]
pub struct SqlParameterClient {
    id: ParameterId,
    command: CommandId,
    remote: Remote,
}

impl SqlParameterClient {
    pub(crate) fn from_handle(id: ParameterId, command: CommandId, remote: Remote) -> Self {
        Self { id, command, remote }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    /// The command that created this parameter.
    pub fn command(&self) -> CommandId {
        self.command
    }

    pub fn name(&self) -> ClientResult<String> {
        Ok(self.remote.get_parameter_name(self.id)?)
    }

    pub fn set_name(&self, value: &str) -> ClientResult<()> {
        Ok(self.remote.set_parameter_name(self.id, value)?)
    }

    pub fn value(&self) -> ClientResult<Value> {
        Ok(self.remote.get_value(self.id)?)
    }

    pub fn set_value(&self, value: impl Into<Value>) -> ClientResult<()> {
        Ok(self.remote.set_value(self.id, value.into())?)
    }

    pub fn direction(&self) -> ClientResult<ParameterDirection> {
        Ok(self.remote.get_direction(self.id)?)
    }

    pub fn set_direction(&self, value: ParameterDirection) -> ClientResult<()> {
        Ok(self.remote.set_direction(self.id, value)?)
    }

    pub fn db_type(&self) -> ClientResult<DbType> {
        Ok(self.remote.get_db_type(self.id)?)
    }

    pub fn set_db_type(&self, value: DbType) -> ClientResult<()> {
        Ok(self.remote.set_db_type(self.id, value)?)
    }

    pub fn reset_db_type(&self) -> ClientResult<()> {
        Ok(self.remote.reset_db_type(self.id)?)
    }

    pub fn is_nullable(&self) -> ClientResult<bool> {
        Ok(self.remote.get_is_nullable(self.id)?)
    }

    pub fn set_is_nullable(&self, value: bool) -> ClientResult<()> {
        Ok(self.remote.set_is_nullable(self.id, value)?)
    }

    pub fn size(&self) -> ClientResult<i32> {
        Ok(self.remote.get_size(self.id)?)
    }

    pub fn set_size(&self, value: i32) -> ClientResult<()> {
        Ok(self.remote.set_size(self.id, value)?)
    }

    pub fn precision(&self) -> ClientResult<u8> {
        Ok(self.remote.get_precision(self.id)?)
    }

    pub fn set_precision(&self, value: u8) -> ClientResult<()> {
        Ok(self.remote.set_precision(self.id, value)?)
    }

    pub fn scale(&self) -> ClientResult<u8> {
        Ok(self.remote.get_scale(self.id)?)
    }

    pub fn set_scale(&self, value: u8) -> ClientResult<()> {
        Ok(self.remote.set_scale(self.id, value)?)
    }

    pub fn source_column(&self) -> ClientResult<String> {
        Ok(self.remote.get_source_column(self.id)?)
    }

    pub fn set_source_column(&self, value: &str) -> ClientResult<()> {
        Ok(self.remote.set_source_column(self.id, value)?)
    }
}

impl PartialEq for SqlParameterClient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.command == other.command
    }
}

impl Eq for SqlParameterClient {}

impl fmt::Debug for SqlParameterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlParameterClient")
            .field("id", &self.id)
            .field("command", &self.command)
            .finish()
    }
}
