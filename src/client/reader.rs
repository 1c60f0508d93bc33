use std::fmt;

use super::{report_drop_dispose, ClientError, ClientResult, Remote};
use crate::ids::{DataReaderId, HandleKind};
use crate::value::{DatabaseValue, DbType, Value};

/// Forward-only cursor over the rows of an executed command.
///
/// Typed getters fail with [`ClientError::InvalidCast`] when the cell holds a
/// different type, including when it is null; check [`is_db_null`] first.
///
/// [`is_db_null`]: SqlDataReaderClient::is_db_null
pub struct SqlDataReaderClient {
    id: DataReaderId,
    remote: Remote,
    disposed: bool,
}

impl SqlDataReaderClient {
    pub(crate) fn from_handle(id: DataReaderId, remote: Remote) -> Self {
        Self {
            id,
            remote,
            disposed: false,
        }
    }

    pub fn id(&self) -> DataReaderId {
        self.id
    }

    /// Advance to the next row; `false` once the rows are exhausted.
    pub fn read(&self) -> ClientResult<bool> {
        Ok(self.remote.read(self.id)?)
    }

    pub fn next_result(&self) -> ClientResult<bool> {
        Ok(self.remote.next_result(self.id)?)
    }

    pub fn field_count(&self) -> ClientResult<usize> {
        Ok(self.remote.get_field_count(self.id)?)
    }

    pub fn ordinal(&self, name: &str) -> ClientResult<usize> {
        Ok(self.remote.get_ordinal(self.id, name)?)
    }

    pub fn name(&self, ordinal: usize) -> ClientResult<String> {
        Ok(self.remote.get_name(self.id, ordinal)?)
    }

    pub fn data_type_name(&self, ordinal: usize) -> ClientResult<String> {
        Ok(self.remote.get_data_type_name(self.id, ordinal)?)
    }

    pub fn field_type(&self, ordinal: usize) -> ClientResult<DbType> {
        Ok(self.remote.get_field_type(self.id, ordinal)?)
    }

    pub fn value(&self, ordinal: usize) -> ClientResult<Value> {
        Ok(self.remote.get_reader_value(self.id, ordinal)?)
    }

    /// Every cell of the current row.
    pub fn values(&self) -> ClientResult<Vec<Value>> {
        Ok(self.remote.get_reader_values(self.id)?)
    }

    pub fn is_db_null(&self, ordinal: usize) -> ClientResult<bool> {
        Ok(self.remote.is_db_null(self.id, ordinal)?)
    }

    pub fn records_affected(&self) -> ClientResult<i64> {
        Ok(self.remote.get_records_affected(self.id)?)
    }

    pub fn depth(&self) -> ClientResult<usize> {
        Ok(self.remote.get_depth(self.id)?)
    }

    pub fn is_closed(&self) -> ClientResult<bool> {
        Ok(self.remote.is_closed(self.id)?)
    }

    pub fn close(&self) -> ClientResult<()> {
        Ok(self.remote.close_reader(self.id)?)
    }

    pub fn dispose(mut self) -> ClientResult<()> {
        self.disposed = true;
        Ok(self.remote.dispose_reader(self.id)?)
    }

    fn typed<T>(
        &self,
        ordinal: usize,
        expected: &'static str,
        extract: impl FnOnce(&Value) -> Option<T>,
    ) -> ClientResult<T> {
        let value = self.value(ordinal)?;
        extract(&value).ok_or(ClientError::InvalidCast {
            ordinal,
            expected,
            found: value.type_name(),
        })
    }

    pub fn get_string(&self, ordinal: usize) -> ClientResult<String> {
        self.typed(ordinal, "text", Value::as_string)
    }

    pub fn get_i64(&self, ordinal: usize) -> ClientResult<i64> {
        self.typed(ordinal, "integer", Value::as_i64)
    }

    /// Integers outside the `i32` range are a cast failure, not a truncation.
    pub fn get_i32(&self, ordinal: usize) -> ClientResult<i32> {
        self.typed(ordinal, "32-bit integer", |value| {
            value.as_i64().and_then(|i| i32::try_from(i).ok())
        })
    }

    pub fn get_f64(&self, ordinal: usize) -> ClientResult<f64> {
        self.typed(ordinal, "real", Value::as_f64)
    }

    pub fn get_bool(&self, ordinal: usize) -> ClientResult<bool> {
        self.typed(ordinal, "boolean", Value::as_bool)
    }

    pub fn get_bytes(&self, ordinal: usize) -> ClientResult<Vec<u8>> {
        self.typed(ordinal, "blob", Value::as_bytes)
    }
}

impl fmt::Debug for SqlDataReaderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlDataReaderClient").field("id", &self.id).finish()
    }
}

impl Drop for SqlDataReaderClient {
    fn drop(&mut self) {
        if !self.disposed {
            report_drop_dispose(HandleKind::DataReader, self.id, self.remote.dispose_reader(self.id));
        }
    }
}
