//! Data reader surface over materialized results.

use tracing::debug;

use super::executor::CommandExecutor;
use super::registry::ReaderEntry;
use super::SqlServer;
use crate::ids::DataReaderId;
use crate::protocol::{CommandBehavior, ProtocolError, ProtocolResult, RemoteSqlConnection, RemoteSqlDataReader};
use crate::value::{DbType, Value};

impl ReaderEntry {
    /// Rows the behavior lets this reader return.
    fn visible_rows(&self) -> usize {
        match self.behavior {
            CommandBehavior::SchemaOnly => 0,
            CommandBehavior::SingleRow => self.table.rows.len().min(1),
            _ => self.table.rows.len(),
        }
    }

    fn ensure_open(&self, operation: &str) -> ProtocolResult<()> {
        if self.closed {
            return Err(ProtocolError::invalid_operation(format!(
                "Invalid attempt to call {operation} when reader is closed"
            )));
        }
        Ok(())
    }

    fn ensure_ordinal(&self, ordinal: usize) -> ProtocolResult<()> {
        let count = self.table.field_count();
        if ordinal >= count {
            return Err(ProtocolError::IndexOutOfRange { index: ordinal, count });
        }
        Ok(())
    }

    fn current_row(&self) -> ProtocolResult<&[Value]> {
        self.ensure_open("a value getter")?;
        match self.position {
            Some(index) if index < self.visible_rows() => Ok(&self.table.rows[index]),
            _ => Err(ProtocolError::invalid_operation(
                "Invalid attempt to read when no data is present",
            )),
        }
    }

    fn cell(&self, ordinal: usize) -> ProtocolResult<&Value> {
        let row = self.current_row()?;
        self.ensure_ordinal(ordinal)?;
        row.get(ordinal).ok_or(ProtocolError::IndexOutOfRange {
            index: ordinal,
            count: row.len(),
        })
    }
}

impl<E: CommandExecutor> RemoteSqlDataReader for SqlServer<E> {
    fn read(&self, reader: DataReaderId) -> ProtocolResult<bool> {
        self.registry.readers.update(reader, |entry| {
            entry.ensure_open("Read")?;
            let visible = entry.visible_rows();
            let next = entry.position.map_or(0, |current| (current + 1).min(visible));
            entry.position = Some(next);
            Ok(next < visible)
        })
    }

    /// Results hold a single result set, so there is never a next one.
    fn next_result(&self, reader: DataReaderId) -> ProtocolResult<bool> {
        self.registry.readers.update(reader, |entry| {
            entry.ensure_open("NextResult")?;
            entry.position = Some(entry.visible_rows());
            Ok(false)
        })
    }

    fn get_field_count(&self, reader: DataReaderId) -> ProtocolResult<usize> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_open("FieldCount")?;
            Ok(entry.table.field_count())
        })?
    }

    fn get_ordinal(&self, reader: DataReaderId, name: &str) -> ProtocolResult<usize> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_open("GetOrdinal")?;
            entry
                .table
                .ordinal(name)
                .ok_or_else(|| ProtocolError::invalid_argument(format!("No column named '{name}'")))
        })?
    }

    fn get_name(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<String> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_ordinal(ordinal)?;
            Ok(entry.table.columns[ordinal].name.clone())
        })?
    }

    fn get_data_type_name(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<String> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_ordinal(ordinal)?;
            Ok(entry.table.columns[ordinal].data_type_name.clone())
        })?
    }

    fn get_field_type(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<DbType> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_ordinal(ordinal)?;
            Ok(entry.table.columns[ordinal].db_type)
        })?
    }

    fn get_reader_value(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<Value> {
        self.registry.readers.read(reader, |entry| entry.cell(ordinal).cloned())?
    }

    fn get_reader_values(&self, reader: DataReaderId) -> ProtocolResult<Vec<Value>> {
        self.registry
            .readers
            .read(reader, |entry| entry.current_row().map(<[Value]>::to_vec))?
    }

    fn is_db_null(&self, reader: DataReaderId, ordinal: usize) -> ProtocolResult<bool> {
        self.registry.readers.read(reader, |entry| entry.cell(ordinal).map(Value::is_null))?
    }

    fn get_records_affected(&self, reader: DataReaderId) -> ProtocolResult<i64> {
        self.registry.readers.read(reader, |entry| entry.records_affected)
    }

    fn get_depth(&self, reader: DataReaderId) -> ProtocolResult<usize> {
        self.registry.readers.read(reader, |entry| {
            entry.ensure_open("Depth")?;
            Ok(0)
        })?
    }

    fn is_closed(&self, reader: DataReaderId) -> ProtocolResult<bool> {
        self.registry.readers.read(reader, |entry| entry.closed)
    }

    /// With `CloseConnection`, the first close also closes the connection.
    fn close_reader(&self, reader: DataReaderId) -> ProtocolResult<()> {
        let (was_open, behavior, connection) = self.registry.readers.update(reader, |entry| {
            let was_open = !entry.closed;
            entry.closed = true;
            Ok((was_open, entry.behavior, entry.connection))
        })?;
        if was_open && behavior == CommandBehavior::CloseConnection {
            if let Some(connection) = connection {
                self.close(connection)?;
            }
        }
        debug!(reader = %reader, "Closed reader");
        Ok(())
    }

    fn dispose_reader(&self, reader: DataReaderId) -> ProtocolResult<()> {
        self.close_reader(reader)?;
        self.registry.readers.remove(reader)?;
        Ok(())
    }
}
