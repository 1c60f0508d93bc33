//! SQLite backing connection via `rusqlite`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use tracing::debug;

use super::{BackingConnection, BackingError};
use crate::cache::{Column, QueryCriteria, Table};
use crate::protocol::CommandType;
use crate::value::{DbType, Value};

const BACKEND: &str = "sqlite";

/// A SQLite connection that stays open for as long as any clone is alive.
///
/// Clones share the same underlying connection, which is what lets an
/// in-memory database be seeded once and then used by a proxy and a recorder.
#[derive(Clone)]
pub struct SqliteBacking {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteBacking {
    pub fn open_in_memory() -> Result<Self, BackingError> {
        let connection = Connection::open_in_memory().map_err(|e| BackingError::OpenFailed {
            target: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_connection(connection))
    }

    pub fn open(path: &Path) -> Result<Self, BackingError> {
        let connection = Connection::open(path).map_err(|e| BackingError::OpenFailed {
            target: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_connection(connection))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Run a script of one or more statements, e.g. schema setup and seed data.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackingError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackingError> {
        self.connection.lock().map_err(|_| BackingError::Lock)
    }

    /// Lock, apply the timeout, and prepare the statement `criteria` describes.
    fn with_statement<T>(
        &self,
        criteria: &QueryCriteria,
        run: impl FnOnce(&mut Statement<'_>) -> Result<T, BackingError>,
    ) -> Result<T, BackingError> {
        let sql = statement_text(criteria)?;
        let connection = self.lock()?;
        if criteria.command_timeout > 0 {
            connection.busy_timeout(Duration::from_secs(criteria.command_timeout as u64))?;
        }
        debug!(backend = BACKEND, sql = %sql, parameters = criteria.parameters.len(), "Executing");
        let mut statement = connection.prepare(&sql)?;
        bind_parameters(&mut statement, criteria)?;
        run(&mut statement)
    }
}

impl BackingConnection for SqliteBacking {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn execute_non_query(&self, criteria: &QueryCriteria) -> Result<i64, BackingError> {
        self.with_statement(criteria, |statement| Ok(statement.raw_execute()? as i64))
    }

    fn execute_reader(&self, criteria: &QueryCriteria) -> Result<Table, BackingError> {
        self.with_statement(criteria, materialize)
    }
}

fn statement_text(criteria: &QueryCriteria) -> Result<String, BackingError> {
    match criteria.command_type {
        CommandType::Text => Ok(criteria.command_text.clone()),
        CommandType::TableDirect => Ok(format!("SELECT * FROM {}", criteria.command_text)),
        CommandType::StoredProcedure => Err(BackingError::Unsupported {
            backend: BACKEND,
            feature: "stored procedures".to_string(),
        }),
    }
}

/// Bind input parameters: by name when named, otherwise by position.
///
/// Names are tried as given and then with each SQLite prefix, so a parameter
/// called `id` binds to `@id`, `:id` or `$id`. Named parameters the statement
/// does not mention are skipped, matching how ADO-style drivers tolerate
/// surplus parameters.
fn bind_parameters(statement: &mut Statement<'_>, criteria: &QueryCriteria) -> Result<(), BackingError> {
    let mut position = 0;
    for parameter in criteria.parameters.iter().filter(|p| p.direction.is_bound()) {
        position += 1;
        let index = if parameter.name.is_empty() {
            Some(position)
        } else {
            named_index(statement, &parameter.name)?
        };
        match index {
            Some(index) => statement.raw_bind_parameter(index, to_sql_value(&parameter.value))?,
            None => debug!(parameter = %parameter.name, "Parameter not referenced by statement; skipped"),
        }
    }
    Ok(())
}

fn named_index(statement: &Statement<'_>, name: &str) -> Result<Option<usize>, BackingError> {
    if let Some(index) = statement.parameter_index(name)? {
        return Ok(Some(index));
    }
    let bare = name.trim_start_matches(['@', ':', '$']);
    for prefix in ["@", ":", "$"] {
        if let Some(index) = statement.parameter_index(&format!("{prefix}{bare}"))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(*b as i64),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Read every row of a bound statement into a `Table`.
///
/// Columns keep their order and duplicate names. Expression columns have no
/// declared type, so their type is taken from the first non-null cell.
fn materialize(statement: &mut Statement<'_>) -> Result<Table, BackingError> {
    let columns: Vec<Column> = statement
        .columns()
        .iter()
        .map(|column| {
            let declared = column.decl_type().unwrap_or("");
            let db_type = if declared.is_empty() {
                DbType::Object
            } else {
                DbType::from_declared(declared)
            };
            Column::new(column.name(), db_type, declared)
        })
        .collect();
    let field_count = columns.len();
    let mut table = Table::new(columns);

    let mut rows = statement.raw_query();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(field_count);
        for ordinal in 0..field_count {
            cells.push(from_value_ref(row.get_ref(ordinal)?));
        }
        table.rows.push(cells);
    }

    for (ordinal, column) in table.columns.iter_mut().enumerate() {
        if column.db_type != DbType::Object {
            continue;
        }
        if let Some(value) = table.rows.iter().map(|row| &row[ordinal]).find(|v| !v.is_null()) {
            column.db_type = value.inferred_db_type();
        }
    }
    Ok(table)
}
