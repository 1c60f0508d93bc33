//! PostgreSQL backing connection via the synchronous `postgres` client.
//!
//! Parameters are bound positionally (`$1`, `$2`, ...) in collection order;
//! PostgreSQL has no named placeholders. Each value is converted to the Rust
//! type matching the parameter type the server inferred for its placeholder.

use std::sync::{Mutex, MutexGuard};

use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls, Row, Statement};
use tracing::debug;

use super::{BackingConnection, BackingError};
use crate::cache::{Column, QueryCriteria, Table};
use crate::protocol::CommandType;
use crate::value::{DbType, Value};

const BACKEND: &str = "postgres";

/// PostgreSQL backend.
///
/// The client is not `Sync`; the mutex serializes every use of it.
pub struct PostgresBacking {
    client: Mutex<Client>,
}

impl PostgresBacking {
    /// Connect using a libpq-style or URL connection string.
    ///
    /// # Example
    /// ```no_run
    /// use sql_replay::backing::PostgresBacking;
    /// let backing = PostgresBacking::connect("host=localhost user=postgres dbname=app")?;
    /// # Ok::<(), sql_replay::backing::BackingError>(())
    /// ```
    pub fn connect(connection_string: &str) -> Result<Self, BackingError> {
        let client = Client::connect(connection_string, NoTls).map_err(|e| BackingError::OpenFailed {
            target: redact(connection_string),
            message: e.to_string(),
        })?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Client>, BackingError> {
        self.client.lock().map_err(|_| BackingError::Lock)
    }

    fn prepare(&self, client: &mut Client, criteria: &QueryCriteria) -> Result<Statement, BackingError> {
        let sql = match criteria.command_type {
            CommandType::Text => criteria.command_text.clone(),
            CommandType::TableDirect => format!("SELECT * FROM {}", criteria.command_text),
            CommandType::StoredProcedure => {
                return Err(BackingError::Unsupported {
                    backend: BACKEND,
                    feature: "stored procedures through execute; use CALL text".to_string(),
                });
            }
        };
        if criteria.command_timeout > 0 {
            client.batch_execute(&format!(
                "SET statement_timeout = {}",
                i64::from(criteria.command_timeout) * 1000
            ))?;
        }
        debug!(backend = BACKEND, sql = %sql, parameters = criteria.parameters.len(), "Executing");
        Ok(client.prepare(&sql)?)
    }
}

impl BackingConnection for PostgresBacking {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn execute_non_query(&self, criteria: &QueryCriteria) -> Result<i64, BackingError> {
        let mut client = self.lock()?;
        let statement = self.prepare(&mut client, criteria)?;
        let params = bound_values(criteria, statement.params())?;
        let refs = as_refs(&params);
        let affected = client.execute(&statement, &refs)?;
        Ok(affected as i64)
    }

    fn execute_reader(&self, criteria: &QueryCriteria) -> Result<Table, BackingError> {
        let mut client = self.lock()?;
        let statement = self.prepare(&mut client, criteria)?;
        let columns: Vec<Column> = statement
            .columns()
            .iter()
            .map(|c| Column::new(c.name(), DbType::from_declared(c.type_().name()), c.type_().name()))
            .collect();

        let params = bound_values(criteria, statement.params())?;
        let refs = as_refs(&params);
        let rows = client.query(&statement, &refs)?;

        let mut table = Table::new(columns);
        for row in &rows {
            table.rows.push(decode_row(row)?);
        }
        Ok(table)
    }
}

fn bound_values(criteria: &QueryCriteria, types: &[Type]) -> Result<Vec<Box<dyn ToSql + Sync>>, BackingError> {
    criteria
        .parameters
        .iter()
        .filter(|p| p.direction.is_bound())
        .enumerate()
        .map(|(index, p)| {
            let ty = types.get(index).cloned().unwrap_or(Type::UNKNOWN);
            to_sql(index, &p.value, &ty, p.db_type)
        })
        .collect()
}

fn as_refs(params: &[Box<dyn ToSql + Sync>]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref()).collect()
}

/// Convert `value` for a placeholder of type `ty`.
///
/// Integers are narrowed with a range check. Types the server could not infer
/// fall back to the parameter's declared `DbType`.
fn to_sql(index: usize, value: &Value, ty: &Type, declared: DbType) -> Result<Box<dyn ToSql + Sync>, BackingError> {
    let out_of_range = || BackingError::ParameterOutOfRange {
        index,
        value: value.to_string(),
        type_name: ty.name().to_string(),
    };
    let target = match DbType::from_declared(ty.name()) {
        DbType::Object => declared,
        inferred => inferred,
    };
    Ok(match (value, target) {
        (Value::Null, target) => typed_null(target),
        (Value::Integer(i), DbType::Int16) => Box::new(i16::try_from(*i).map_err(|_| out_of_range())?),
        (Value::Integer(i), DbType::Int32) => Box::new(i32::try_from(*i).map_err(|_| out_of_range())?),
        (Value::Integer(i), DbType::Single) => Box::new(*i as f32),
        (Value::Integer(i), DbType::Double) => Box::new(*i as f64),
        (Value::Integer(i), _) => Box::new(*i),
        (Value::Real(r), DbType::Single) => Box::new(*r as f32),
        (Value::Real(r), _) => Box::new(*r),
        (Value::Boolean(b), _) => Box::new(*b),
        (Value::Text(s), _) => Box::new(s.clone()),
        (Value::Blob(b), _) => Box::new(b.clone()),
    })
}

/// A NULL the driver will accept for a placeholder of the given type.
fn typed_null(target: DbType) -> Box<dyn ToSql + Sync> {
    match target {
        DbType::Boolean => Box::new(Option::<bool>::None),
        DbType::Int16 => Box::new(Option::<i16>::None),
        DbType::Int32 => Box::new(Option::<i32>::None),
        DbType::Int64 => Box::new(Option::<i64>::None),
        DbType::Single => Box::new(Option::<f32>::None),
        DbType::Double => Box::new(Option::<f64>::None),
        DbType::Binary => Box::new(Option::<Vec<u8>>::None),
        _ => Box::new(Option::<String>::None),
    }
}

fn decode_row(row: &Row) -> Result<Vec<Value>, BackingError> {
    let mut cells = Vec::with_capacity(row.len());
    for (ordinal, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(ordinal)?.map(Value::Boolean)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(ordinal)?.map(|v| Value::Integer(v.into()))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(ordinal)?.map(|v| Value::Integer(v.into()))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(ordinal)?.map(Value::Integer)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(ordinal)?.map(|v| Value::Real(v.into()))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(ordinal)?.map(Value::Real)
        } else if *ty == Type::BYTEA {
            row.try_get::<_, Option<Vec<u8>>>(ordinal)?.map(Value::Blob)
        } else {
            row.try_get::<_, Option<String>>(ordinal)
                .map_err(|_| BackingError::Conversion {
                    column: column.name().to_string(),
                    type_name: ty.name().to_string(),
                })?
                .map(Value::Text)
        };
        cells.push(value.unwrap_or(Value::Null));
    }
    Ok(cells)
}

/// Strip a password from a URL-style connection string for error messages.
fn redact(connection_string: &str) -> String {
    let Some((scheme, rest)) = connection_string.split_once("://") else {
        return connection_string.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or("");
            format!("{scheme}://{user}:***@{host}")
        }
        None => connection_string.to_string(),
    }
}
