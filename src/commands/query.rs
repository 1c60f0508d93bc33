//! Statement arguments and client-side execution shared by `record` and `replay`.

use clap::ValueEnum;
use serde::Serialize;

use crate::cache::QueryKind;
use crate::client::{ClientResult, Remote, SqlConnectionClient, SqlDataReaderClient};
use crate::output::render_grid;
use crate::value::Value;

/// Which execute call to issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecuteKind {
    /// Execute a reader and collect every row
    #[default]
    Rows,
    /// Execute a scalar (first column of the first row)
    Scalar,
    /// Execute a non-query and report rows affected
    NonQuery,
}

impl From<ExecuteKind> for QueryKind {
    fn from(kind: ExecuteKind) -> Self {
        match kind {
            ExecuteKind::Rows => QueryKind::Rows,
            ExecuteKind::Scalar => QueryKind::Scalar,
            ExecuteKind::NonQuery => QueryKind::NonQuery,
        }
    }
}

/// A `name=value` parameter given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamArg {
    pub name: String,
    pub value: Value,
}

/// Parse `name=value`.
///
/// The value is `null`, `true`/`false`, an integer, a real, or text. Wrap it in
/// single quotes to force text (`--param "code='007'"`).
pub fn parse_param(raw: &str) -> Result<ParamArg, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Parameter name is empty in '{raw}'"));
    }
    Ok(ParamArg {
        name: name.to_string(),
        value: parse_value(value),
    })
}

fn parse_value(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Value::Text(raw[1..raw.len() - 1].to_string());
    }
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(r) = raw.parse::<f64>() {
        if r.is_finite() {
            return Value::Real(r);
        }
    }
    Value::Text(raw.to_string())
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum QueryOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Scalar {
        value: Value,
    },
    RowCount {
        rows_affected: i64,
    },
}

impl QueryOutcome {
    pub fn to_table(&self) -> String {
        match self {
            QueryOutcome::Rows { columns, rows } if rows.is_empty() => {
                format!("No rows ({} columns: {})", columns.len(), columns.join(", "))
            }
            QueryOutcome::Rows { columns, rows } => {
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| row.iter().map(Value::to_string).collect())
                    .collect();
                let mut table = render_grid(columns, &cells);
                table.push_str(&format!("\n({} rows)", rows.len()));
                table
            }
            QueryOutcome::Scalar { value } => value.to_string(),
            QueryOutcome::RowCount { rows_affected } => format!("{} rows affected", rows_affected),
        }
    }
}

/// Run one statement through `remote` the way an application would: open a
/// connection, create a command, add the parameters in order and execute.
pub fn run_query(remote: Remote, sql: &str, params: &[ParamArg], kind: ExecuteKind) -> ClientResult<QueryOutcome> {
    let connection = SqlConnectionClient::new(remote)?;
    connection.open()?;
    let command = connection.create_command()?;
    command.set_text(sql)?;
    let parameters = command.parameters();
    for param in params {
        parameters.add_with_value(&param.name, param.value.clone())?;
    }

    let outcome = match kind {
        ExecuteKind::Rows => read_all(&command.execute_reader()?)?,
        ExecuteKind::Scalar => QueryOutcome::Scalar {
            value: command.execute_scalar()?,
        },
        ExecuteKind::NonQuery => QueryOutcome::RowCount {
            rows_affected: command.execute_non_query()?,
        },
    };
    Ok(outcome)
}

fn read_all(reader: &SqlDataReaderClient) -> ClientResult<QueryOutcome> {
    let columns = (0..reader.field_count()?)
        .map(|ordinal| reader.name(ordinal))
        .collect::<ClientResult<Vec<_>>>()?;
    let mut rows = Vec::new();
    while reader.read()? {
        rows.push(reader.values()?);
    }
    Ok(QueryOutcome::Rows { columns, rows })
}
