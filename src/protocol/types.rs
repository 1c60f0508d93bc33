//! Plain enums shared by every protocol surface.

use serde::{Deserialize, Serialize};

/// How a command's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommandType {
    #[default]
    Text,
    StoredProcedure,
    /// The text names a table whose full contents are returned.
    TableDirect,
}

/// How command results are applied back to a row source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateRowSource {
    None,
    OutputParameters,
    FirstReturnedRecord,
    #[default]
    Both,
}

/// Flags controlling how execute-reader behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandBehavior {
    #[default]
    Default,
    SingleResult,
    /// Column information only; the reader yields no rows.
    SchemaOnly,
    KeyInfo,
    /// The reader yields at most one row.
    SingleRow,
    SequentialAccess,
    /// Closing the reader also closes its connection.
    CloseConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether a value for this direction is sent to the database.
    pub fn is_bound(&self) -> bool {
        matches!(self, ParameterDirection::Input | ParameterDirection::InputOutput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[default]
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

/// Lifecycle of a command that has not been disposed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandLifecycle {
    #[default]
    Created,
    Prepared,
}
