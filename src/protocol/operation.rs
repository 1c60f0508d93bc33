//! Retry classification for command operations.
//!
//! The transport that carries protocol calls may retry a call that failed in
//! transit. That is only sound for operations whose repetition is harmless;
//! anything that allocates a handle or executes SQL must surface the failure.

use serde::{Deserialize, Serialize};

/// A command-surface protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    GetCommandText,
    SetCommandText,
    GetCommandTimeout,
    SetCommandTimeout,
    GetCommandType,
    SetCommandType,
    GetCommandConnection,
    SetCommandConnection,
    GetTransaction,
    SetTransaction,
    GetUpdatedRowSource,
    SetUpdatedRowSource,
    CreateParameter,
    Prepare,
    Cancel,
    DisposeCommand,
    ExecuteNonQuery,
    ExecuteScalar,
    ExecuteReader,
}

impl Operation {
    /// Whether the transport may transparently retry this operation.
    pub fn is_idempotent(&self) -> bool {
        !matches!(
            self,
            Operation::CreateParameter
                | Operation::ExecuteNonQuery
                | Operation::ExecuteScalar
                | Operation::ExecuteReader
        )
    }
}
