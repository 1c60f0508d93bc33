//! Client-side adapters over the remote capability protocol.
//!
//! Each adapter holds only a handle and an `Arc<dyn RemoteSqlClient>`; the
//! objects themselves live on the serving side. Adapters add the checks that
//! must happen before a call goes out (parameter ownership, blank names,
//! destination bounds, reader casts).
//!
//! Connection, command, reader and transaction adapters dispose their handle
//! when dropped. A failed drop-time dispose is logged, never raised.

mod command;
mod connection;
mod parameter;
mod parameter_set;
mod reader;
mod transaction;

pub use command::SqlCommandClient;
pub use connection::SqlConnectionClient;
pub use parameter::SqlParameterClient;
pub use parameter_set::{ParameterEnumerator, SqlParameterSetClient};
pub use reader::SqlDataReaderClient;
pub use transaction::SqlTransactionClient;

use std::fmt::Display;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::CacheError;
use crate::ids::{CommandId, HandleKind, ParameterId};
use crate::protocol::{ProtocolError, ProtocolResult, RemoteSqlClient};

/// The protocol endpoint adapters talk to.
pub type Remote = Arc<dyn RemoteSqlClient>;

/// Errors raised by client adapters.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Parameter {parameter} was created by command {owner} and cannot be used with command {command}")]
    OwnershipViolation {
        parameter: ParameterId,
        owner: CommandId,
        command: CommandId,
    },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Index {index} is out of range for a collection of {count}")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Column {ordinal} holds {found}, which cannot be read as {expected}")]
    InvalidCast {
        ordinal: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ClientError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ClientError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether replay failed because the statement was never recorded.
    pub fn is_no_recorded_result(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol(ProtocolError::Cache(CacheError::NoRecordedResult { .. }))
        )
    }

    pub fn is_ownership_violation(&self) -> bool {
        matches!(
            self,
            ClientError::OwnershipViolation { .. } | ClientError::Protocol(ProtocolError::OwnershipViolation { .. })
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Report the outcome of a dispose issued from `Drop`.
///
/// A handle that is already gone was released by a cascade (e.g. its
/// connection was disposed first), which is expected.
fn report_drop_dispose(kind: HandleKind, id: impl Display, result: ProtocolResult<()>) {
    match result {
        Ok(()) => debug!(kind = %kind, id = %id, "Disposed on drop"),
        Err(ProtocolError::HandleNotFound { .. }) => {
            debug!(kind = %kind, id = %id, "Already released before drop")
        }
        Err(err) => warn!(kind = %kind, id = %id, error = %err, "Failed to dispose on drop"),
    }
}
