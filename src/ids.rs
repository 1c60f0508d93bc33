//! Opaque handles for server-side driver objects.
//!
//! A handle carries no data beyond identity. Each one wraps a random v4 UUID so
//! that a stale handle from a disposed object can never alias a live one.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocate a fresh, never-before-seen handle.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Handle for a remote connection.
    ConnectionId
);
define_id!(
    /// Handle for a remote command.
    CommandId
);
define_id!(
    /// Handle for a parameter created by a command.
    ParameterId
);
define_id!(
    /// Handle for an open data reader.
    DataReaderId
);
define_id!(
    /// Handle for a transaction begun on a connection.
    TransactionId
);

/// Kind of object a handle refers to, used in not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleKind {
    Connection,
    Command,
    Parameter,
    DataReader,
    Transaction,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Connection => "connection",
            HandleKind::Command => "command",
            HandleKind::Parameter => "parameter",
            HandleKind::DataReader => "data reader",
            HandleKind::Transaction => "transaction",
        };
        f.write_str(name)
    }
}
