//! Executed-query criteria and their canonical fingerprint.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::protocol::{CommandType, ParameterDirection};
use crate::value::{DbType, Value};

/// One parameter as it stood when the command executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCriteria {
    pub name: String,
    pub value: Value,
    pub db_type: DbType,
    #[serde(default)]
    pub direction: ParameterDirection,
    #[serde(default)]
    pub size: i32,
}

/// Everything needed to run a command again, or to find its recorded result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCriteria {
    pub command_text: String,
    pub command_type: CommandType,
    /// Seconds; zero means no limit.
    #[serde(default)]
    pub command_timeout: i32,
    pub parameters: Vec<ParameterCriteria>,
}

impl QueryCriteria {
    /// Criteria for a parameterless text command.
    pub fn text(command_text: impl Into<String>) -> Self {
        Self {
            command_text: command_text.into(),
            command_type: CommandType::Text,
            command_timeout: 30,
            parameters: Vec::new(),
        }
    }

    /// Builder-style helper used by tests and the CLI.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let db_type = if value.is_null() {
            DbType::default()
        } else {
            value.inferred_db_type()
        };
        self.parameters.push(ParameterCriteria {
            name: name.into(),
            db_type,
            value,
            direction: ParameterDirection::Input,
            size: 0,
        });
        self
    }

    /// Canonical fingerprint of this query.
    ///
    /// Covers the command text, the command type, and the ordered
    /// `(name, value, db_type)` of every parameter. Parameter order matters:
    /// the same parameters supplied in a different order produce a different
    /// fingerprint. Timeout, direction, and size do not participate.
    pub fn fingerprint(&self) -> Fingerprint {
        #[derive(Serialize)]
        struct Canonical<'a> {
            text: &'a str,
            command_type: CommandType,
            parameters: Vec<(&'a str, &'a Value, DbType)>,
        }

        let canonical = Canonical {
            text: &self.command_text,
            command_type: self.command_type,
            parameters: self
                .parameters
                .iter()
                .map(|p| (p.name.as_str(), &p.value, p.db_type))
                .collect(),
        };
        // Serializing a struct of strings, enums and Values cannot fail; a
        // non-finite float becomes null, which only merges NaN with NULL.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Fingerprint(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Hex-encoded SHA-256 over the canonical form of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and tables.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> QueryCriteria {
        QueryCriteria::text("SELECT * FROM test WHERE id = @id AND name = @name")
            .with_parameter("@id", 1i64)
            .with_parameter("@name", "Bob")
    }

    #[test]
    fn test_identical_criteria_share_fingerprint() {
        assert_eq!(lookup().fingerprint(), lookup().fingerprint());
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = lookup().fingerprint();
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 12);
    }

    #[test]
    fn test_parameter_order_changes_fingerprint() {
        let reordered = QueryCriteria::text("SELECT * FROM test WHERE id = @id AND name = @name")
            .with_parameter("@name", "Bob")
            .with_parameter("@id", 1i64);
        assert_ne!(lookup().fingerprint(), reordered.fingerprint());
    }

    #[test]
    fn test_value_and_type_participate() {
        let other_value = QueryCriteria::text("SELECT * FROM test WHERE id = @id AND name = @name")
            .with_parameter("@id", 2i64)
            .with_parameter("@name", "Bob");
        assert_ne!(lookup().fingerprint(), other_value.fingerprint());

        let mut other_type = lookup();
        other_type.parameters[0].db_type = DbType::Int64;
        assert_ne!(lookup().fingerprint(), other_type.fingerprint());
    }

    #[test]
    fn test_timeout_and_direction_do_not_participate() {
        let mut tweaked = lookup();
        tweaked.command_timeout = 5;
        tweaked.parameters[0].direction = ParameterDirection::InputOutput;
        tweaked.parameters[1].size = 200;
        assert_eq!(lookup().fingerprint(), tweaked.fingerprint());
    }

    #[test]
    fn test_command_type_participates() {
        let mut table_direct = QueryCriteria::text("test");
        table_direct.command_type = CommandType::TableDirect;
        assert_ne!(QueryCriteria::text("test").fingerprint(), table_direct.fingerprint());
    }
}
