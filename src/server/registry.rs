//! Handle registry: the only owner of server-side driver state.
//!
//! One sharded map per handle kind. Lookups run a closure against the entry
//! while its shard guard is held, so the closure must never reach into another
//! map; callers copy what they need out first and then make the next lookup.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::backing::BackingConnection;
use crate::cache::Table;
use crate::ids::{CommandId, ConnectionId, DataReaderId, HandleKind, ParameterId, TransactionId};
use crate::ledger::OwnershipLedger;
use crate::protocol::{
    CommandBehavior, CommandLifecycle, CommandType, ConnectionState, IsolationLevel, ParameterDirection,
    ProtocolError, ProtocolResult, UpdateRowSource,
};
use crate::value::{DbType, Value};

/// Default command timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT: i32 = 30;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT: i32 = 15;

pub struct ConnectionEntry {
    pub connection_string: String,
    pub timeout: i32,
    pub state: ConnectionState,
    /// Present while open through an executor that uses a live database.
    pub backing: Option<Arc<dyn BackingConnection>>,
}

impl Default for ConnectionEntry {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            state: ConnectionState::Closed,
            backing: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub text: String,
    pub timeout: i32,
    pub command_type: CommandType,
    pub connection: Option<ConnectionId>,
    /// Connection whose disposal takes this command with it.
    pub created_on: Option<ConnectionId>,
    pub transaction: Option<TransactionId>,
    pub updated_row_source: UpdateRowSource,
    pub parameters: Vec<ParameterId>,
    pub lifecycle: CommandLifecycle,
}

impl CommandEntry {
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            text: String::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            command_type: CommandType::default(),
            connection: Some(connection),
            created_on: Some(connection),
            transaction: None,
            updated_row_source: UpdateRowSource::default(),
            parameters: Vec::new(),
            lifecycle: CommandLifecycle::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterEntry {
    /// The creating command; never changes.
    pub command: CommandId,
    pub name: String,
    pub value: Value,
    pub direction: ParameterDirection,
    /// Explicitly declared type; `None` means inferred from the value.
    pub db_type: Option<DbType>,
    pub is_nullable: bool,
    pub size: i32,
    pub precision: u8,
    pub scale: u8,
    pub source_column: String,
}

impl ParameterEntry {
    pub fn new(command: CommandId) -> Self {
        Self {
            command,
            name: String::new(),
            value: Value::Null,
            direction: ParameterDirection::default(),
            db_type: None,
            is_nullable: false,
            size: 0,
            precision: 0,
            scale: 0,
            source_column: String::new(),
        }
    }

    pub fn effective_db_type(&self) -> DbType {
        match self.db_type {
            Some(db_type) => db_type,
            None if self.value.is_null() => DbType::default(),
            None => self.value.inferred_db_type(),
        }
    }
}

/// An open reader over a fully materialized result.
pub struct ReaderEntry {
    pub command: Option<CommandId>,
    pub connection: Option<ConnectionId>,
    pub table: Arc<Table>,
    pub behavior: CommandBehavior,
    /// `None` before the first read; `Some(n)` with `n == visible rows` once exhausted.
    pub position: Option<usize>,
    pub closed: bool,
    pub records_affected: i64,
}

impl ReaderEntry {
    pub fn new(
        command: CommandId,
        connection: ConnectionId,
        table: Arc<Table>,
        behavior: CommandBehavior,
    ) -> Self {
        Self {
            command: Some(command),
            connection: Some(connection),
            table,
            behavior,
            position: None,
            closed: false,
            records_affected: -1,
        }
    }
}

pub struct TransactionEntry {
    /// Cleared once the transaction completes.
    pub connection: Option<ConnectionId>,
    pub isolation_level: IsolationLevel,
    pub backing: Option<Arc<dyn BackingConnection>>,
    pub completed: bool,
}

/// A map of one handle kind, reporting misses as `HandleNotFound`.
pub struct Store<K, V> {
    kind: HandleKind,
    map: DashMap<K, V>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Copy + Display,
{
    fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            map: DashMap::new(),
        }
    }

    pub fn insert(&self, id: K, entry: V) {
        self.map.insert(id, entry);
    }

    pub fn contains(&self, id: K) -> bool {
        self.map.contains_key(&id)
    }

    pub fn exists(&self, id: K) -> ProtocolResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ProtocolError::not_found(self.kind, id))
        }
    }

    pub fn read<T>(&self, id: K, f: impl FnOnce(&V) -> T) -> ProtocolResult<T> {
        self.map
            .get(&id)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| ProtocolError::not_found(self.kind, id))
    }

    pub fn update<T>(&self, id: K, f: impl FnOnce(&mut V) -> ProtocolResult<T>) -> ProtocolResult<T> {
        match self.map.get_mut(&id) {
            Some(mut entry) => f(entry.value_mut()),
            None => Err(ProtocolError::not_found(self.kind, id)),
        }
    }

    pub fn remove(&self, id: K) -> ProtocolResult<V> {
        self.map
            .remove(&id)
            .map(|(_, entry)| entry)
            .ok_or_else(|| ProtocolError::not_found(self.kind, id))
    }

    /// Remove if present; used by cascades, where a concurrent dispose may have won.
    pub fn discard(&self, id: K) -> Option<V> {
        self.map.remove(&id).map(|(_, entry)| entry)
    }

    /// Ids of every entry matching `predicate`.
    pub fn ids_where(&self, predicate: impl Fn(&V) -> bool) -> Vec<K> {
        self.map
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Live server-side state for every handle handed out.
pub struct HandleRegistry {
    pub connections: Store<ConnectionId, ConnectionEntry>,
    pub commands: Store<CommandId, CommandEntry>,
    pub parameters: Store<ParameterId, ParameterEntry>,
    pub readers: Store<DataReaderId, ReaderEntry>,
    pub transactions: Store<TransactionId, TransactionEntry>,
    pub ledger: OwnershipLedger,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            connections: Store::new(HandleKind::Connection),
            commands: Store::new(HandleKind::Command),
            parameters: Store::new(HandleKind::Parameter),
            readers: Store::new(HandleKind::DataReader),
            transactions: Store::new(HandleKind::Transaction),
            ledger: OwnershipLedger::new(),
        }
    }

    pub fn insert_connection(&self) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.insert(id, ConnectionEntry::default());
        debug!(connection = %id, "Created connection");
        id
    }

    pub fn insert_command(&self, connection: ConnectionId) -> ProtocolResult<CommandId> {
        self.connections.exists(connection)?;
        let id = CommandId::new();
        self.commands.insert(id, CommandEntry::new(connection));
        debug!(command = %id, connection = %connection, "Created command");
        Ok(id)
    }

    /// Allocate a parameter owned by `command` and note it in the ledger.
    pub fn insert_parameter(&self, command: CommandId) -> ProtocolResult<ParameterId> {
        self.commands.exists(command)?;
        let id = ParameterId::new();
        self.parameters.insert(id, ParameterEntry::new(command));
        self.ledger.record(command, id);
        Ok(id)
    }

    pub fn insert_reader(&self, entry: ReaderEntry) -> DataReaderId {
        let id = DataReaderId::new();
        self.readers.insert(id, entry);
        id
    }

    pub fn insert_transaction(&self, entry: TransactionEntry) -> TransactionId {
        let id = TransactionId::new();
        self.transactions.insert(id, entry);
        id
    }

    /// Fail unless `parameter` is live and was created by `command`.
    pub fn ensure_owned(&self, command: CommandId, parameter: ParameterId) -> ProtocolResult<()> {
        let owner = self.parameters.read(parameter, |entry| entry.command)?;
        if owner == command && self.ledger.is_recorded_for_command(parameter, command) {
            Ok(())
        } else {
            Err(ProtocolError::OwnershipViolation { parameter, command })
        }
    }

    /// Drop a parameter that left its command's collection.
    pub fn release_parameter(&self, command: CommandId, parameter: ParameterId) {
        self.ledger.forget(command, parameter);
        if self.parameters.discard(parameter).is_some() {
            debug!(parameter = %parameter, "Released parameter");
        }
    }

    /// Remove a command, every parameter it created, and readers it produced.
    pub fn dispose_command(&self, command: CommandId) -> ProtocolResult<()> {
        self.commands.remove(command)?;
        let mut released = 0usize;
        self.ledger.remove_any_parameters_for(command, |parameter| {
            self.parameters.discard(parameter);
            released += 1;
        });
        for reader in self.readers.ids_where(|entry| entry.command == Some(command)) {
            self.readers.discard(reader);
        }
        debug!(command = %command, parameters = released, "Disposed command");
        Ok(())
    }

    /// Remove a connection with its commands, readers and transactions.
    ///
    /// Returns the transactions that were still pending so the caller can roll
    /// them back.
    pub fn dispose_connection(&self, connection: ConnectionId) -> ProtocolResult<Vec<TransactionEntry>> {
        self.connections.remove(connection)?;

        for command in self.commands.ids_where(|entry| entry.created_on == Some(connection)) {
            if let Err(err) = self.dispose_command(command) {
                debug!(command = %command, error = %err, "Command already disposed during cascade");
            }
        }
        for command in self.commands.ids_where(|entry| entry.connection == Some(connection)) {
            let _ = self.commands.update(command, |entry| {
                entry.connection = None;
                Ok(())
            });
        }
        for reader in self.readers.ids_where(|entry| entry.connection == Some(connection)) {
            self.readers.discard(reader);
        }

        let pending = self
            .transactions
            .ids_where(|entry| entry.connection == Some(connection))
            .into_iter()
            .filter_map(|id| self.transactions.discard(id))
            .filter(|entry| !entry.completed)
            .collect();

        debug!(connection = %connection, "Disposed connection");
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> HandleRegistry {
        HandleRegistry::new()
    }

    #[rstest]
    fn test_lookup_after_dispose_is_not_found(registry: HandleRegistry) {
        let connection = registry.insert_connection();
        let command = registry.insert_command(connection).unwrap();
        registry.dispose_command(command).unwrap();

        let err = registry.commands.read(command, |entry| entry.text.clone()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::HandleNotFound {
                kind: HandleKind::Command,
                ..
            }
        ));
        assert!(registry.dispose_command(command).is_err());
    }

    #[rstest]
    fn test_dispose_command_releases_parameters(registry: HandleRegistry) {
        let connection = registry.insert_connection();
        let command = registry.insert_command(connection).unwrap();
        let first = registry.insert_parameter(command).unwrap();
        let second = registry.insert_parameter(command).unwrap();
        assert_eq!(registry.ledger.parameters_for(command).len(), 2);

        registry.dispose_command(command).unwrap();

        assert!(!registry.parameters.contains(first));
        assert!(!registry.parameters.contains(second));
        assert_eq!(registry.ledger.command_count(), 0);
    }

    #[rstest]
    fn test_released_parameters_leave_the_ledger(registry: HandleRegistry) {
        let connection = registry.insert_connection();
        let command = registry.insert_command(connection).unwrap();
        for _ in 0..100 {
            let parameter = registry.insert_parameter(command).unwrap();
            registry.release_parameter(command, parameter);
        }
        let live = registry.insert_parameter(command).unwrap();

        assert_eq!(&*registry.ledger.parameters_for(command), &[live]);
        registry.dispose_command(command).unwrap();
        assert!(!registry.parameters.contains(live));
    }

    #[rstest]
    fn test_dispose_connection_cascades(registry: HandleRegistry) {
        let connection = registry.insert_connection();
        let other = registry.insert_connection();
        let command = registry.insert_command(connection).unwrap();
        let survivor = registry.insert_command(other).unwrap();
        let parameter = registry.insert_parameter(command).unwrap();
        let reader = registry.insert_reader(ReaderEntry::new(
            command,
            connection,
            Arc::new(Table::default()),
            CommandBehavior::Default,
        ));
        registry.insert_transaction(TransactionEntry {
            connection: Some(connection),
            isolation_level: IsolationLevel::default(),
            backing: None,
            completed: false,
        });

        let pending = registry.dispose_connection(connection).unwrap();

        assert_eq!(pending.len(), 1);
        assert!(!registry.commands.contains(command));
        assert!(!registry.parameters.contains(parameter));
        assert!(!registry.readers.contains(reader));
        assert!(registry.transactions.is_empty());
        assert!(registry.commands.contains(survivor));
    }

    #[rstest]
    fn test_reassigned_command_loses_disposed_connection(registry: HandleRegistry) {
        let original = registry.insert_connection();
        let borrowed = registry.insert_connection();
        let command = registry.insert_command(original).unwrap();
        registry
            .commands
            .update(command, |entry| {
                entry.connection = Some(borrowed);
                Ok(())
            })
            .unwrap();

        registry.dispose_connection(borrowed).unwrap();

        assert_eq!(registry.commands.read(command, |entry| entry.connection).unwrap(), None);
    }

    #[rstest]
    fn test_ensure_owned(registry: HandleRegistry) {
        let connection = registry.insert_connection();
        let owner = registry.insert_command(connection).unwrap();
        let stranger = registry.insert_command(connection).unwrap();
        let parameter = registry.insert_parameter(owner).unwrap();

        assert!(registry.ensure_owned(owner, parameter).is_ok());
        assert!(matches!(
            registry.ensure_owned(stranger, parameter),
            Err(ProtocolError::OwnershipViolation { .. })
        ));
    }

    #[rstest]
    fn test_parameter_on_unknown_command(registry: HandleRegistry) {
        assert!(matches!(
            registry.insert_parameter(CommandId::new()),
            Err(ProtocolError::HandleNotFound {
                kind: HandleKind::Command,
                ..
            })
        ));
    }

    #[test]
    fn test_null_parameter_defaults_to_string_type() {
        let mut entry = ParameterEntry::new(CommandId::new());
        assert_eq!(entry.effective_db_type(), DbType::String);
        entry.value = Value::Integer(5);
        assert_eq!(entry.effective_db_type(), DbType::Int32);
        entry.db_type = Some(DbType::Int64);
        assert_eq!(entry.effective_db_type(), DbType::Int64);
    }
}
