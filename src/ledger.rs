//! Command-to-parameter ownership ledger.
//!
//! Tracks, per command, every live parameter that command created through
//! create-parameter. Parameters released from the collection are forgotten
//! individually; the rest go when the command is disposed. The serving side uses it to reject a parameter being used
//! through a command that did not create it, and to release every parameter
//! when its command is disposed.
//!
//! Each entry is an immutable `Arc<[ParameterId]>`. Adding a parameter builds a
//! new slice from the previous one and swaps it in under the map's per-shard
//! lock, so:
//! - updates for unrelated commands only contend when they hash to the same
//!   shard, never on a store-wide lock;
//! - the combine step runs inside the entry guard, so concurrent adds for the
//!   same command cannot lose updates;
//! - anyone enumerating an older `Arc` keeps seeing a complete, consistent set.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::ids::{CommandId, ParameterId};

#[derive(Debug, Default)]
pub struct OwnershipLedger {
    entries: DashMap<CommandId, Arc<[ParameterId]>>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `parameter` was created by `command`.
    pub fn record(&self, command: CommandId, parameter: ParameterId) {
        match self.entries.entry(command) {
            Entry::Occupied(mut occupied) => {
                let extended: Arc<[ParameterId]> = occupied
                    .get()
                    .iter()
                    .copied()
                    .chain(std::iter::once(parameter))
                    .collect();
                occupied.insert(extended);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::from([parameter]));
            }
        }
    }

    /// Whether `parameter` was created by `command`.
    pub fn is_recorded_for_command(&self, parameter: ParameterId, command: CommandId) -> bool {
        self.parameters_for(command).contains(&parameter)
    }

    /// Every parameter recorded for `command`, in creation order.
    ///
    /// The returned slice is a snapshot; later updates replace the entry rather
    /// than mutating what was handed out.
    pub fn parameters_for(&self, command: CommandId) -> Arc<[ParameterId]> {
        self.entries
            .get(&command)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::from([]))
    }

    /// Drop a single released `parameter` from `command`'s entry.
    ///
    /// The entry is rebuilt without it, or removed once nothing is left, so a
    /// command reused across many add/clear cycles keeps only live parameters.
    /// Returns whether the parameter was recorded.
    pub fn forget(&self, command: CommandId, parameter: ParameterId) -> bool {
        let Entry::Occupied(mut occupied) = self.entries.entry(command) else {
            return false;
        };
        if !occupied.get().contains(&parameter) {
            return false;
        }
        let remaining: Arc<[ParameterId]> = occupied
            .get()
            .iter()
            .copied()
            .filter(|recorded| *recorded != parameter)
            .collect();
        if remaining.is_empty() {
            occupied.remove();
        } else {
            occupied.insert(remaining);
        }
        true
    }

    /// Detach the whole entry for `command` and report each removed parameter.
    ///
    /// A `record` for the same command that lands after the detach starts a new
    /// entry; it never resurrects the removed parameters. Calling this for a
    /// command with no entry does nothing and never invokes `on_removed`.
    pub fn remove_any_parameters_for<F>(&self, command: CommandId, mut on_removed: F)
    where
        F: FnMut(ParameterId),
    {
        let Some((_, parameters)) = self.entries.remove(&command) else {
            return;
        };
        for parameter in parameters.iter().copied() {
            on_removed(parameter);
        }
    }

    /// Number of commands with at least one recorded parameter.
    pub fn command_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_record_and_lookup() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        let first = ParameterId::new();
        let second = ParameterId::new();

        ledger.record(command, first);
        ledger.record(command, second);

        assert!(ledger.is_recorded_for_command(first, command));
        assert!(ledger.is_recorded_for_command(second, command));
        assert_eq!(&*ledger.parameters_for(command), &[first, second]);
    }

    #[test]
    fn test_parameter_not_recorded_for_other_command() {
        let ledger = OwnershipLedger::new();
        let owner = CommandId::new();
        let other = CommandId::new();
        let parameter = ParameterId::new();
        ledger.record(owner, parameter);

        assert!(!ledger.is_recorded_for_command(parameter, other));
        assert!(!ledger.is_recorded_for_command(ParameterId::new(), owner));
    }

    #[test]
    fn test_old_snapshot_unaffected_by_later_record() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        ledger.record(command, ParameterId::new());

        let before = ledger.parameters_for(command);
        ledger.record(command, ParameterId::new());

        assert_eq!(before.len(), 1);
        assert_eq!(ledger.parameters_for(command).len(), 2);
    }

    #[test]
    fn test_remove_invokes_callback_per_parameter() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        let parameters: Vec<ParameterId> = (0..3).map(|_| ParameterId::new()).collect();
        for p in &parameters {
            ledger.record(command, *p);
        }

        let mut removed = Vec::new();
        ledger.remove_any_parameters_for(command, |p| removed.push(p));

        assert_eq!(removed, parameters);
        assert!(ledger.parameters_for(command).is_empty());
        assert_eq!(ledger.command_count(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        ledger.record(command, ParameterId::new());
        ledger.remove_any_parameters_for(command, |_| {});

        let mut calls = 0;
        ledger.remove_any_parameters_for(command, |_| calls += 1);
        assert_eq!(calls, 0);

        // Never-recorded command behaves the same way
        ledger.remove_any_parameters_for(CommandId::new(), |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_forget_drops_only_that_parameter() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        let kept = ParameterId::new();
        let released = ParameterId::new();
        ledger.record(command, kept);
        ledger.record(command, released);

        assert!(ledger.forget(command, released));
        assert!(!ledger.forget(command, released));
        assert_eq!(&*ledger.parameters_for(command), &[kept]);

        assert!(ledger.forget(command, kept));
        assert_eq!(ledger.command_count(), 0);
        assert!(!ledger.forget(CommandId::new(), kept));
    }

    #[test]
    fn test_record_after_remove_starts_fresh_entry() {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        let old = ParameterId::new();
        ledger.record(command, old);
        ledger.remove_any_parameters_for(command, |_| {});

        let new = ParameterId::new();
        ledger.record(command, new);

        assert_eq!(&*ledger.parameters_for(command), &[new]);
        assert!(!ledger.is_recorded_for_command(old, command));
    }

    #[rstest]
    #[case(2)]
    #[case(16)]
    #[case(64)]
    fn test_concurrent_records_for_same_command_lose_nothing(#[case] threads: usize) {
        let ledger = OwnershipLedger::new();
        let command = CommandId::new();
        let parameters: Vec<ParameterId> = (0..threads).map(|_| ParameterId::new()).collect();

        thread::scope(|scope| {
            for p in &parameters {
                let ledger = &ledger;
                scope.spawn(move || ledger.record(command, *p));
            }
        });

        let recorded: HashSet<ParameterId> = ledger.parameters_for(command).iter().copied().collect();
        let expected: HashSet<ParameterId> = parameters.into_iter().collect();
        assert_eq!(recorded, expected);
        assert_eq!(ledger.parameters_for(command).len(), threads);
    }

    #[test]
    fn test_concurrent_records_across_commands() {
        let ledger = OwnershipLedger::new();
        let commands: Vec<CommandId> = (0..8).map(|_| CommandId::new()).collect();

        thread::scope(|scope| {
            for command in &commands {
                let ledger = &ledger;
                let command = *command;
                scope.spawn(move || {
                    for _ in 0..50 {
                        ledger.record(command, ParameterId::new());
                    }
                });
            }
        });

        for command in &commands {
            assert_eq!(ledger.parameters_for(*command).len(), 50);
        }
    }
}
