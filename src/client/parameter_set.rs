//! The parameter collection of a command.
//!
//! Every operation taking a parameter checks, before anything is sent, that
//! the parameter was created by this collection's command. Parameters cannot
//! move between commands: the serving side releases a parameter together with
//! the command that created it.

use std::any::{type_name, Any};
use std::fmt;

use super::{ClientError, ClientResult, Remote, SqlParameterClient};
use crate::ids::{CommandId, ParameterId};
use crate::value::Value;

/// Ordered, index- and name-addressable parameters of one command.
#[derive(Clone)]
pub struct SqlParameterSetClient {
    command: CommandId,
    remote: Remote,
}

impl SqlParameterSetClient {
    pub(crate) fn new(command: CommandId, remote: Remote) -> Self {
        Self { command, remote }
    }

    pub fn command(&self) -> CommandId {
        self.command
    }

    fn view(&self, id: ParameterId) -> SqlParameterClient {
        SqlParameterClient::from_handle(id, self.command, self.remote.clone())
    }

    /// The handle of `parameter`, provided this command created it.
    fn owned(&self, parameter: &SqlParameterClient) -> ClientResult<ParameterId> {
        if parameter.command() != self.command {
            return Err(ClientError::OwnershipViolation {
                parameter: parameter.id(),
                owner: parameter.command(),
                command: self.command,
            });
        }
        Ok(parameter.id())
    }

    pub fn count(&self) -> ClientResult<usize> {
        Ok(self.remote.get_parameter_count(self.command)?)
    }

    pub fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.count()? == 0)
    }

    pub fn get(&self, index: usize) -> ClientResult<SqlParameterClient> {
        let id = self.remote.get_parameter_by_index(self.command, index)?;
        Ok(self.view(id))
    }

    pub fn get_by_name(&self, name: &str) -> ClientResult<SqlParameterClient> {
        let id = self.remote.get_parameter_by_name(self.command, name)?;
        Ok(self.view(id))
    }

    pub fn set(&self, index: usize, parameter: &SqlParameterClient) -> ClientResult<()> {
        let id = self.owned(parameter)?;
        Ok(self.remote.set_parameter_by_index(self.command, index, id)?)
    }

    pub fn set_by_name(&self, name: &str, parameter: &SqlParameterClient) -> ClientResult<()> {
        let id = self.owned(parameter)?;
        Ok(self.remote.set_parameter_by_name(self.command, name, id)?)
    }

    /// Append and return the new position.
    pub fn add(&self, parameter: &SqlParameterClient) -> ClientResult<usize> {
        let id = self.owned(parameter)?;
        Ok(self.remote.add_parameter(self.command, id)?)
    }

    /// Create a parameter on this command, name it, give it `value` and add it.
    pub fn add_with_value(&self, name: &str, value: impl Into<Value>) -> ClientResult<SqlParameterClient> {
        if name.trim().is_empty() {
            return Err(ClientError::invalid_argument("Parameter name must not be blank"));
        }
        let parameter = self.view(self.remote.create_parameter(self.command)?);
        parameter.set_name(name)?;
        parameter.set_value(value)?;
        self.add(&parameter)?;
        Ok(parameter)
    }

    pub fn insert(&self, index: usize, parameter: &SqlParameterClient) -> ClientResult<()> {
        let id = self.owned(parameter)?;
        Ok(self.remote.insert_parameter(self.command, index, id)?)
    }

    pub fn remove(&self, parameter: &SqlParameterClient) -> ClientResult<()> {
        let id = self.owned(parameter)?;
        Ok(self.remote.remove_parameter(self.command, id)?)
    }

    pub fn remove_at(&self, index: usize) -> ClientResult<()> {
        Ok(self.remote.remove_parameter_at(self.command, index)?)
    }

    pub fn remove_by_name(&self, name: &str) -> ClientResult<()> {
        Ok(self.remote.remove_parameter_by_name(self.command, name)?)
    }

    pub fn clear(&self) -> ClientResult<()> {
        Ok(self.remote.clear_parameters(self.command)?)
    }

    pub fn contains(&self, parameter: &SqlParameterClient) -> ClientResult<bool> {
        let id = self.owned(parameter)?;
        Ok(self.remote.contains_parameter(self.command, id)?)
    }

    pub fn contains_name(&self, name: &str) -> ClientResult<bool> {
        Ok(self.remote.contains_parameter_name(self.command, name)?)
    }

    pub fn index_of(&self, parameter: &SqlParameterClient) -> ClientResult<Option<usize>> {
        let id = self.owned(parameter)?;
        Ok(self.remote.index_of_parameter(self.command, id)?)
    }

    pub fn index_of_name(&self, name: &str) -> ClientResult<Option<usize>> {
        Ok(self.remote.index_of_parameter_name(self.command, name)?)
    }

    /// Copy every parameter into `destination`, starting at `start`.
    ///
    /// Fails without writing anything when the destination is too short.
    pub fn copy_to(&self, destination: &mut [Option<SqlParameterClient>], start: usize) -> ClientResult<()> {
        if start > destination.len() {
            return Err(ClientError::IndexOutOfRange {
                index: start,
                count: destination.len(),
            });
        }
        let count = self.count()?;
        if destination.len() - start < count {
            return Err(ClientError::invalid_argument(format!(
                "Destination of length {} cannot hold {} parameters starting at index {}",
                destination.len(),
                count,
                start
            )));
        }
        for index in 0..count {
            destination[start + index] = Some(self.get(index)?);
        }
        Ok(())
    }

    /// A fresh forward-only cursor over the collection.
    pub fn enumerate(&self) -> ParameterEnumerator {
        ParameterEnumerator::new(self.clone())
    }

    /// Downcast an untyped argument to a parameter of this collection.
    fn expect_parameter<'a, T: Any>(&self, value: &'a T) -> ClientResult<&'a SqlParameterClient> {
        (value as &dyn Any)
            .downcast_ref::<SqlParameterClient>()
            .ok_or_else(|| {
                ClientError::invalid_argument(format!(
                    "Expected a SqlParameterClient but got a value of type {}",
                    type_name::<T>()
                ))
            })
    }

    /// Untyped `add`, for callers holding values of unknown type.
    pub fn add_object<T: Any>(&self, value: &T) -> ClientResult<usize> {
        self.add(self.expect_parameter(value)?)
    }

    pub fn insert_object<T: Any>(&self, index: usize, value: &T) -> ClientResult<()> {
        self.insert(index, self.expect_parameter(value)?)
    }

    pub fn set_object<T: Any>(&self, index: usize, value: &T) -> ClientResult<()> {
        self.set(index, self.expect_parameter(value)?)
    }

    pub fn remove_object<T: Any>(&self, value: &T) -> ClientResult<()> {
        self.remove(self.expect_parameter(value)?)
    }

    pub fn contains_object<T: Any>(&self, value: &T) -> ClientResult<bool> {
        self.contains(self.expect_parameter(value)?)
    }

    pub fn index_of_object<T: Any>(&self, value: &T) -> ClientResult<Option<usize>> {
        self.index_of(self.expect_parameter(value)?)
    }
}

impl fmt::Debug for SqlParameterSetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlParameterSetClient")
            .field("command", &self.command)
            .finish()
    }
}

/// Forward-only cursor over a parameter collection.
///
/// Reads the live count and ordering on every advance. Mutating the
/// collection while enumerating is not detected; the cursor just continues
/// from its position in whatever the collection has become.
pub struct ParameterEnumerator {
    set: SqlParameterSetClient,
    position: Option<usize>,
    current: Option<SqlParameterClient>,
    failed: bool,
}

impl ParameterEnumerator {
    fn new(set: SqlParameterSetClient) -> Self {
        Self {
            set,
            position: None,
            current: None,
            failed: false,
        }
    }

    /// Advance; `false` once past the last parameter.
    pub fn move_next(&mut self) -> ClientResult<bool> {
        let next = self.position.map_or(0, |position| position.saturating_add(1));
        let count = self.set.count()?;
        if next < count {
            self.current = Some(self.set.get(next)?);
            self.position = Some(next);
            Ok(true)
        } else {
            self.current = None;
            self.position = Some(count);
            Ok(false)
        }
    }

    /// The parameter at the cursor.
    pub fn current(&self) -> ClientResult<SqlParameterClient> {
        match (&self.current, self.position) {
            (Some(parameter), _) => Ok(parameter.clone()),
            (None, None) => Err(ClientError::invalid_operation(
                "Enumeration has not started; call move_next first",
            )),
            (None, Some(_)) => Err(ClientError::invalid_operation("Enumeration already finished")),
        }
    }

    /// Go back to before the first parameter.
    pub fn reset(&mut self) {
        self.position = None;
        self.current = None;
        self.failed = false;
    }
}

impl Iterator for ParameterEnumerator {
    type Item = ClientResult<SqlParameterClient>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.move_next() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::ReadOnlyCache;
    use crate::client::{SqlCommandClient, SqlConnectionClient};
    use crate::server::SqlReplayer;
    use rstest::{fixture, rstest};

    struct Fixture {
        _connection: SqlConnectionClient,
        command: SqlCommandClient,
        other: SqlCommandClient,
    }

    #[fixture]
    fn setup() -> Fixture {
        let remote = Arc::new(SqlReplayer::new(Arc::new(ReadOnlyCache::empty())));
        let connection = SqlConnectionClient::new(remote).unwrap();
        let command = connection.create_command().unwrap();
        let other = connection.create_command().unwrap();
        Fixture {
            _connection: connection,
            command,
            other,
        }
    }

    fn assert_ownership<T: fmt::Debug>(result: ClientResult<T>) {
        match result {
            Err(ClientError::OwnershipViolation { .. }) => {}
            other => panic!("Expected ownership violation, got {other:?}"),
        }
    }

    #[rstest]
    fn test_foreign_parameter_rejected_before_remote_call(setup: Fixture) {
        let set = setup.command.parameters();
        set.add_with_value("@own", 1).unwrap();
        let foreign = setup.other.create_parameter().unwrap();

        assert_ownership(set.add(&foreign));
        assert_ownership(set.insert(0, &foreign));
        assert_ownership(set.set(0, &foreign));
        assert_ownership(set.set_by_name("@own", &foreign));
        assert_ownership(set.remove(&foreign));
        assert_ownership(set.contains(&foreign));
        assert_ownership(set.index_of(&foreign));
        assert_eq!(set.count().unwrap(), 1);
    }

    #[rstest]
    fn test_add_with_value(setup: Fixture) {
        let set = setup.command.parameters();
        let parameter = set.add_with_value("@id", 42).unwrap();

        assert_eq!(parameter.name().unwrap(), "@id");
        assert_eq!(parameter.value().unwrap(), Value::Integer(42));
        assert_eq!(set.get(0).unwrap(), parameter);
        assert_eq!(set.get_by_name("@id").unwrap(), parameter);
        assert!(set.contains(&parameter).unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_add_with_blank_name_rejected(setup: Fixture, #[case] name: &str) {
        let set = setup.command.parameters();
        assert!(matches!(
            set.add_with_value(name, 1),
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(set.is_empty().unwrap());
    }

    #[rstest]
    fn test_add_object_names_offending_type(setup: Fixture) {
        let set = setup.command.parameters();
        let err = set.add_object(&42i32).unwrap_err();
        match err {
            ClientError::InvalidArgument { message } => assert!(message.contains("i32"), "{message}"),
            other => panic!("Expected invalid argument, got {other:?}"),
        }
        assert!(set.contains_object(&"text").is_err());
    }

    #[rstest]
    fn test_object_shim_accepts_parameters(setup: Fixture) {
        let set = setup.command.parameters();
        let parameter = setup.command.create_parameter().unwrap();
        parameter.set_name("@p").unwrap();

        assert_eq!(set.add_object(&parameter).unwrap(), 0);
        assert!(set.contains_object(&parameter).unwrap());
        assert_eq!(set.index_of_object(&parameter).unwrap(), Some(0));
        set.remove_object(&parameter).unwrap();
        assert!(set.is_empty().unwrap());
    }

    #[rstest]
    fn test_copy_to(setup: Fixture) {
        let set = setup.command.parameters();
        let a = set.add_with_value("@a", 1).unwrap();
        let b = set.add_with_value("@b", 2).unwrap();

        let mut destination: Vec<Option<SqlParameterClient>> = vec![None; 3];
        set.copy_to(&mut destination, 1).unwrap();
        assert_eq!(destination, vec![None, Some(a), Some(b)]);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    fn test_copy_to_short_destination(setup: Fixture, #[case] length: usize, #[case] start: usize) {
        let set = setup.command.parameters();
        set.add_with_value("@a", 1).unwrap();
        set.add_with_value("@b", 2).unwrap();

        let mut destination: Vec<Option<SqlParameterClient>> = vec![None; length];
        assert!(matches!(
            set.copy_to(&mut destination, start),
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(destination.iter().all(Option::is_none));
    }

    #[rstest]
    fn test_copy_to_start_past_end(setup: Fixture) {
        let set = setup.command.parameters();
        let mut destination: Vec<Option<SqlParameterClient>> = vec![None; 2];
        assert!(matches!(
            set.copy_to(&mut destination, 3),
            Err(ClientError::IndexOutOfRange { index: 3, count: 2 })
        ));
    }

    #[rstest]
    fn test_enumerator_states(setup: Fixture) {
        let set = setup.command.parameters();
        let a = set.add_with_value("@a", 1).unwrap();
        let b = set.add_with_value("@b", 2).unwrap();

        let mut cursor = set.enumerate();
        assert!(matches!(cursor.current(), Err(ClientError::InvalidOperation { .. })));
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.current().unwrap(), a);
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.current().unwrap(), b);
        assert!(!cursor.move_next().unwrap());
        assert!(matches!(cursor.current(), Err(ClientError::InvalidOperation { .. })));
        assert!(!cursor.move_next().unwrap());

        cursor.reset();
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.current().unwrap(), a);
    }

    #[rstest]
    fn test_enumerator_as_iterator(setup: Fixture) {
        let set = setup.command.parameters();
        set.add_with_value("@a", 1).unwrap();
        set.add_with_value("@b", 2).unwrap();

        let names: Vec<String> = set
            .enumerate()
            .map(|parameter| parameter.unwrap().name().unwrap())
            .collect();
        assert_eq!(names, vec!["@a", "@b"]);
    }

    #[rstest]
    fn test_index_and_name_operations(setup: Fixture) {
        let set = setup.command.parameters();
        let a = set.add_with_value("@a", 1).unwrap();
        set.add_with_value("@c", 3).unwrap();
        let b = setup.command.create_parameter().unwrap();
        b.set_name("@b").unwrap();
        set.insert(1, &b).unwrap();

        assert_eq!(set.index_of(&b).unwrap(), Some(1));
        assert_eq!(set.index_of_name("@c").unwrap(), Some(2));
        assert!(set.contains_name("@a").unwrap());

        set.remove_at(0).unwrap();
        assert!(set.index_of(&a).is_err());
        set.remove_by_name("@c").unwrap();
        assert_eq!(set.count().unwrap(), 1);

        set.clear().unwrap();
        assert!(set.is_empty().unwrap());
    }
}
