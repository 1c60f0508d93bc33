//! End-to-end record/replay tests through the client adapters.
//!
//! Every test records against a seeded in-memory SQLite database through the
//! proxy, then answers the same calls from a replayer that has no database.

use std::sync::Arc;
use std::thread;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use sql_replay::backing::{shared_factory, SqliteBacking};
use sql_replay::cache::{DictionaryCache, QueryRecorder, ReadOnlyCache};
use sql_replay::client::{ClientError, SqlCommandClient, SqlConnectionClient};
use sql_replay::protocol::{CommandBehavior, RemoteSqlClient};
use sql_replay::server::{SqlProxy, SqlReplayer};
use sql_replay::value::Value;

const SEED_SQL: &str = "
    CREATE TABLE test (id INTEGER, name TEXT);
    INSERT INTO test (id, name) VALUES (1, 'Bob');
    INSERT INTO test (id, name) VALUES (2, 'Jack');
";

struct Recording {
    proxy: Arc<SqlProxy>,
    cache: Arc<DictionaryCache>,
}

impl Recording {
    fn replayer(&self) -> Arc<SqlReplayer> {
        Arc::new(SqlReplayer::new(Arc::new(self.cache.read_only())))
    }
}

#[fixture]
fn recording() -> Recording {
    let backing = Arc::new(SqliteBacking::open_in_memory().expect("open in-memory database"));
    backing.execute_batch(SEED_SQL).expect("seed database");
    let cache = Arc::new(DictionaryCache::new(backing.clone()));
    let recorder: Arc<dyn QueryRecorder> = cache.clone();
    let proxy = Arc::new(SqlProxy::new(shared_factory(backing), Some(recorder)));
    Recording { proxy, cache }
}

fn open(remote: Arc<dyn RemoteSqlClient>) -> SqlConnectionClient {
    let connection = SqlConnectionClient::new(remote).unwrap();
    connection.open().unwrap();
    connection
}

fn command(connection: &SqlConnectionClient, sql: &str) -> SqlCommandClient {
    let command = connection.create_command().unwrap();
    command.set_text(sql).unwrap();
    command
}

fn names(command: &SqlCommandClient) -> Vec<String> {
    let reader = command.execute_reader().unwrap();
    let ordinal = reader.ordinal("name").unwrap();
    let mut names = Vec::new();
    while reader.read().unwrap() {
        names.push(reader.get_string(ordinal).unwrap());
    }
    names
}

#[rstest]
fn test_replayed_rows_match_recorded_rows(recording: Recording) {
    let sql = "SELECT id, name FROM test ORDER BY id";
    let live = {
        let connection = open(recording.proxy.clone());
        names(&command(&connection, sql))
    };
    assert_eq!(live, vec!["Bob", "Jack"]);

    let connection = open(recording.replayer());
    assert_eq!(names(&command(&connection, sql)), live);
}

/// Column names and every row, read cell by cell through ordinals.
fn columns_and_rows(command: &SqlCommandClient) -> (Vec<String>, Vec<Vec<Value>>) {
    let reader = command.execute_reader().unwrap();
    let count = reader.field_count().unwrap();
    let columns = (0..count).map(|i| reader.name(i).unwrap()).collect();
    let mut rows = Vec::new();
    while reader.read().unwrap() {
        rows.push((0..count).map(|i| reader.value(i).unwrap()).collect());
    }
    (columns, rows)
}

#[rstest]
fn test_duplicate_column_names_survive_replay(recording: Recording) {
    let sql = "SELECT id, id * 10 AS id, name FROM test ORDER BY 1";
    let expected_rows = vec![
        vec![Value::Integer(1), Value::Integer(10), Value::from("Bob")],
        vec![Value::Integer(2), Value::Integer(20), Value::from("Jack")],
    ];

    let live = {
        let connection = open(recording.proxy.clone());
        let cmd = command(&connection, sql);
        columns_and_rows(&cmd)
    };
    assert_eq!(live.0, vec!["id", "id", "name"]);
    assert_eq!(live.1, expected_rows);

    let connection = open(recording.replayer());
    let cmd = command(&connection, sql);
    assert_eq!(columns_and_rows(&cmd), live);
}

#[rstest]
fn test_unrecorded_statement_is_a_miss(recording: Recording) {
    let connection = open(recording.replayer());
    let err = command(&connection, "SELECT name FROM test").execute_reader().unwrap_err();
    assert!(err.is_no_recorded_result(), "{err:?}");
}

#[rstest]
fn test_empty_result_is_a_hit(recording: Recording) {
    let sql = "SELECT name FROM test WHERE id = 99";
    {
        let connection = open(recording.proxy.clone());
        assert!(names(&command(&connection, sql)).is_empty());
    }

    let connection = open(recording.replayer());
    assert!(names(&command(&connection, sql)).is_empty());
}

#[rstest]
fn test_scalar_and_non_query_replay(recording: Recording) {
    {
        let connection = open(recording.proxy.clone());
        let count = command(&connection, "SELECT count(*) FROM test");
        assert_eq!(count.execute_scalar().unwrap(), Value::Integer(2));
        let update = command(&connection, "UPDATE test SET name = 'Robert' WHERE id = 1");
        assert_eq!(update.execute_non_query().unwrap(), 1);
    }

    let connection = open(recording.replayer());
    let count = command(&connection, "SELECT count(*) FROM test");
    assert_eq!(count.execute_scalar().unwrap(), Value::Integer(2));
    let update = command(&connection, "UPDATE test SET name = 'Robert' WHERE id = 1");
    assert_eq!(update.execute_non_query().unwrap(), 1);

    // Recorded as scalar only; a reader over the same text is a different entry.
    assert!(count.execute_reader().unwrap_err().is_no_recorded_result());
}

#[rstest]
fn test_parameter_values_and_order_select_the_entry(recording: Recording) {
    let sql = "SELECT name FROM test WHERE id = @id OR name = @name";
    {
        let connection = open(recording.proxy.clone());
        let cmd = command(&connection, sql);
        cmd.parameters().add_with_value("@id", 2).unwrap();
        cmd.parameters().add_with_value("@name", "nobody").unwrap();
        assert_eq!(names(&cmd), vec!["Jack"]);
    }

    let connection = open(recording.replayer());
    let same = command(&connection, sql);
    same.parameters().add_with_value("@id", 2).unwrap();
    same.parameters().add_with_value("@name", "nobody").unwrap();
    assert_eq!(names(&same), vec!["Jack"]);

    let reordered = command(&connection, sql);
    reordered.parameters().add_with_value("@name", "nobody").unwrap();
    reordered.parameters().add_with_value("@id", 2).unwrap();
    assert!(reordered.execute_reader().unwrap_err().is_no_recorded_result());

    let other_value = command(&connection, sql);
    other_value.parameters().add_with_value("@id", 1).unwrap();
    other_value.parameters().add_with_value("@name", "nobody").unwrap();
    assert!(other_value.execute_reader().unwrap_err().is_no_recorded_result());
}

#[rstest]
fn test_recordings_survive_save_and_load(recording: Recording) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recorded.json");
    {
        let connection = open(recording.proxy.clone());
        let cmd = command(&connection, "SELECT name FROM test WHERE id = @id");
        cmd.parameters().add_with_value("@id", 1).unwrap();
        assert_eq!(cmd.execute_scalar().unwrap(), Value::from("Bob"));
    }
    recording.cache.save(&path).unwrap();
    drop(recording);

    let loaded = ReadOnlyCache::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    let replayer = Arc::new(SqlReplayer::new(Arc::new(loaded)));
    let connection = open(replayer);
    let cmd = command(&connection, "SELECT name FROM test WHERE id = @id");
    cmd.parameters().add_with_value("@id", 1).unwrap();
    assert_eq!(cmd.execute_scalar().unwrap(), Value::from("Bob"));
}

#[rstest]
fn test_single_row_behavior_on_replay(recording: Recording) {
    let sql = "SELECT name FROM test ORDER BY id";
    {
        let connection = open(recording.proxy.clone());
        names(&command(&connection, sql));
    }

    let connection = open(recording.replayer());
    let cmd = command(&connection, sql);
    let reader = cmd.execute_reader_with(CommandBehavior::SingleRow).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.get_string(0).unwrap(), "Bob");
    assert!(!reader.read().unwrap());
}

#[rstest]
fn test_foreign_parameter_never_reaches_the_server(recording: Recording) {
    let connection = open(recording.proxy.clone());
    let first = command(&connection, "SELECT 1");
    let second = command(&connection, "SELECT 2");
    let foreign = second.create_parameter().unwrap();

    let err = first.parameters().add(&foreign).unwrap_err();
    assert!(matches!(err, ClientError::OwnershipViolation { .. }));
    assert_eq!(first.parameters().count().unwrap(), 0);
}

#[rstest]
fn test_concurrent_commands_on_one_proxy(recording: Recording) {
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let proxy = recording.proxy.clone();
            thread::spawn(move || {
                let connection = open(proxy);
                let cmd = command(&connection, "SELECT name FROM test WHERE id = @id");
                for i in 0..10 {
                    cmd.parameters()
                        .add_with_value(&format!("@p{worker}_{i}"), i)
                        .unwrap();
                }
                cmd.parameters().count().unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
}
