//! Shared test utilities for unit and integration tests.
//!
//! This module provides the seeded database and server setups the cache,
//! server and client tests all start from.

use std::sync::Arc;

use crate::backing::{shared_factory, SqliteBacking};
use crate::cache::{DictionaryCache, QueryRecorder};
use crate::server::{SqlProxy, SqlReplayer};

/// Schema and rows every test database starts with.
pub const SEED_SQL: &str = "
    CREATE TABLE test (id INTEGER, name TEXT);
    INSERT INTO test (id, name) VALUES (1, 'Bob');
    INSERT INTO test (id, name) VALUES (2, 'Jack');
";

/// Create an in-memory SQLite database holding the `test` table.
pub fn seeded_sqlite() -> Arc<SqliteBacking> {
    let backing = SqliteBacking::open_in_memory().expect("Failed to open in-memory database");
    backing.execute_batch(SEED_SQL).expect("Failed to seed database");
    Arc::new(backing)
}

/// A recording proxy over a seeded database, plus the cache it records into.
pub fn recording_proxy() -> (Arc<SqlProxy>, Arc<DictionaryCache>) {
    let backing = seeded_sqlite();
    let cache = Arc::new(DictionaryCache::new(backing.clone()));
    let recorder: Arc<dyn QueryRecorder> = cache.clone();
    let proxy = SqlProxy::new(shared_factory(backing), Some(recorder));
    (Arc::new(proxy), cache)
}

/// A replayer answering from everything `cache` has recorded so far.
pub fn replayer_for(cache: &DictionaryCache) -> Arc<SqlReplayer> {
    Arc::new(SqlReplayer::new(Arc::new(cache.read_only())))
}
