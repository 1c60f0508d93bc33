//! In-memory cache store with optional JSON persistence.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CacheError, CacheKey, Fingerprint, QueryCriteria, QueryKind, QueryRecorder, QueryRetriever, Snapshot, Table};
use crate::backing::BackingConnection;
use crate::value::Value;

const CACHE_FILE_VERSION: u32 = 1;

/// A stored snapshot together with the criteria that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub kind: QueryKind,
    pub fingerprint: Fingerprint,
    pub criteria: QueryCriteria,
    pub snapshot: Snapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Shared entry map; both cache views point at the same one.
#[derive(Debug, Clone, Default)]
struct Entries(Arc<DashMap<CacheKey, CacheEntry>>);

impl Entries {
    fn insert(&self, kind: QueryKind, criteria: &QueryCriteria, snapshot: Snapshot) {
        let key = CacheKey::new(kind, criteria);
        info!(
            kind = %kind,
            fingerprint = key.fingerprint.short(),
            summary = %snapshot.summary(),
            "Recorded query result"
        );
        let entry = CacheEntry {
            kind,
            fingerprint: key.fingerprint.clone(),
            criteria: criteria.clone(),
            snapshot,
        };
        self.0.insert(key, entry);
    }

    fn lookup(&self, kind: QueryKind, criteria: &QueryCriteria) -> Result<Snapshot, CacheError> {
        let key = CacheKey::new(kind, criteria);
        match self.0.get(&key) {
            Some(entry) => {
                debug!(kind = %kind, fingerprint = key.fingerprint.short(), "Cache hit");
                Ok(entry.snapshot.clone())
            }
            None => {
                debug!(kind = %kind, fingerprint = key.fingerprint.short(), "Cache miss");
                Err(CacheError::NoRecordedResult {
                    kind,
                    fingerprint: key.fingerprint,
                })
            }
        }
    }

    fn retrieve_rows(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError> {
        match self.lookup(QueryKind::Rows, criteria)? {
            Snapshot::Rows(table) => Ok(table),
            other => Err(shape_mismatch(QueryKind::Rows, criteria, &other)),
        }
    }

    fn retrieve_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError> {
        match self.lookup(QueryKind::Scalar, criteria)? {
            Snapshot::Scalar(value) => Ok(value),
            other => Err(shape_mismatch(QueryKind::Scalar, criteria, &other)),
        }
    }

    fn retrieve_non_query_row_count(&self, criteria: &QueryCriteria) -> Result<i64, CacheError> {
        match self.lookup(QueryKind::NonQuery, criteria)? {
            Snapshot::RowCount(count) => Ok(count),
            other => Err(shape_mismatch(QueryKind::NonQuery, criteria, &other)),
        }
    }

    /// All entries ordered by kind then fingerprint.
    fn sorted(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.0.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| (a.kind, &a.fingerprint).cmp(&(b.kind, &b.fingerprint)));
        entries
    }

    fn save(&self, path: &Path) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: self.sorted(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(path, content).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), entries = file.entries.len(), "Saved cache");
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<usize, CacheError> {
        let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CacheFile = serde_json::from_str(&content)?;
        file.entries.iter().try_for_each(CacheEntry::check_shape)?;
        let count = file.entries.len();
        for entry in file.entries {
            // Re-derive the key: a hand-edited fingerprint must not shadow the criteria.
            let key = CacheKey::new(entry.kind, &entry.criteria);
            self.0.insert(key, entry);
        }
        debug!(path = %path.display(), entries = count, "Loaded cache");
        Ok(count)
    }
}

impl CacheEntry {
    /// Every row of a stored table must be as wide as its column list.
    fn check_shape(&self) -> Result<(), CacheError> {
        let Snapshot::Rows(table) = &self.snapshot else {
            return Ok(());
        };
        let columns = table.field_count();
        match table.rows.iter().position(|row| row.len() != columns) {
            Some(row) => Err(CacheError::RaggedRow {
                fingerprint: self.criteria.fingerprint(),
                row,
                width: table.rows[row].len(),
                columns,
            }),
            None => Ok(()),
        }
    }
}

fn shape_mismatch(kind: QueryKind, criteria: &QueryCriteria, found: &Snapshot) -> CacheError {
    let found = match found {
        Snapshot::Rows(_) => "rows",
        Snapshot::Scalar(_) => "scalar",
        Snapshot::RowCount(_) => "row count",
    };
    CacheError::ShapeMismatch {
        kind,
        fingerprint: criteria.fingerprint(),
        found,
    }
}

/// Read-write cache used while recording.
///
/// Needs a backing runner so it can execute and materialize the statements it
/// is asked to record. Once recording is over, take a `read_only()` view and
/// drop this (and with it the runner).
pub struct DictionaryCache {
    entries: Entries,
    runner: Arc<dyn BackingConnection>,
}

impl DictionaryCache {
    pub fn new(runner: Arc<dyn BackingConnection>) -> Self {
        Self {
            entries: Entries::default(),
            runner,
        }
    }

    /// Lookup-only view over the same entries.
    pub fn read_only(&self) -> ReadOnlyCache {
        ReadOnlyCache {
            entries: self.entries.clone(),
        }
    }

    /// Merge entries from a saved cache file; returns how many were read.
    pub fn load_into(&self, path: &Path) -> Result<usize, CacheError> {
        self.entries.load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        self.entries.save(path)
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries.sorted()
    }

    pub fn len(&self) -> usize {
        self.entries.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.0.is_empty()
    }
}

impl QueryRecorder for DictionaryCache {
    fn record_query(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError> {
        let table = Arc::new(self.runner.execute_reader(criteria)?);
        self.entries.insert(QueryKind::Rows, criteria, Snapshot::Rows(Arc::clone(&table)));
        Ok(table)
    }

    fn record_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError> {
        let value = self.runner.execute_scalar(criteria)?;
        self.entries.insert(QueryKind::Scalar, criteria, Snapshot::Scalar(value.clone()));
        Ok(value)
    }

    fn record_non_query_row_count(&self, criteria: &QueryCriteria, rows_affected: i64) -> Result<(), CacheError> {
        self.entries.insert(QueryKind::NonQuery, criteria, Snapshot::RowCount(rows_affected));
        Ok(())
    }
}

impl QueryRetriever for DictionaryCache {
    fn retrieve_rows(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError> {
        self.entries.retrieve_rows(criteria)
    }

    fn retrieve_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError> {
        self.entries.retrieve_scalar(criteria)
    }

    fn retrieve_non_query_row_count(&self, criteria: &QueryCriteria) -> Result<i64, CacheError> {
        self.entries.retrieve_non_query_row_count(criteria)
    }
}

/// Lookup-only cache used while replaying.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyCache {
    entries: Entries,
}

impl ReadOnlyCache {
    /// An empty cache; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a cache file written by `DictionaryCache::save`.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::default();
        cache.entries.load(path)?;
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        self.entries.save(path)
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries.sorted()
    }

    pub fn len(&self) -> usize {
        self.entries.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.0.is_empty()
    }
}

impl QueryRetriever for ReadOnlyCache {
    fn retrieve_rows(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError> {
        self.entries.retrieve_rows(criteria)
    }

    fn retrieve_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError> {
        self.entries.retrieve_scalar(criteria)
    }

    fn retrieve_non_query_row_count(&self, criteria: &QueryCriteria) -> Result<i64, CacheError> {
        self.entries.retrieve_non_query_row_count(criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::SqliteBacking;
    use crate::cache::Column;
    use crate::test_utils::seeded_sqlite;
    use crate::value::DbType;
    use rstest::{fixture, rstest};
    use tempfile::NamedTempFile;

    #[fixture]
    fn backing() -> Arc<SqliteBacking> {
        seeded_sqlite()
    }

    #[fixture]
    fn cache(backing: Arc<SqliteBacking>) -> DictionaryCache {
        DictionaryCache::new(backing)
    }

    fn names(table: &Table) -> Vec<String> {
        let ordinal = table.ordinal("name").expect("name column");
        table.rows.iter().map(|row| row[ordinal].to_string()).collect()
    }

    #[rstest]
    fn test_record_then_retrieve_rows(cache: DictionaryCache) {
        let criteria = QueryCriteria::text("SELECT * FROM test");
        let recorded = cache.record_query(&criteria).unwrap();
        assert_eq!(names(&recorded), vec!["Bob", "Jack"]);

        let replayed = cache.read_only().retrieve_rows(&criteria).unwrap();
        assert_eq!(replayed, recorded);
    }

    #[rstest]
    fn test_snapshot_is_reusable(cache: DictionaryCache) {
        let criteria = QueryCriteria::text("SELECT * FROM test");
        cache.record_query(&criteria).unwrap();
        let view = cache.read_only();

        let first = view.retrieve_rows(&criteria).unwrap();
        let second = view.retrieve_rows(&criteria).unwrap();
        assert_eq!(names(&first), names(&second));
    }

    #[rstest]
    fn test_miss_is_distinct_error(cache: DictionaryCache) {
        let err = cache
            .read_only()
            .retrieve_rows(&QueryCriteria::text("SELECT * FROM test"))
            .unwrap_err();
        assert!(matches!(err, CacheError::NoRecordedResult { kind: QueryKind::Rows, .. }));
    }

    #[rstest]
    fn test_empty_result_is_a_hit(cache: DictionaryCache) {
        let criteria = QueryCriteria::text("SELECT * FROM test WHERE id = @id").with_parameter("@id", 99i64);
        cache.record_query(&criteria).unwrap();

        let table = cache.read_only().retrieve_rows(&criteria).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.field_count(), 2);
    }

    #[rstest]
    fn test_kinds_are_separate_namespaces(cache: DictionaryCache) {
        let criteria = QueryCriteria::text("SELECT COUNT(*) FROM test");
        cache.record_scalar(&criteria).unwrap();

        let view = cache.read_only();
        assert_eq!(view.retrieve_scalar(&criteria).unwrap(), Value::Integer(2));
        assert!(matches!(
            view.retrieve_rows(&criteria),
            Err(CacheError::NoRecordedResult { .. })
        ));
    }

    #[rstest]
    fn test_rerecording_overwrites(cache: DictionaryCache) {
        let criteria = QueryCriteria::text("UPDATE test SET name = name");
        cache.record_non_query_row_count(&criteria, 2).unwrap();
        cache.record_non_query_row_count(&criteria, 5).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.retrieve_non_query_row_count(&criteria).unwrap(), 5);
    }

    #[rstest]
    fn test_read_only_view_outlives_runner(backing: Arc<SqliteBacking>) {
        let criteria = QueryCriteria::text("SELECT name FROM test ORDER BY id");
        let view = {
            let cache = DictionaryCache::new(backing);
            cache.record_query(&criteria).unwrap();
            cache.read_only()
        };
        assert_eq!(names(&view.retrieve_rows(&criteria).unwrap()), vec!["Bob", "Jack"]);
    }

    #[rstest]
    fn test_save_and_load_round_trip(cache: DictionaryCache) {
        let rows = QueryCriteria::text("SELECT * FROM test");
        let scalar = QueryCriteria::text("SELECT name FROM test WHERE id = @id").with_parameter("@id", 2i64);
        cache.record_query(&rows).unwrap();
        cache.record_scalar(&scalar).unwrap();

        let file = NamedTempFile::new().unwrap();
        cache.save(file.path()).unwrap();

        let loaded = ReadOnlyCache::load(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(names(&loaded.retrieve_rows(&rows).unwrap()), vec!["Bob", "Jack"]);
        assert_eq!(loaded.retrieve_scalar(&scalar).unwrap(), Value::from("Jack"));
        assert_eq!(loaded.entries(), cache.entries());
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = ReadOnlyCache::load(Path::new("/nonexistent/cache.json")).unwrap_err();
        match err {
            CacheError::Io { path, .. } => assert_eq!(path, "/nonexistent/cache.json"),
            other => panic!("Expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cache_misses_everything() {
        let cache = ReadOnlyCache::empty();
        assert!(cache.is_empty());
        assert!(cache.retrieve_scalar(&QueryCriteria::text("SELECT 1")).is_err());
    }

    #[test]
    fn test_load_rejects_rows_narrower_than_columns() {
        let mut table = Table::new(vec![
            Column::new("id", DbType::Int64, "INTEGER"),
            Column::new("name", DbType::String, "TEXT"),
        ]);
        table.rows.push(vec![Value::Integer(1)]);
        let criteria = QueryCriteria::text("SELECT id, name FROM test");
        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: vec![CacheEntry {
                kind: QueryKind::Rows,
                fingerprint: criteria.fingerprint(),
                criteria,
                snapshot: Snapshot::Rows(Arc::new(table)),
            }],
        };
        let path = NamedTempFile::new().unwrap();
        fs::write(path.path(), serde_json::to_string(&file).unwrap()).unwrap();

        match ReadOnlyCache::load(path.path()) {
            Err(CacheError::RaggedRow { row, width, columns, .. }) => {
                assert_eq!((row, width, columns), (0, 1, 2));
            }
            other => panic!("Expected ragged row error, got {other:?}"),
        }
    }
}

