use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::ReplayCmd;
use crate::cache::ReadOnlyCache;
use crate::commands::query::{run_query, ExecuteKind, QueryOutcome};
use crate::commands::Execute;
use crate::server::SqlReplayer;

/// Result of replaying one statement
#[derive(Debug, Serialize)]
pub struct ReplayResult {
    pub sql: String,
    pub kind: ExecuteKind,
    pub outcome: QueryOutcome,
}

/// Open a cache file for replay, with a hint when it does not exist yet.
pub(crate) fn open_cache(cache_path: &Path) -> Result<ReadOnlyCache, Box<dyn Error>> {
    if !cache_path.exists() {
        return Err(format!(
            "Cache file not found: {}\n\nRecord something first, e.g.:\n  sql_replay record --db app.db --sql 'SELECT 1'",
            cache_path.display()
        )
        .into());
    }
    Ok(ReadOnlyCache::load(cache_path)?)
}

impl Execute for ReplayCmd {
    type Output = ReplayResult;

    fn execute(self, cache_path: &Path) -> Result<Self::Output, Box<dyn Error>> {
        let cache = open_cache(cache_path)?;
        let replayer = Arc::new(SqlReplayer::new(Arc::new(cache)));

        let outcome = run_query(replayer, &self.sql, &self.params, self.kind).map_err(|err| -> Box<dyn Error> {
            if err.is_no_recorded_result() {
                format!(
                    "{}\n\nNothing in {} matches this statement, parameters and kind; record it first.",
                    err,
                    cache_path.display()
                )
                .into()
            } else {
                err.into()
            }
        })?;

        Ok(ReplayResult {
            sql: self.sql,
            kind: self.kind,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DictionaryCache;
    use crate::commands::query::parse_param;
    use crate::commands::{RecordCmd, ParamArg};
    use crate::test_utils::{recording_proxy, SEED_SQL};
    use crate::value::Value;
    use rstest::{fixture, rstest};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// A cache file holding recordings made against the seeded database.
    #[fixture]
    fn recorded() -> TempDir {
        let dir = TempDir::new().unwrap();
        let (proxy, cache) = recording_proxy();
        run_query(proxy.clone(), "SELECT id, name FROM test ORDER BY id", &[], ExecuteKind::Rows).unwrap();
        run_query(
            proxy,
            "SELECT name FROM test WHERE id = @id",
            &[parse_param("@id=2").unwrap()],
            ExecuteKind::Scalar,
        )
        .unwrap();
        cache.save(&dir.path().join("cache.json")).unwrap();
        dir
    }

    fn replay(dir: &TempDir, sql: &str, params: Vec<ParamArg>, kind: ExecuteKind) -> Result<ReplayResult, Box<dyn Error>> {
        let cmd = ReplayCmd {
            sql: sql.to_string(),
            params,
            kind,
        };
        cmd.execute(&dir.path().join("cache.json"))
    }

    #[rstest]
    fn test_replay_rows(recorded: TempDir) {
        let result = replay(&recorded, "SELECT id, name FROM test ORDER BY id", vec![], ExecuteKind::Rows).unwrap();
        match result.outcome {
            QueryOutcome::Rows { rows, .. } => {
                let names: Vec<&Value> = rows.iter().map(|row| &row[1]).collect();
                assert_eq!(names, vec![&Value::from("Bob"), &Value::from("Jack")]);
            }
            other => panic!("Expected rows, got {other:?}"),
        }
    }

    #[rstest]
    fn test_replay_scalar_with_parameter(recorded: TempDir) {
        let params = vec![parse_param("@id=2").unwrap()];
        let result = replay(&recorded, "SELECT name FROM test WHERE id = @id", params, ExecuteKind::Scalar).unwrap();
        assert_eq!(result.outcome, QueryOutcome::Scalar { value: Value::from("Jack") });
    }

    #[rstest]
    #[case("SELECT name FROM test WHERE id = @id", "@id=1", ExecuteKind::Scalar)]
    #[case("SELECT name FROM test WHERE id = @id", "@id=2", ExecuteKind::Rows)]
    #[case("SELECT name FROM test WHERE id=@id", "@id=2", ExecuteKind::Scalar)]
    fn test_replay_miss_explains(recorded: TempDir, #[case] sql: &str, #[case] param: &str, #[case] kind: ExecuteKind) {
        let err = replay(&recorded, sql, vec![parse_param(param).unwrap()], kind).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("No recorded"), "{message}");
        assert!(message.contains("record it first"), "{message}");
    }

    #[rstest]
    fn test_replay_missing_cache_file() {
        let dir = TempDir::new().unwrap();
        let err = replay(&dir, "SELECT 1", vec![], ExecuteKind::Scalar).unwrap_err();
        assert!(err.to_string().contains("Cache file not found"));
    }

    #[rstest]
    fn test_record_then_replay_through_commands() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.json");
        let mut init = NamedTempFile::new().unwrap();
        init.write_all(SEED_SQL.as_bytes()).unwrap();

        let record = RecordCmd {
            sql: "SELECT count(*) FROM test".to_string(),
            params: vec![],
            kind: ExecuteKind::Scalar,
            db: Some(":memory:".to_string()),
            init: Some(init.path().to_path_buf()),
        };
        record.execute(&cache_path).unwrap();

        let replayed = ReplayCmd {
            sql: "SELECT count(*) FROM test".to_string(),
            params: vec![],
            kind: ExecuteKind::Scalar,
        }
        .execute(&cache_path)
        .unwrap();
        assert_eq!(replayed.outcome, QueryOutcome::Scalar { value: Value::Integer(2) });

        let reloaded = DictionaryCache::new(crate::test_utils::seeded_sqlite());
        assert_eq!(reloaded.load_into(&cache_path).unwrap(), 1);
    }
}
