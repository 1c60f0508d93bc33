use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::RecordCmd;
use crate::backing::{shared_factory, BackingConfig, BackingConnection};
use crate::cache::{DictionaryCache, QueryCriteria, QueryRecorder};
use crate::commands::query::{run_query, ExecuteKind, QueryOutcome};
use crate::commands::Execute;
use crate::server::SqlProxy;

/// Result of recording one statement
#[derive(Debug, Serialize)]
pub struct RecordResult {
    pub sql: String,
    pub kind: ExecuteKind,
    pub outcome: QueryOutcome,
    pub cache_path: String,
    /// Entries the cache file held before this recording
    pub previous_entries: usize,
    pub total_entries: usize,
}

impl Execute for RecordCmd {
    type Output = RecordResult;

    fn execute(self, cache_path: &Path) -> Result<Self::Output, Box<dyn Error>> {
        let config = match &self.db {
            Some(url) => BackingConfig::from_url(url)?,
            None => BackingConfig::resolve()?,
        };
        let backing = config.connect()?;

        if let Some(init) = &self.init {
            let script = fs::read_to_string(init)
                .map_err(|e| format!("Failed to read {}: {}", init.display(), e))?;
            let statements = run_script(backing.as_ref(), &script)?;
            debug!(path = %init.display(), statements, "Ran init script");
        }

        let cache = Arc::new(DictionaryCache::new(backing.clone()));
        let previous_entries = if cache_path.exists() {
            cache.load_into(cache_path)?
        } else {
            0
        };

        let recorder: Arc<dyn QueryRecorder> = cache.clone();
        let proxy = Arc::new(SqlProxy::new(shared_factory(backing), Some(recorder)));
        let outcome = run_query(proxy, &self.sql, &self.params, self.kind)?;

        cache.save(cache_path)?;
        info!(path = %cache_path.display(), entries = cache.len(), "Recording merged into cache");

        Ok(RecordResult {
            sql: self.sql,
            kind: self.kind,
            outcome,
            cache_path: cache_path.display().to_string(),
            previous_entries,
            total_entries: cache.len(),
        })
    }
}

/// Run each `;`-separated statement of `script`; returns how many ran.
fn run_script(backing: &dyn BackingConnection, script: &str) -> Result<usize, Box<dyn Error>> {
    let mut count = 0;
    for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        backing.execute_non_query(&QueryCriteria::text(statement))?;
        count += 1;
    }
    Ok(count)
}
