use std::error::Error;
use std::path::Path;

use serde::Serialize;

use super::InspectCmd;
use crate::cache::{CacheEntry, QueryKind};
use crate::commands::replay::open_cache;
use crate::commands::Execute;

/// One recorded result
#[derive(Debug, Clone, Serialize)]
pub struct InspectEntry {
    pub kind: QueryKind,
    pub fingerprint: String,
    pub sql: String,
    /// `name=value` in binding order
    pub parameters: Vec<String>,
    pub summary: String,
}

impl From<&CacheEntry> for InspectEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            kind: entry.kind,
            fingerprint: entry.fingerprint.short().to_string(),
            sql: entry.criteria.command_text.clone(),
            parameters: entry
                .criteria
                .parameters
                .iter()
                .map(|p| format!("{}={}", p.name, p.value))
                .collect(),
            summary: entry.snapshot.summary(),
        }
    }
}

/// Result of the inspect command execution
#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub cache_path: String,
    /// Entries in the cache before filtering
    pub total: usize,
    pub entries: Vec<InspectEntry>,
}

impl Execute for InspectCmd {
    type Output = InspectResult;

    fn execute(self, cache_path: &Path) -> Result<Self::Output, Box<dyn Error>> {
        let cache = open_cache(cache_path)?;
        let all = cache.entries();
        let kind = self.kind.map(QueryKind::from);
        let needle = self.grep.map(|g| g.to_lowercase());

        let entries = all
            .iter()
            .filter(|entry| kind.is_none_or(|k| entry.kind == k))
            .filter(|entry| {
                needle
                    .as_deref()
                    .is_none_or(|n| entry.criteria.command_text.to_lowercase().contains(n))
            })
            .map(InspectEntry::from)
            .collect();

        Ok(InspectResult {
            cache_path: cache_path.display().to_string(),
            total: all.len(),
            entries,
        })
    }
}
