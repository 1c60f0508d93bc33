//! Output formatting for record command results.

use super::execute::RecordResult;
use crate::cache::QueryKind;
use crate::output::Outputable;

impl Outputable for RecordResult {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Recorded ({}): {}", QueryKind::from(self.kind), self.sql));
        lines.push(String::new());
        lines.push(self.outcome.to_table());
        lines.push(String::new());
        lines.push(format!(
            "Cache: {} ({} entries, {} before)",
            self.cache_path, self.total_entries, self.previous_entries
        ));

        lines.join("\n")
    }
}
