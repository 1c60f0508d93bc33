//! Output formatting for inspect command results.

use super::execute::InspectResult;
use crate::output::{render_grid, Outputable};

impl Outputable for InspectResult {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Cache: {}", self.cache_path));
        lines.push(String::new());

        if self.entries.is_empty() {
            lines.push(if self.total == 0 {
                "No recordings.".to_string()
            } else {
                format!("No recordings match ({} in cache).", self.total)
            });
            return lines.join("\n");
        }

        let header = ["kind", "fingerprint", "sql", "parameters", "result"].map(String::from);
        let rows: Vec<Vec<String>> = self
            .entries
            .iter()
            .map(|e| {
                vec![
                    e.kind.to_string(),
                    e.fingerprint.clone(),
                    e.sql.clone(),
                    e.parameters.join(", "),
                    e.summary.clone(),
                ]
            })
            .collect();
        lines.push(render_grid(&header, &rows));
        lines.push(String::new());
        lines.push(format!("{} of {} recordings", self.entries.len(), self.total));

        lines.join("\n")
    }
}
