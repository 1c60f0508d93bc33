//! Output formatting for replay command results.

use super::execute::ReplayResult;
use crate::output::Outputable;

impl Outputable for ReplayResult {
    fn to_table(&self) -> String {
        self.outcome.to_table()
    }
}
