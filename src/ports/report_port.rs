//! Report generation port trait.

use crate::domain::backtest::ResultRecord;
use crate::domain::error::BacktestError;
use std::path::Path;

/// Port for rendering and writing result records.
pub trait ReportPort {
    fn render(&self, records: &[ResultRecord]) -> Result<String, BacktestError>;

    /// Default implementation: writes `render` output to `output_path`.
    fn write(&self, records: &[ResultRecord], output_path: &Path) -> Result<(), BacktestError> {
        let content = self.render(records)?;
        std::fs::write(output_path, content).map_err(|e| BacktestError::Report {
            reason: format!("failed to write {}: {e}", output_path.display()),
        })
    }
}
