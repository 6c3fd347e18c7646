//! CSV report: one row per result record.

use crate::domain::backtest::ResultRecord;
use crate::domain::error::BacktestError;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 9] = [
    "symbol",
    "timeframe",
    "max_allowed_adds",
    "realized_profit_pct",
    "unrealized_profit_pct",
    "trade_count",
    "max_drawdown_pct",
    "peak_drawdown_pct",
    "final_value",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn report_err(e: impl std::fmt::Display) -> BacktestError {
    BacktestError::Report {
        reason: format!("CSV write error: {e}"),
    }
}

impl ReportPort for CsvReportAdapter {
    fn render(&self, records: &[ResultRecord]) -> Result<String, BacktestError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(HEADER).map_err(report_err)?;

        for r in records {
            wtr.write_record([
                r.symbol.clone(),
                r.timeframe.clone(),
                r.max_allowed_adds.to_string(),
                format!("{:.4}", r.realized_profit_pct),
                format!("{:.4}", r.unrealized_profit_pct),
                r.trade_count.to_string(),
                format!("{:.4}", r.max_drawdown_pct),
                format!("{:.4}", r.peak_drawdown_pct),
                format!("{:.2}", r.final_value),
            ])
            .map_err(report_err)?;
        }

        let bytes = wtr.into_inner().map_err(report_err)?;
        String::from_utf8(bytes).map_err(report_err)
    }
}
