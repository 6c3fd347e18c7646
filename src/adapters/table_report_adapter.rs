//! Plain-text grid tables, one per `max_allowed_adds` value.

use crate::domain::backtest::ResultRecord;
use crate::domain::error::BacktestError;
use crate::ports::report_port::ReportPort;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Realized Profit (%)")]
    realized: String,
    #[tabled(rename = "Unrealized Profit (%)")]
    unrealized: String,
    #[tabled(rename = "Trades")]
    trades: usize,
    #[tabled(rename = "Max Drawdown (%)")]
    max_drawdown: String,
    #[tabled(rename = "Peak Drawdown (%)")]
    peak_drawdown: String,
}

impl From<&ResultRecord> for ResultRow {
    fn from(record: &ResultRecord) -> Self {
        ResultRow {
            asset: record.symbol.clone(),
            timeframe: record.timeframe.clone(),
            realized: format!("{:.2}", record.realized_profit_pct),
            unrealized: format!("{:.2}", record.unrealized_profit_pct),
            trades: record.trade_count,
            max_drawdown: format!("{:.2}", record.max_drawdown_pct),
            peak_drawdown: format!("{:.2}", record.peak_drawdown_pct),
        }
    }
}

#[derive(Debug, Default)]
pub struct TableReportAdapter;

impl TableReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Grid table of `records`; numeric columns are right-aligned.
pub fn format_grid(records: &[&ResultRecord]) -> String {
    let rows = records.iter().map(|r| ResultRow::from(*r));
    let mut table = Table::new(rows);
    table
        .with(Style::ascii())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()));
    let mut out = table.to_string();
    out.push('\n');
    out
}

impl ReportPort for TableReportAdapter {
    fn render(&self, records: &[ResultRecord]) -> Result<String, BacktestError> {
        if records.is_empty() {
            return Ok("No results\n".to_string());
        }

        let mut maxes: Vec<usize> = Vec::new();
        for r in records {
            if !maxes.contains(&r.max_allowed_adds) {
                maxes.push(r.max_allowed_adds);
            }
        }

        let mut out = String::new();
        for max in maxes {
            let group: Vec<&ResultRecord> = records
                .iter()
                .filter(|r| r.max_allowed_adds == max)
                .collect();
            out.push_str(&format!("\nResults for MAX = {max}:\n"));
            out.push_str(&format_grid(&group));
        }
        Ok(out)
    }
}
