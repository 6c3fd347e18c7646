//! Domain error types.

/// Top-level error type for emapyramid.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid configuration [{section}] {key}: {reason}")]
    InvalidConfiguration {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data available for {symbol} ({interval})")]
    NoDataAvailable { symbol: String, interval: String },

    #[error("insufficient data for {symbol} ({interval}): have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        interval: String,
        bars: usize,
        minimum: usize,
    },

    #[error("insufficient cash {cash:.2} to buy at reference price {reference_price}")]
    InsufficientCash { cash: f64, reference_price: f64 },

    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BacktestError::InvalidConfiguration {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        BacktestError::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// True for errors that skip one (symbol, timeframe) instead of aborting a batch.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            BacktestError::NoDataAvailable { .. } | BacktestError::InsufficientData { .. }
        )
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) | BacktestError::Report { .. } => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::InvalidConfiguration { .. } => 2,
            BacktestError::Database { .. } | BacktestError::DatabaseQuery { .. } => 3,
            BacktestError::NoDataAvailable { .. } | BacktestError::InsufficientData { .. } => 5,
            BacktestError::InsufficientCash { .. } | BacktestError::InvariantViolation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
