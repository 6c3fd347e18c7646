//! Configuration access port trait.

use crate::domain::error::BacktestError;
use std::str::FromStr;

pub trait ConfigPort {
    /// Raw value, `None` when the key is absent.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, BacktestError> {
        parse_or(self.get_string(section, key), section, key, default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, BacktestError> {
        parse_or(self.get_string(section, key), section, key, default)
    }
}

/// `default` for an absent or blank value; a present value that does not parse is an error.
fn parse_or<T: FromStr>(
    raw: Option<String>,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, BacktestError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            BacktestError::invalid(section, key, format!("'{value}' is not a number"))
        }),
    }
}
