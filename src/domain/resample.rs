//! Bar aggregation to a coarser interval.
//!
//! Buckets are aligned to multiples of the target interval since the Unix
//! epoch, so intervals that divide a day start at midnight. Weekly buckets
//! start on Monday. Within a bucket:
//! open=first, high=max, low=min, close=last, volume=sum. A bucket holding
//! any incomplete source bar is dropped whole.

use crate::domain::ohlcv::Bar;
use crate::domain::timeframe::Interval;
use chrono::{DateTime, NaiveDateTime};

const SECS_PER_WEEK: i64 = 7 * 24 * 3600;
/// 1970-01-05, the first Monday after the epoch.
const FIRST_MONDAY_SECS: i64 = 4 * 24 * 3600;

fn bucket_start(timestamp: NaiveDateTime, interval: Interval) -> NaiveDateTime {
    let step = interval.minutes() * 60;
    let anchor = if step % SECS_PER_WEEK == 0 {
        FIRST_MONDAY_SECS
    } else {
        0
    };
    let secs = timestamp.and_utc().timestamp() - anchor;
    let floored = secs.div_euclid(step) * step + anchor;
    DateTime::from_timestamp(floored, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(timestamp)
}

struct Bucket {
    start: NaiveDateTime,
    bar: Bar,
    complete: bool,
}

impl Bucket {
    fn open(start: NaiveDateTime, first: &Bar) -> Self {
        Bucket {
            start,
            bar: Bar {
                timestamp: start,
                ..first.clone()
            },
            complete: first.is_complete(),
        }
    }

    fn absorb(&mut self, bar: &Bar) {
        self.complete &= bar.is_complete();
        self.bar.high = self.bar.high.max(bar.high);
        self.bar.low = self.bar.low.min(bar.low);
        self.bar.close = bar.close;
        self.bar.volume += bar.volume;
    }
}

/// Aggregate time-ordered `bars` into `target`-sized buckets.
pub fn aggregate(bars: &[Bar], target: Interval) -> Vec<Bar> {
    let mut out = Vec::new();
    let mut current: Option<Bucket> = None;

    for bar in bars {
        let start = bucket_start(bar.timestamp, target);
        match current.as_mut() {
            Some(bucket) if bucket.start == start => bucket.absorb(bar),
            _ => {
                if let Some(done) = current.take() {
                    if done.complete {
                        out.push(done.bar);
                    }
                }
                current = Some(Bucket::open(start, bar));
            }
        }
    }

    if let Some(done) = current {
        if done.complete {
            out.push(done.bar);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn hourly(prices: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: start + TimeDelta::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn four_hour_bucket_combines_ohlcv() {
        let bars = hourly(&[
            (10.0, 12.0, 9.0, 11.0),
            (11.0, 15.0, 10.0, 14.0),
            (14.0, 14.5, 8.0, 9.0),
            (9.0, 10.0, 8.5, 9.5),
        ]);
        let out = aggregate(&bars, "4h".parse().unwrap());

        assert_eq!(out.len(), 1);
        let bar = &out[0];
        assert_eq!(bar.timestamp, bars[0].timestamp);
        assert_eq!(bar.open, 10.0);
        assert_eq!(bar.high, 15.0);
        assert_eq!(bar.low, 8.0);
        assert_eq!(bar.close, 9.5);
        assert_eq!(bar.volume, 40.0);
    }

    #[test]
    fn buckets_align_to_midnight() {
        // Starts at 02:00, so the first 8h bucket (00:00-08:00) holds 6 bars.
        let mut bars = hourly(&[(1.0, 1.0, 1.0, 1.0); 10]);
        for bar in &mut bars {
            bar.timestamp += TimeDelta::hours(2);
        }
        let out = aggregate(&bars, "8h".parse().unwrap());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp.format("%H:%M").to_string(), "00:00");
        assert_eq!(out[0].volume, 60.0);
        assert_eq!(out[1].timestamp.format("%H:%M").to_string(), "08:00");
        assert_eq!(out[1].volume, 40.0);
    }

    #[test]
    fn weekly_buckets_start_on_monday() {
        // Daily bars from Wednesday 2024-01-03 through Friday 2024-01-12.
        let mut bars = hourly(&[(1.0, 1.0, 1.0, 1.0); 10]);
        for (i, bar) in bars.iter_mut().enumerate() {
            bar.timestamp = NaiveDate::from_ymd_opt(2024, 1, 3 + i as u32)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
        }
        let out = aggregate(&bars, "1wk".parse().unwrap());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp.format("%Y-%m-%d %a").to_string(), "2024-01-01 Mon");
        assert_eq!(out[0].volume, 50.0);
        assert_eq!(out[1].timestamp.format("%Y-%m-%d %a").to_string(), "2024-01-08 Mon");
        assert_eq!(out[1].volume, 50.0);
    }

    #[test]
    fn gaps_produce_no_empty_buckets() {
        let mut bars = hourly(&[(1.0, 1.0, 1.0, 1.0); 2]);
        bars[1].timestamp += TimeDelta::hours(20);
        let out = aggregate(&bars, "4h".parse().unwrap());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn bucket_with_incomplete_bar_is_dropped() {
        let mut bars = hourly(&[(1.0, 2.0, 0.5, 1.5); 8]);
        bars[5].close = f64::NAN;
        let out = aggregate(&bars, "4h".parse().unwrap());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp, bars[0].timestamp);
    }

    #[test]
    fn empty_input() {
        assert!(aggregate(&[], "1d".parse().unwrap()).is_empty());
    }
}
