use std::{fmt, str::FromStr};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::process::convert::OHLC;
use crate::series::{Keep, Series};

/// Columns of every resampled series, in output order.
pub const RESAMPLED_COLUMNS: [&str; 6] = ["Open", "Low", "High", "Close", "Mean", "diff"];

/// Bar size of a resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Timeframe::Daily),
            "1w" | "w" | "weekly" => Ok(Timeframe::Weekly),
            other => Err(format!("unknown timeframe `{}`, expected 1d or 1w", other)),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1w",
        })
    }
}

impl Timeframe {
    /// Distance between consecutive bars, when the calendar fixes it.
    ///
    /// Daily rows follow the trading calendar, so any two neighbours count as
    /// consecutive.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Timeframe::Daily => None,
            Timeframe::Weekly => Some(Duration::weeks(1)),
        }
    }
}

/// The Monday that closes the week containing `date` (Tuesday..Monday weeks).
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let ahead = (7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(ahead as i64)
}

/// Convert an OHLC series to `timeframe` and add the `Mean` / `diff` fields.
///
/// The first bar has no `diff` and is dropped. An empty input gives an empty
/// output.
#[tracing::instrument(level = "debug", skip(series), fields(rows = series.len()))]
pub fn resample(series: &Series, timeframe: Timeframe) -> Result<Series, AnalysisError> {
    if series.is_empty() {
        return Ok(Series::empty(RESAMPLED_COLUMNS));
    }
    let bars = match timeframe {
        Timeframe::Daily => series.select(&OHLC, "resample input")?,
        Timeframe::Weekly => aggregate_weekly(series)?,
    };
    let out = add_mean_and_diff(&bars, timeframe)?;
    debug!(%timeframe, bars = bars.len(), out = out.len(), "resampled");
    Ok(out)
}

/// Group daily OHLC rows into Monday-ending weeks.
///
/// Open is the first observation of the week, High the max, Low the min and
/// Close the last observation. Bars are labelled with the week's Monday.
pub fn aggregate_weekly(series: &Series) -> Result<Series, AnalysisError> {
    let ohlc = series.select(&OHLC, "resample input")?;

    let mut bars: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    for (idx, date) in ohlc.dates().iter().enumerate() {
        let week = week_ending(*date);
        let row = ohlc.row(idx);
        match bars.last_mut() {
            Some((label, bar)) if *label == week => {
                bar[1] = bar[1].max(row[1]);
                bar[2] = bar[2].min(row[2]);
                bar[3] = row[3];
            }
            _ => bars.push((week, row)),
        }
    }

    Ok(Series::from_records(
        OHLC.iter().map(|s| s.to_string()).collect(),
        bars,
        Keep::First,
    ))
}

/// Append `Mean = (Low + High + Close) / 3` and `diff = Mean(t) - Mean(t-1)`.
///
/// Output columns are [`RESAMPLED_COLUMNS`]. A bar whose predecessor is not
/// exactly one `timeframe` period earlier has no `diff` and is dropped, as is
/// the first bar.
pub fn add_mean_and_diff(ohlc: &Series, timeframe: Timeframe) -> Result<Series, AnalysisError> {
    let open = ohlc.require("Open", "OHLC series")?;
    let high = ohlc.require("High", "OHLC series")?;
    let low = ohlc.require("Low", "OHLC series")?;
    let close = ohlc.require("Close", "OHLC series")?;

    let mean: Vec<f64> = (0..ohlc.len())
        .map(|i| (low[i] + high[i] + close[i]) / 3.0)
        .collect();

    let dates = ohlc.dates();
    let records = (1..ohlc.len())
        .filter(|&i| match timeframe.period() {
            Some(step) => dates[i] - dates[i - 1] == step,
            None => true,
        })
        .map(|i| {
            (
                dates[i],
                vec![open[i], low[i], high[i], close[i], mean[i], mean[i] - mean[i - 1]],
            )
        });

    Ok(Series::from_records(
        RESAMPLED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        records,
        Keep::First,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ohlc(rows: Vec<(NaiveDate, [f64; 4])>) -> Series {
        Series::from_records(
            OHLC.iter().map(|s| s.to_string()).collect(),
            rows.into_iter().map(|(d, v)| (d, v.to_vec())),
            Keep::First,
        )
    }

    #[test]
    fn test_week_ending_is_monday() {
        // 2024-01-08 is a Monday
        assert_eq!(week_ending(d(2024, 1, 8)), d(2024, 1, 8));
        assert_eq!(week_ending(d(2024, 1, 2)), d(2024, 1, 8));
        assert_eq!(week_ending(d(2024, 1, 7)), d(2024, 1, 8));
        assert_eq!(week_ending(d(2024, 1, 9)), d(2024, 1, 15));
    }

    #[test]
    fn test_weekly_aggregation_single_week() {
        let daily = ohlc(vec![
            (d(2024, 1, 2), [10.0, 12.0, 9.0, 11.0]),
            (d(2024, 1, 3), [11.0, 15.0, 10.0, 14.0]),
            (d(2024, 1, 4), [14.0, 14.5, 8.0, 9.0]),
            (d(2024, 1, 5), [9.0, 13.0, 8.5, 12.0]),
            (d(2024, 1, 8), [12.0, 13.5, 11.0, 13.0]),
        ]);
        let weekly = aggregate_weekly(&daily).unwrap();

        assert_eq!(weekly.dates(), &[d(2024, 1, 8)]);
        assert_eq!(weekly.row(0), vec![10.0, 15.0, 8.0, 13.0]);
    }

    #[test]
    fn test_weekly_resample_adds_derived_fields() {
        let daily = ohlc(vec![
            (d(2024, 1, 2), [10.0, 12.0, 9.0, 11.0]),
            (d(2024, 1, 8), [11.0, 15.0, 9.0, 12.0]),
            (d(2024, 1, 9), [12.0, 18.0, 12.0, 15.0]),
            (d(2024, 1, 12), [15.0, 16.0, 13.0, 14.0]),
        ]);
        let weekly = resample(&daily, Timeframe::Weekly).unwrap();

        assert_eq!(weekly.column_names(), RESAMPLED_COLUMNS.to_vec());
        // first week only survives as the base for diff
        assert_eq!(weekly.dates(), &[d(2024, 1, 15)]);
        let mean_first = (9.0 + 15.0 + 12.0) / 3.0;
        let mean_second = (12.0 + 18.0 + 14.0) / 3.0;
        assert_eq!(weekly.column("Mean").unwrap(), &[mean_second]);
        assert_eq!(weekly.column("diff").unwrap(), &[mean_second - mean_first]);
        assert_eq!(weekly.column("Open").unwrap(), &[12.0]);
    }

    #[test]
    fn test_weekly_bar_after_empty_week_is_dropped() {
        // nothing trades in the week ending 2024-01-15
        let daily = ohlc(vec![
            (d(2024, 1, 2), [10.0, 12.0, 9.0, 11.0]),
            (d(2024, 1, 16), [11.0, 15.0, 9.0, 12.0]),
        ]);
        let weekly = resample(&daily, Timeframe::Weekly).unwrap();
        assert!(weekly.is_empty());

        let daily = ohlc(vec![
            (d(2024, 1, 2), [10.0, 12.0, 9.0, 11.0]),
            (d(2024, 1, 16), [11.0, 15.0, 9.0, 12.0]),
            (d(2024, 1, 23), [12.0, 18.0, 12.0, 15.0]),
        ]);
        let weekly = resample(&daily, Timeframe::Weekly).unwrap();
        assert_eq!(weekly.dates(), &[d(2024, 1, 29)]);
        let mean_prev = (9.0 + 15.0 + 12.0) / 3.0;
        let mean_last = (12.0 + 18.0 + 15.0) / 3.0;
        assert_eq!(weekly.column("diff").unwrap(), &[mean_last - mean_prev]);
    }

    #[test]
    fn test_daily_diff_spans_weekends() {
        let daily = ohlc(vec![
            (d(2024, 1, 5), [1.0, 3.0, 0.0, 0.0]),
            (d(2024, 1, 8), [2.0, 6.0, 3.0, 3.0]),
        ]);
        let out = add_mean_and_diff(&daily, Timeframe::Daily).unwrap();
        assert_eq!(out.dates(), &[d(2024, 1, 8)]);
        assert_eq!(out.column("diff").unwrap(), &[3.0]);
    }

    #[test]
    fn test_daily_is_identity_plus_derived() {
        let daily = ohlc(vec![
            (d(2024, 1, 2), [1.0, 3.0, 0.0, 0.0]),
            (d(2024, 1, 3), [2.0, 6.0, 3.0, 3.0]),
        ]);
        let out = resample(&daily, Timeframe::Daily).unwrap();
        assert_eq!(out.dates(), &[d(2024, 1, 3)]);
        assert_eq!(out.row(0), vec![2.0, 3.0, 6.0, 3.0, 4.0, 3.0]);
        assert!(out.is_strictly_ascending());
    }

    #[test]
    fn test_empty_input() {
        let out = resample(&Series::default(), Timeframe::Weekly).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.column_names(), RESAMPLED_COLUMNS.to_vec());
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("1w".parse::<Timeframe>().unwrap(), Timeframe::Weekly);
        assert_eq!("Daily".parse::<Timeframe>().unwrap(), Timeframe::Daily);
        assert!("1m".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::Weekly.to_string(), "1w");
    }
}
