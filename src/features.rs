// src/features.rs

use anyhow::Result;
use serde::Serialize;
use std::{fmt, str::FromStr};
use tracing::{debug, info};

use crate::align::{align_all, AlignedFrame, DateRange};
use crate::catalog::Catalog;
use crate::error::AnalysisError;
use crate::process::{normalize, normalize_ohlc, resample, RawTable, Timeframe};
use crate::process::{convert::OHLC, resample::add_mean_and_diff};
use crate::series::{Keep, Series};
use crate::store::DataStore;

/// Identifier of the dollar index every country index is built from.
pub const DOLLAR_INDEX: &str = "US Dollar Index";

/// Currencies quoted as `USD<code>`; every other code is quoted `<code>USD`.
const USD_BASE_QUOTES: [&str; 4] = ["CAD", "JPY", "SEK", "CHF"];

/// Value picked from each instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueField {
    Open,
    High,
    Low,
    Close,
    Mean,
    Diff,
}

impl ValueField {
    pub fn header(&self) -> &'static str {
        match self {
            ValueField::Open => "Open",
            ValueField::High => "High",
            ValueField::Low => "Low",
            ValueField::Close => "Close",
            ValueField::Mean => "Mean",
            ValueField::Diff => "diff",
        }
    }

    /// Raw price columns can be read straight off the table; derived ones
    /// need the resampling pass.
    pub fn is_price(&self) -> bool {
        OHLC.contains(&self.header())
    }
}

impl fmt::Display for ValueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for ValueField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(ValueField::Open),
            "high" => Ok(ValueField::High),
            "low" => Ok(ValueField::Low),
            "close" | "price" => Ok(ValueField::Close),
            "mean" => Ok(ValueField::Mean),
            "diff" => Ok(ValueField::Diff),
            other => Err(format!(
                "{} is not a column, pick one of open, high, low, close, mean, diff",
                other
            )),
        }
    }
}

/// Turn one raw table into a single-column series named `"<field> <instrument>"`.
///
/// Daily price fields are normalized directly. Weekly bars and the derived
/// `Mean` / `diff` fields go through OHLC normalization and resampling.
pub fn series_from_table(
    table: &RawTable,
    field: ValueField,
    timeframe: Timeframe,
) -> Result<Series, AnalysisError> {
    if timeframe == Timeframe::Daily && field.is_price() {
        return normalize(table, field.header());
    }
    let bars = resample(&normalize_ohlc(table)?, timeframe)?;
    Ok(bars
        .select(&[field.header()], &table.name)?
        .with_suffix(&table.name))
}

/// Load `id` from the store and reduce it with [`series_from_table`].
pub fn instrument_series(
    store: &DataStore,
    id: &str,
    field: ValueField,
    timeframe: Timeframe,
) -> Result<Series> {
    let table = store.load(id)?;
    Ok(series_from_table(&table, field, timeframe)?)
}

/// Series of two instruments ready to be aligned.
///
/// Picking the same instrument twice is allowed: the second copy gets a
/// ` (2)` suffix so the columns stay distinct.
pub fn instrument_pair(
    store: &DataStore,
    first: &str,
    second: &str,
    field: ValueField,
    timeframe: Timeframe,
) -> Result<(Series, Series)> {
    let a = instrument_series(store, first, field, timeframe)?;
    let b = if first == second {
        a.clone().with_suffix("(2)")
    } else {
        instrument_series(store, second, field, timeframe)?
    };
    Ok((a, b))
}

/// One series per instrument of the `code` feature set, in catalog order.
#[tracing::instrument(level = "info", skip(store, catalog))]
pub fn feature_series(
    store: &DataStore,
    catalog: &Catalog,
    code: &str,
    field: ValueField,
    timeframe: Timeframe,
) -> Result<Vec<Series>> {
    let ids = catalog.feature_set(code)?;
    let tables = store.load_many(ids)?;
    let series = tables
        .iter()
        .map(|t| series_from_table(t, field, timeframe))
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = series.len(), "built feature series");
    Ok(series)
}

/// The feature set of `code` as one aligned table.
pub fn feature_frame(
    store: &DataStore,
    catalog: &Catalog,
    code: &str,
    field: ValueField,
    timeframe: Timeframe,
    range: DateRange,
) -> Result<AlignedFrame> {
    let series = feature_series(store, catalog, code, field, timeframe)?;
    let refs: Vec<&Series> = series.iter().collect();
    Ok(align_all(&refs, range)?)
}

/// Synthetic strength index of a currency against the dollar index.
///
/// USD is the dollar index itself. For a currency quoted `USD<code>` the
/// index is dollar ÷ pair, otherwise pair × dollar, field by field on the
/// shared dates. `Mean` and `diff` are recomputed afterwards.
#[tracing::instrument(level = "info", skip(store))]
pub fn country_index(store: &DataStore, code: &str, timeframe: Timeframe) -> Result<Series> {
    let code = code.trim().to_uppercase();
    let dollar = resample(&normalize_ohlc(&store.load(DOLLAR_INDEX)?)?, timeframe)?;
    if code == "USD" {
        return Ok(dollar);
    }

    let usd_base = USD_BASE_QUOTES.contains(&code.as_str());
    let ticker = if usd_base {
        format!("USD{}", code)
    } else {
        format!("{}USD", code)
    };
    let pair = resample(&normalize_ohlc(&store.load(&ticker)?)?, timeframe)?;

    let combined = combine_ohlc(&dollar, &pair, |d, p| if usd_base { d / p } else { d * p })?;
    let index = add_mean_and_diff(&combined, timeframe)?;
    debug!(%ticker, rows = index.len(), "country index");
    Ok(index)
}

/// Apply `op` to each OHLC field on the dates both series share.
fn combine_ohlc(
    a: &Series,
    b: &Series,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Series, AnalysisError> {
    let left = OHLC
        .iter()
        .map(|c| a.require(c, DOLLAR_INDEX))
        .collect::<Result<Vec<_>, _>>()?;
    let right = OHLC
        .iter()
        .map(|c| b.require(c, "currency pair"))
        .collect::<Result<Vec<_>, _>>()?;

    let records = a.dates().iter().enumerate().filter_map(|(i, date)| {
        let j = b.dates().binary_search(date).ok()?;
        let values = left
            .iter()
            .zip(&right)
            .map(|(l, r)| op(l[i], r[j]))
            .collect();
        Some((*date, values))
    });

    Ok(Series::from_records(
        OHLC.iter().map(|s| s.to_string()).collect(),
        records,
        Keep::First,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write_ohlc(dir: &std::path::Path, id: &str, rows: &[(&str, [f64; 4])]) {
        let mut text = String::from("Date,Price,Open,High,Low\n");
        for (date, [open, high, low, close]) in rows {
            text.push_str(&format!(
                "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"\n",
                date, close, open, high, low
            ));
        }
        fs::write(dir.join(format!("{}.csv", id)), text).unwrap();
    }

    #[test]
    fn test_value_field_parse() {
        assert_eq!("HIGH".parse::<ValueField>().unwrap(), ValueField::High);
        assert_eq!("price".parse::<ValueField>().unwrap(), ValueField::Close);
        assert!("volume".parse::<ValueField>().is_err());
        assert!(ValueField::Low.is_price());
        assert!(!ValueField::Diff.is_price());
    }

    #[test]
    fn test_country_index_multiplies_and_divides() -> Result<()> {
        let dir = tempdir()?;
        let days = ["Jan 02, 2020", "Jan 03, 2020", "Jan 06, 2020"];
        write_ohlc(
            dir.path(),
            DOLLAR_INDEX,
            &[
                (days[0], [100.0, 100.0, 100.0, 100.0]),
                (days[1], [100.0, 110.0, 90.0, 100.0]),
                (days[2], [100.0, 120.0, 80.0, 100.0]),
            ],
        );
        write_ohlc(
            dir.path(),
            "EURUSD",
            &[
                (days[0], [1.0, 1.0, 1.0, 1.0]),
                (days[1], [2.0, 2.0, 2.0, 2.0]),
                (days[2], [2.0, 2.0, 2.0, 2.0]),
            ],
        );
        write_ohlc(
            dir.path(),
            "USDJPY",
            &[
                (days[0], [100.0, 100.0, 100.0, 100.0]),
                (days[1], [100.0, 100.0, 100.0, 100.0]),
                (days[2], [50.0, 50.0, 50.0, 50.0]),
            ],
        );
        let store = DataStore::new(dir.path());

        let usd = country_index(&store, "usd", Timeframe::Daily)?;
        assert_eq!(usd.dates(), &[d(2020, 1, 3), d(2020, 1, 6)]);

        let eur = country_index(&store, "EUR", Timeframe::Daily)?;
        // dollar rows first pass through resampling (drops Jan 2), then the
        // derived diff drops the first combined row
        assert_eq!(eur.dates(), &[d(2020, 1, 6)]);
        assert_eq!(eur.column("High").unwrap(), &[240.0]);
        assert_eq!(eur.column("Low").unwrap(), &[160.0]);

        let jpy = country_index(&store, "JPY", Timeframe::Daily)?;
        assert_eq!(jpy.dates(), &[d(2020, 1, 6)]);
        assert_eq!(jpy.column("High").unwrap(), &[120.0 / 50.0]);
        Ok(())
    }

    #[test]
    fn test_same_instrument_twice_correlates_perfectly() -> Result<()> {
        let dir = tempdir()?;
        write_ohlc(
            dir.path(),
            "Gold",
            &[
                ("01/02/2020", [1.0, 2.0, 0.5, 1.5]),
                ("01/03/2020", [1.5, 3.5, 1.0, 2.5]),
                ("01/06/2020", [2.5, 3.0, 2.0, 3.5]),
            ],
        );
        let store = DataStore::new(dir.path());

        let (a, b) = instrument_pair(&store, "Gold", "Gold", ValueField::High, Timeframe::Daily)?;
        assert_eq!(a.column_names(), vec!["High Gold"]);
        assert_eq!(b.column_names(), vec!["High Gold (2)"]);

        let frame = crate::align::align(&a, &b, DateRange::parse("2020", "2021")?)?;
        let result = crate::correlation::correlate(&frame, "High Gold", "High Gold (2)")?;
        assert!((result.pearson - 1.0).abs() < 1e-12);
        assert!((result.kendall - 1.0).abs() < 1e-12);
        assert!((result.spearman - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_feature_frame_aligns_feature_set() -> Result<()> {
        let dir = tempdir()?;
        write_ohlc(
            dir.path(),
            "Gold",
            &[
                ("01/02/2020", [1.0, 2.0, 0.5, 1.5]),
                ("01/03/2020", [1.5, 3.0, 1.0, 2.5]),
                ("01/06/2020", [2.5, 4.0, 2.0, 3.5]),
            ],
        );
        write_ohlc(
            dir.path(),
            "Silver",
            &[
                ("Jan 03, 2020", [10.0, 12.0, 9.0, 11.0]),
                ("Jan 06, 2020", [11.0, 13.0, 10.0, 12.0]),
            ],
        );
        let catalog = Catalog::from_yaml_str(
            "instruments:\n  gold: Gold\n  silver: Silver\nfeature_sets:\n  XAU: [Gold, Silver]\n",
        )?;
        let store = DataStore::new(dir.path());

        let frame = feature_frame(
            &store,
            &catalog,
            "XAU",
            ValueField::High,
            Timeframe::Daily,
            DateRange::parse("2020", "2021")?,
        )?;
        assert_eq!(frame.column_names(), vec!["High Gold", "High Silver"]);
        assert_eq!(frame.dates(), &[d(2020, 1, 3), d(2020, 1, 6)]);
        assert_eq!(frame.require("High Silver")?, &[12.0, 13.0]);

        let derived = feature_frame(
            &store,
            &catalog,
            "XAU",
            ValueField::Diff,
            Timeframe::Daily,
            DateRange::parse("2020", "2021")?,
        )?;
        assert_eq!(derived.column_names(), vec!["diff Gold", "diff Silver"]);
        assert_eq!(derived.dates(), &[d(2020, 1, 6)]);
        Ok(())
    }
}
