use arrow::{
    array::{Array, AsArray},
    compute::cast,
    datatypes::DataType,
};
use chrono::NaiveDate;
use tracing::debug;

use crate::error::AnalysisError;
use crate::process::{date_parser, utils, RawTable};
use crate::series::{Keep, Series};

/// Columns carried into a resampled series.
pub const OHLC: [&str; 4] = ["Open", "High", "Low", "Close"];

/// Clean one instrument's table down to a single value column.
///
/// The output column is named `"<value_column> <instrument>"` so series from
/// different instruments can sit side by side after alignment.
#[tracing::instrument(level = "debug", skip(table), fields(table = %table.name))]
pub fn normalize(table: &RawTable, value_column: &str) -> Result<Series, AnalysisError> {
    let value_column = value_column.trim();
    let dates = parse_dates(table)?;
    let values = numeric_column(table, value_column)?;

    let records = dates
        .into_iter()
        .zip(values)
        .filter_map(|(date, value)| Some((date?, vec![value?])));
    let series = Series::from_records(
        vec![format!("{} {}", value_column, table.name)],
        records,
        Keep::Last,
    );

    debug!(rows = series.len(), "normalized");
    Ok(series)
}

/// Clean a table into `Open, High, Low, Close`, keeping bare column names.
#[tracing::instrument(level = "debug", skip(table), fields(table = %table.name))]
pub fn normalize_ohlc(table: &RawTable) -> Result<Series, AnalysisError> {
    let dates = parse_dates(table)?;
    let columns = OHLC
        .iter()
        .map(|name| numeric_column(table, name))
        .collect::<Result<Vec<_>, _>>()?;

    let records = dates.into_iter().enumerate().filter_map(|(row, date)| {
        let values = columns
            .iter()
            .map(|col| col[row])
            .collect::<Option<Vec<f64>>>()?;
        Some((date?, values))
    });
    let series = Series::from_records(OHLC.iter().map(|s| s.to_string()).collect(), records, Keep::Last);

    debug!(rows = series.len(), "normalized OHLC");
    Ok(series)
}

/// Parse the `Date` column under the first format that fits every cell.
fn parse_dates(table: &RawTable) -> Result<Vec<Option<NaiveDate>>, AnalysisError> {
    let array = table
        .find_column("Date")
        .ok_or_else(|| AnalysisError::MissingColumn {
            table: table.name.clone(),
            column: "Date".into(),
        })?;
    let text = cast(array, &DataType::Utf8).map_err(|_| AnalysisError::DateFormat {
        table: table.name.clone(),
        tried: date_parser::DATE_FORMATS.join(" | "),
    })?;
    let cells: Vec<Option<&str>> = text
        .as_string::<i32>()
        .iter()
        .map(|cell| cell.filter(|c| !c.trim().is_empty()))
        .collect();

    let (fmt, dates) =
        date_parser::parse_date_column(&cells).ok_or_else(|| AnalysisError::DateFormat {
            table: table.name.clone(),
            tried: date_parser::DATE_FORMATS.join(" | "),
        })?;
    debug!(table = %table.name, format = fmt, cells = text.len(), "parsed Date column");
    Ok(dates)
}

/// Locate `name` (Close falls back to Price) and coerce it to floats.
fn numeric_column(table: &RawTable, name: &str) -> Result<Vec<Option<f64>>, AnalysisError> {
    let array = table
        .find_column(name)
        .or_else(|| {
            name.eq_ignore_ascii_case("Close")
                .then(|| table.find_column("Price"))
                .flatten()
        })
        .ok_or_else(|| AnalysisError::MissingColumn {
            table: table.name.clone(),
            column: name.to_string(),
        })?;
    utils::coerce_f64_column(&table.name, name, array)
}
