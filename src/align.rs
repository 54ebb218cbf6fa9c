// src/align.rs

use std::{collections::HashSet, fmt};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::process::date_parser::parse_partial_date;
use crate::series::{Column, Series};

/// Inclusive `[start, end]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse both bounds; `YYYY` and `YYYY-MM` mean the first day of that period.
    pub fn parse(start: &str, end: &str) -> Result<Self, AnalysisError> {
        let bound =
            |s: &str| parse_partial_date(s).ok_or_else(|| AnalysisError::InvalidDate(s.to_string()));
        Ok(Self::new(bound(start)?, bound(end)?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn empty_error(&self) -> AnalysisError {
        AnalysisError::EmptyRange {
            start: self.start.to_string(),
            end: self.end.to_string(),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Several series joined on date and cut to a window.
///
/// Every row has a value in every column; the index is the intersection of
/// the inputs' indices inside the window, ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedFrame {
    range: DateRange,
    table: Series,
}

impl AlignedFrame {
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.table.dates()
    }

    pub fn columns(&self) -> &[Column] {
        self.table.columns()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.table.column_names()
    }

    pub fn require(&self, name: &str) -> Result<&[f64], AnalysisError> {
        self.table.require(name, "aligned frame")
    }

    pub fn as_series(&self) -> &Series {
        &self.table
    }
}

/// Join two series on date and keep `range`.
pub fn align(a: &Series, b: &Series, range: DateRange) -> Result<AlignedFrame, AnalysisError> {
    align_all(&[a, b], range)
}

/// Join any number of series on date and keep `range`.
///
/// Dates missing from any input are dropped, which makes this an inner join.
/// Fails with `EmptyRange` when nothing is left.
#[tracing::instrument(level = "debug", skip(series), fields(inputs = series.len(), %range))]
pub fn align_all(series: &[&Series], range: DateRange) -> Result<AlignedFrame, AnalysisError> {
    let mut seen = HashSet::new();
    for name in series.iter().flat_map(|s| s.column_names()) {
        if !seen.insert(name) {
            return Err(AnalysisError::DuplicateColumn(name.to_string()));
        }
    }

    let Some((first, rest)) = series.split_first() else {
        return Err(range.empty_error());
    };

    let dates: Vec<NaiveDate> = first
        .dates()
        .iter()
        .copied()
        .filter(|d| range.contains(*d))
        .filter(|d| rest.iter().all(|s| s.dates().binary_search(d).is_ok()))
        .collect();
    if dates.is_empty() {
        return Err(range.empty_error());
    }

    let mut columns = Vec::new();
    for s in series {
        let rows: Vec<usize> = dates
            .iter()
            .filter_map(|d| s.dates().binary_search(d).ok())
            .collect();
        for col in s.columns() {
            columns.push(Column {
                name: col.name.clone(),
                values: rows.iter().map(|&r| col.values[r]).collect(),
            });
        }
    }

    debug!(rows = dates.len(), columns = columns.len(), "aligned");
    Ok(AlignedFrame {
        range,
        table: Series::from_parts(dates, columns),
    })
}
