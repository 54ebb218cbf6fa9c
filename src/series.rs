// src/series.rs

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AnalysisError;

/// A named column of finite values, one per index date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Which record survives when the same date shows up more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    First,
    Last,
}

/// Date-indexed columnar series.
///
/// Invariants: `dates` is strictly ascending, every column holds exactly
/// `dates.len()` finite values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Series {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl Series {
    /// An empty series carrying the given column names.
    pub fn empty<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            dates: Vec::new(),
            columns: names
                .into_iter()
                .map(|name| Column {
                    name: name.into(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Build a series from unordered records.
    ///
    /// Records with a non-finite value are dropped first, the rest are sorted
    /// by date (stable) and collapsed to one record per date according to `keep`.
    pub fn from_records(
        names: Vec<String>,
        records: impl IntoIterator<Item = (NaiveDate, Vec<f64>)>,
        keep: Keep,
    ) -> Self {
        let width = names.len();
        let mut records: Vec<(NaiveDate, Vec<f64>)> = records
            .into_iter()
            .filter(|(_, values)| values.len() == width && values.iter().all(|v| v.is_finite()))
            .collect();
        records.sort_by_key(|(date, _)| *date);

        let mut deduped: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.last_mut() {
                Some(last) if last.0 == record.0 => {
                    if keep == Keep::Last {
                        *last = record;
                    }
                }
                _ => deduped.push(record),
            }
        }

        let mut dates = Vec::with_capacity(deduped.len());
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(deduped.len()),
            })
            .collect();
        for (date, values) in deduped {
            dates.push(date);
            for (col, v) in columns.iter_mut().zip(values) {
                col.values.push(v);
            }
        }

        Self { dates, columns }
    }

    /// Assemble from parts that already satisfy the invariants.
    pub(crate) fn from_parts(dates: Vec<NaiveDate>, columns: Vec<Column>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(columns.iter().all(|c| c.values.len() == dates.len()));
        Self { dates, columns }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`Series::column`], failing with `MissingColumn` labelled by `owner`.
    pub fn require(&self, name: &str, owner: &str) -> Result<&[f64], AnalysisError> {
        self.column(name).ok_or_else(|| AnalysisError::MissingColumn {
            table: owner.to_string(),
            column: name.to_string(),
        })
    }

    /// Values of every column at row `idx`.
    pub fn row(&self, idx: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c.values[idx]).collect()
    }

    /// Keep only `names`, in that order.
    pub fn select(&self, names: &[&str], owner: &str) -> Result<Series, AnalysisError> {
        let columns = names
            .iter()
            .map(|name| {
                self.require(name, owner).map(|values| Column {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Series::from_parts(self.dates.clone(), columns))
    }

    /// Rename every column to `"<name> <suffix>"`.
    pub fn with_suffix(mut self, suffix: &str) -> Series {
        for col in &mut self.columns {
            col.name = format!("{} {}", col.name, suffix);
        }
        self
    }

    pub fn is_strictly_ascending(&self) -> bool {
        self.dates.windows(2).all(|w| w[0] < w[1])
    }
}
