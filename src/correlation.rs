//! Pearson, Kendall tau-b and Spearman correlation over aligned frames.

use std::{cmp::Ordering, fmt};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::align::AlignedFrame;
use crate::error::AnalysisError;

/// Correlation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    Pearson,
    Kendall,
    Spearman,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Pearson, Method::Kendall, Method::Spearman];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Pearson => "Pearson",
            Method::Kendall => "Kendall",
            Method::Spearman => "Spearman",
        }
    }

    /// Signed coefficient of `x` against `y`.
    pub fn coefficient(&self, x: &[f64], y: &[f64]) -> Result<f64, CoefficientError> {
        check_inputs(x, y)?;
        Ok(match self {
            Method::Pearson => pearson_unchecked(x, y),
            Method::Kendall => kendall_tau_b_unchecked(x, y),
            Method::Spearman => pearson_unchecked(&rank(x), &rank(y)),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a coefficient could not be computed, before column labels are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientError {
    /// Fewer than two paired observations.
    TooShort(usize),
    /// The first (`X`) or second (`Y`) input is constant.
    ConstantX,
    ConstantY,
}

fn check_inputs(x: &[f64], y: &[f64]) -> Result<(), CoefficientError> {
    let n = x.len().min(y.len());
    if x.len() != y.len() || n < 2 {
        return Err(CoefficientError::TooShort(n));
    }
    if is_constant(x) {
        return Err(CoefficientError::ConstantX);
    }
    if is_constant(y) {
        return Err(CoefficientError::ConstantY);
    }
    Ok(())
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Product-moment correlation. Inputs must be equal length and non-constant.
fn pearson_unchecked(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Kendall tau-b from concordant/discordant pair counts with tie correction.
fn kendall_tau_b_unchecked(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    let mut concordant: i64 = 0;
    let mut discordant: i64 = 0;
    let mut ties_x: i64 = 0;
    let mut ties_y: i64 = 0;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i].partial_cmp(&x[j]).unwrap_or(Ordering::Equal);
            let dy = y[i].partial_cmp(&y[j]).unwrap_or(Ordering::Equal);
            match (dx, dy) {
                (Ordering::Equal, Ordering::Equal) => {
                    ties_x += 1;
                    ties_y += 1;
                }
                (Ordering::Equal, _) => ties_x += 1,
                (_, Ordering::Equal) => ties_y += 1,
                (a, b) if a == b => concordant += 1,
                _ => discordant += 1,
            }
        }
    }

    let pairs = (n * (n - 1) / 2) as i64;
    let denom = (((pairs - ties_x) as f64) * ((pairs - ties_y) as f64)).sqrt();
    ((concordant - discordant) as f64 / denom).clamp(-1.0, 1.0)
}

/// Ranks starting at 1, ties get the average of the ranks they span.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Absolute correlation between two columns under each method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub first: String,
    pub second: String,
    pub rows: usize,
    pub pearson: f64,
    pub kendall: f64,
    pub spearman: f64,
}

impl CorrelationResult {
    pub fn get(&self, method: Method) -> f64 {
        match method {
            Method::Pearson => self.pearson,
            Method::Kendall => self.kendall,
            Method::Spearman => self.spearman,
        }
    }
}

impl fmt::Display for CorrelationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in Method::ALL.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{} correlation between {} and {} is {}",
                method,
                self.first,
                self.second,
                self.get(*method)
            )?;
        }
        Ok(())
    }
}

fn labelled(err: CoefficientError, col_x: &str, col_y: &str) -> AnalysisError {
    match err {
        CoefficientError::TooShort(rows) => AnalysisError::InsufficientData { rows },
        CoefficientError::ConstantX => AnalysisError::DegenerateInput {
            column: col_x.to_string(),
        },
        CoefficientError::ConstantY => AnalysisError::DegenerateInput {
            column: col_y.to_string(),
        },
    }
}

/// Correlate `col_a` with `col_b` over every row of `frame`.
///
/// Coefficients are reported as magnitudes; the sign is dropped.
#[tracing::instrument(level = "debug", skip(frame))]
pub fn correlate(
    frame: &AlignedFrame,
    col_a: &str,
    col_b: &str,
) -> Result<CorrelationResult, AnalysisError> {
    let x = frame.require(col_a)?;
    let y = frame.require(col_b)?;

    let mut coefficients = [0.0; 3];
    for (slot, method) in coefficients.iter_mut().zip(Method::ALL) {
        *slot = method
            .coefficient(x, y)
            .map_err(|e| labelled(e, col_a, col_b))?
            .abs();
    }
    let [pearson, kendall, spearman] = coefficients;
    debug!(rows = frame.len(), pearson, kendall, spearman, "correlated");

    Ok(CorrelationResult {
        first: col_a.to_string(),
        second: col_b.to_string(),
        rows: frame.len(),
        pearson,
        kendall,
        spearman,
    })
}

/// Pairwise correlation of every column in a frame under one method.
///
/// Signed, symmetric, diagonal 1. Pairs that are undefined (constant column,
/// too few rows) hold `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub method: Method,
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i).and_then(|row| row.get(j).copied().flatten())
    }
}

/// Compute the full correlation matrix of `frame` under `method`.
///
/// Column pairs are independent, so they are evaluated in parallel.
#[tracing::instrument(level = "debug", skip(frame), fields(columns = frame.columns().len()))]
pub fn correlation_matrix(frame: &AlignedFrame, method: Method) -> CorrelationMatrix {
    let columns = frame.columns();
    let n = columns.len();

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let coefficients: Vec<Option<f64>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            method
                .coefficient(&columns[i].values, &columns[j].values)
                .ok()
        })
        .collect();

    let mut values = vec![vec![None; n]; n];
    for (i, col) in columns.iter().enumerate() {
        if check_inputs(&col.values, &col.values).is_ok() {
            values[i][i] = Some(1.0);
        }
    }
    for (&(i, j), coef) in pairs.iter().zip(coefficients) {
        values[i][j] = coef;
        values[j][i] = coef;
    }

    CorrelationMatrix {
        method,
        labels: columns.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}
