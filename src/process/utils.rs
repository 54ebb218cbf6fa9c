use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray},
    compute::cast,
    datatypes::{DataType, Float64Type},
};

use crate::error::AnalysisError;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Header cleanup: drops a UTF-8 byte-order mark, then [`clean_str`].
pub fn clean_header(raw: &str) -> String {
    clean_str(raw.trim_start_matches('\u{feff}'))
}

/// `"1,234.56"` → `"1234.56"`.
pub fn strip_thousands(raw: &str) -> String {
    clean_str(raw).replace(',', "")
}

/// Coerce a whole column to `f64`.
///
/// String columns have their thousands separators stripped in one pass and
/// are then cast as a unit; numeric columns are cast directly. Empty cells and
/// non-finite values come back as `None`. A non-empty cell that fails to parse
/// is an error naming the cell.
pub fn coerce_f64_column(
    table: &str,
    column: &str,
    array: &ArrayRef,
) -> Result<Vec<Option<f64>>, AnalysisError> {
    let source: ArrayRef = match array.data_type() {
        DataType::Utf8 => {
            let stripped: StringArray = array
                .as_string::<i32>()
                .iter()
                .map(|cell| cell.map(strip_thousands).filter(|s| !s.is_empty()))
                .collect();
            Arc::new(stripped)
        }
        _ => Arc::clone(array),
    };

    let unparsable = |row: usize| AnalysisError::NumericParse {
        table: table.to_string(),
        column: column.to_string(),
        row,
        value: match array.data_type() {
            DataType::Utf8 => array.as_string::<i32>().value(row).to_string(),
            other => other.to_string(),
        },
    };

    let parsed = cast(&source, &DataType::Float64).map_err(|_| unparsable(0))?;
    let parsed = parsed.as_primitive::<Float64Type>();

    let mut out = Vec::with_capacity(parsed.len());
    for (row, value) in parsed.iter().enumerate() {
        match value {
            Some(v) => out.push(Some(v).filter(|v| v.is_finite())),
            None if source.is_null(row) => out.push(None),
            None => return Err(unparsable(row)),
        }
    }
    Ok(out)
}
