// src/export.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::Datelike;
use parquet::{
    arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties,
};
use std::{fs, fs::File, path::Path, sync::Arc};
use tracing::info;

use crate::series::Series;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A `Date` (Date32) column followed by one non-null Float64 column per field.
pub fn to_record_batch(series: &Series) -> Result<RecordBatch> {
    let mut fields = vec![Field::new("Date", DataType::Date32, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Date32Array::from_iter_values(
        series
            .dates()
            .iter()
            .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
    ))];

    for column in series.columns() {
        fields.push(Field::new(&column.name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(column.values.clone())));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .context("building record batch from series")
}

/// Write `series` to `path` as Snappy-compressed Parquet.
///
/// The file is written under a `.tmp` name and renamed once closed, so a
/// failed export never leaves a truncated file at `path`.
#[tracing::instrument(level = "info", skip(series), fields(rows = series.len(), path = %path.as_ref().display()))]
pub fn write_parquet<P: AsRef<Path>>(series: &Series, path: P) -> Result<u64> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let batch = to_record_batch(series)?;
    let tmp_path = path.with_extension("parquet.tmp");

    // 1) write under the temporary name
    let file = File::create(&tmp_path)
        .with_context(|| format!("creating file {}", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    // 2) move into place
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;

    let size = fs::metadata(path).context("getting file metadata")?.len();
    info!(bytes = size, "wrote parquet");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tests::init_test_logging;
    use crate::series::Keep;
    use arrow::array::AsArray;
    use arrow::datatypes::{Date32Type, Float64Type};
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    #[test]
    fn test_write_parquet_reads_back() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let series = Series::from_records(
            vec!["High Gold".to_string(), "High Silver".to_string()],
            vec![
                (NaiveDate::from_ymd_opt(1970, 1, 2).unwrap(), vec![1.5, 20.0]),
                (NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(), vec![2.5, 21.0]),
            ],
            Keep::First,
        );

        let path = dir.path().join("out").join("usd_features.parquet");
        let bytes = write_parquet(&series, &path)?;
        assert!(bytes > 0);
        assert!(!path.with_extension("parquet.tmp").exists());

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];

        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["Date", "High Gold", "High Silver"]);

        let dates = batch.column(0).as_primitive::<Date32Type>();
        assert_eq!(dates.value(0), 1);
        assert_eq!(dates.value(1), 18_264);
        let silver = batch.column(2).as_primitive::<Float64Type>();
        assert_eq!(silver.value(1), 21.0);
        Ok(())
    }
}
