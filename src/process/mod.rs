// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod resample;
pub mod utils;

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
    sync::Arc,
};
use tracing::debug;

pub use convert::{normalize, normalize_ohlc};
pub use resample::{resample, Timeframe};

use utils::clean_header;

const BATCH_SIZE: usize = 8_192;

/// One instrument's table exactly as the acquisition step left it on disk.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Identifier of the instrument, used to label derived columns.
    pub name: String,
    /// Text or already-numeric columns; headers are cleaned but otherwise untouched.
    pub batch: RecordBatch,
}

impl RawTable {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// Build an all-text table in memory. Short rows are padded with nulls.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[Vec<&str>]) -> Result<Self> {
        let fields: Vec<Field> = headers
            .iter()
            .map(|h| Field::new(clean_header(h), DataType::Utf8, true))
            .collect();
        let columns: Vec<ArrayRef> = (0..headers.len())
            .map(|i| {
                let arr: StringArray = rows.iter().map(|r| r.get(i).copied()).collect();
                Arc::new(arr) as ArrayRef
            })
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .with_context(|| format!("building in-memory table {}", name))?;
        Ok(Self::new(name, batch))
    }

    pub fn headers(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Case-insensitive lookup of a column by header.
    pub fn find_column(&self, header: &str) -> Option<&ArrayRef> {
        let header = header.trim();
        self.batch
            .schema()
            .fields()
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(header))
            .map(|idx| self.batch.column(idx))
    }
}

/// Parse CSV text into a [`RawTable`].
///
/// Column types are inferred over the whole input: plain numeric columns come
/// back as Float64/Int64, anything else (thousands separators, percentages,
/// dates) stays Utf8. The `Date` column is always kept as text.
pub fn read_raw_table<R: Read + Seek>(name: &str, mut reader: R) -> Result<RawTable> {
    let (inferred, records) = Format::default()
        .with_header(true)
        .infer_schema(&mut reader, None)
        .with_context(|| format!("inferring CSV schema for {}", name))?;
    reader.rewind()?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| {
            let header = clean_header(f.name());
            let ty = match f.data_type() {
                DataType::Float64 | DataType::Int64 if !header.eq_ignore_ascii_case("Date") => {
                    f.data_type().clone()
                }
                _ => DataType::Utf8,
            };
            Field::new(header, ty, true)
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let csv = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(reader)
        .with_context(|| format!("creating CSV reader for {}", name))?;
    let batches = csv
        .collect::<Result<Vec<RecordBatch>, _>>()
        .with_context(|| format!("reading CSV rows for {}", name))?;
    let batch = concat_batches(&schema, &batches)?;

    debug!(
        table = name,
        rows = batch.num_rows(),
        inferred_records = records,
        "loaded raw table"
    );
    Ok(RawTable::new(name, batch))
}

/// Open `path` and parse it with [`read_raw_table`].
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_raw_table<P: AsRef<Path>>(name: &str, path: P) -> Result<RawTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
    read_raw_table(name, BufReader::new(file))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    pub(crate) fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,fundcorr=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    pub(crate) const INVESTING_CSV: &str = "\u{feff}\"Date\",\"Price\",\"Open\",\"High\",\"Low\",\"Vol.\",\"Change %\"
\"Jan 07, 2020\",\"1,560.10\",\"1,566.00\",\"1,576.30\",\"1,555.60\",\"1.2K\",\"-0.31%\"
\"Jan 06, 2020\",\"1,565.00\",\"1,552.00\",\"1,590.90\",\"1,548.70\",\"-\",\"0.95%\"
\"Jan 03, 2020\",\"1,550.20\",\"1,528.00\",\"1,557.00\",\"1,526.70\",\"0.4K\",\"1.55%\"
";

    #[test]
    fn test_read_investing_layout() -> Result<()> {
        init_test_logging();
        let table = read_raw_table("Gold", Cursor::new(INVESTING_CSV))?;

        assert_eq!(table.num_rows(), 3);
        assert_eq!(
            table.headers(),
            vec!["Date", "Price", "Open", "High", "Low", "Vol.", "Change %"]
        );
        // thousands separators keep the column textual
        assert_eq!(
            table.find_column("price").unwrap().data_type(),
            &DataType::Utf8
        );
        Ok(())
    }

    #[test]
    fn test_plain_numbers_are_numeric() -> Result<()> {
        let csv = "Date,Open,Close\n01/02/2020,1.5,1.6\n01/03/2020,1.7,1.8\n";
        let table = read_raw_table("EURUSD", Cursor::new(csv))?;
        assert_eq!(
            table.find_column("Open").unwrap().data_type(),
            &DataType::Float64
        );
        assert_eq!(
            table.find_column("Date").unwrap().data_type(),
            &DataType::Utf8
        );
        Ok(())
    }

    #[test]
    fn test_load_raw_table_from_disk() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(INVESTING_CSV.as_bytes())?;
        let table = load_raw_table("Gold", tmp.path())?;
        assert_eq!(table.name, "Gold");
        assert_eq!(table.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn test_from_rows_pads_short_rows() -> Result<()> {
        let table = RawTable::from_rows(
            "X",
            &["Date", "Close"],
            &[vec!["01/02/2020", "1.0"], vec!["01/03/2020"]],
        )?;
        assert_eq!(table.num_rows(), 2);
        assert!(table.find_column("CLOSE").is_some());
        Ok(())
    }
}
