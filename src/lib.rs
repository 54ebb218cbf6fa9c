pub mod align;
pub mod catalog;
pub mod correlation;
pub mod error;
pub mod export;
pub mod features;
pub mod heatmap;
pub mod process;
pub mod prompt;
pub mod series;
pub mod store;

pub use align::{align, align_all, AlignedFrame, DateRange};
pub use catalog::Catalog;
pub use correlation::{correlate, correlation_matrix, CorrelationMatrix, CorrelationResult, Method};
pub use error::AnalysisError;
pub use features::{country_index, feature_frame, instrument_pair, instrument_series, ValueField};
pub use process::{normalize, normalize_ohlc, resample, RawTable, Timeframe};
pub use series::Series;
pub use store::DataStore;
