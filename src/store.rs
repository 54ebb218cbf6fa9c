// src/store.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::process::{load_raw_table, RawTable};

/// Directory of per-instrument CSV files left by the acquisition step.
#[derive(Debug, Clone)]
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>.csv`
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", id))
    }

    /// Identifiers of every CSV file present.
    pub fn available(&self) -> Result<BTreeSet<String>> {
        let pattern = format!("{}/*.csv", Pattern::escape(&self.dir.to_string_lossy()));
        let mut ids = BTreeSet::new();
        for entry in glob(&pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
            let path = entry?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }
        debug!(dir = %self.dir.display(), count = ids.len(), "scanned data directory");
        Ok(ids)
    }

    /// Load one instrument's table; a missing file is `MissingInstrument`.
    pub fn load(&self, id: &str) -> Result<RawTable> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(AnalysisError::MissingInstrument(id.to_string()).into());
        }
        load_raw_table(id, &path)
    }

    /// Load several independent files in parallel, keeping the input order.
    pub fn load_many(&self, ids: &[String]) -> Result<Vec<RawTable>> {
        let tables = ids
            .par_iter()
            .map(|id| self.load(id))
            .collect::<Result<Vec<_>>>()?;
        info!(count = tables.len(), "loaded tables");
        Ok(tables)
    }
}
