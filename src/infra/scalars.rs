// ============================================================
// Layer 6 — Scalar Log
// ============================================================
// Records the training curves to `<log-dir>/scalars.csv`, one row
// per point, appended as training runs:
//
//   tag,step,value
//   loss/train,10,0.412300
//   loss/train,20,0.398100
//   score/val,50,0.153000
//
// The header is only written when the file is new, so a resumed or
// repeated run keeps appending to the same log.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::domain::traits::ScalarSink;

pub struct ScalarLog {
    csv_path: PathBuf,
}

impl ScalarLog {
    /// Create the log directory and the CSV header if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join("scalars.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "tag,step,value")?;
            tracing::debug!("Created scalar log: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ScalarSink for ScalarLog {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{},{},{:.6}", tag, step, value)?;
        Ok(())
    }
}
