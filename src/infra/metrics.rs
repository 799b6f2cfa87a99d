// ============================================================
// Layer 5 — Results Logger
// ============================================================
// Appends one CSV row per (shape, variant) measurement so that
// throughput can be compared across runs and machines.
//
// Output file: <results_dir>/results.csv
//
// Example:
//   layer,batch,seq_len,variant,iterations,qps,avg_seconds
//   BertIntermediate,1,10,Burn,100,2113.402551,0.000473171
//   BertIntermediate,1,10,Fused,100,5480.117203,0.000182478

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::{shape::ShapeCase, timing::Measurement, variant::Variant};

const HEADER: &str = "layer,batch,seq_len,variant,iterations,qps,avg_seconds";

/// One row of the results CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputRecord {
    /// Layer under test, always "BertIntermediate" here
    pub layer: String,

    pub batch: usize,

    pub seq_len: usize,

    /// Written as its label (Burn, Traced, Runtime, Fused)
    pub variant: Variant,

    /// Timed calls, excluding the warm-up
    pub iterations: usize,

    /// Calls per second. Finite and positive even for a loop
    /// faster than the clock
    pub qps: f64,

    /// Seconds per call, 1 / qps
    pub avg_seconds: f64,
}

impl ThroughputRecord {
    pub fn new(layer: impl Into<String>, shape: ShapeCase, variant: Variant, m: &Measurement) -> Self {
        Self {
            layer:       layer.into(),
            batch:       shape.batch_size,
            seq_len:     shape.seq_len,
            variant,
            iterations:  m.iterations,
            qps:         m.qps(),
            avg_seconds: m.avg_seconds(),
        }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Creates the directory and writes the header if the file is new;
    /// an existing file is appended to.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("results.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created results CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, r: &ThroughputRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{},{},{},{:.6},{:.9}",
            r.layer,
            r.batch,
            r.seq_len,
            r.variant.label(),
            r.iterations,
            r.qps,
            r.avg_seconds,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
