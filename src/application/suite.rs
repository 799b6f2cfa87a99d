// ============================================================
// Layer 2 — Benchmark Suite
// ============================================================
// The explicit list of cases for a run, one per shape in the
// configured grid (14 by default), and the runner that executes
// them in order.
//
// Failures are isolated: a case that fails is logged with its
// classification and the suite moves on to the next one. The
// summary tells the CLI whether to exit non-zero.

use anyhow::{Context, Result};

use crate::application::{
    bench_case::{BenchCase, CaseReport},
    bench_config::BenchConfig,
};
use crate::domain::{error::HarnessError, shape::ShapeCase};
use crate::infra::metrics::MetricsLogger;

pub struct BenchSuite {
    config: BenchConfig,
    cases:  Vec<BenchCase>,
}

/// Per-case outcomes, in execution order.
#[derive(Debug)]
pub struct SuiteSummary {
    pub outcomes: Vec<(ShapeCase, Result<CaseReport, HarnessError>)>,
}

impl SuiteSummary {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &HarnessError> {
        self.outcomes.iter().filter_map(|(_, r)| r.as_ref().err())
    }
}

impl BenchSuite {
    pub fn build(config: BenchConfig) -> Result<Self> {
        config.validate().context("Invalid benchmark configuration")?;
        let cases = config
            .shapes()
            .into_iter()
            .map(|shape| BenchCase::new(shape, config.clone()))
            .collect();
        Ok(Self { config, cases })
    }

    pub fn cases(&self) -> &[BenchCase] {
        &self.cases
    }

    pub fn run(&self) -> Result<SuiteSummary> {
        let logger = match &self.config.results_dir {
            Some(dir) => {
                let logger = MetricsLogger::new(dir)
                    .with_context(|| format!("Cannot open results directory '{dir}'"))?;
                tracing::info!("Recording throughput to '{}'", logger.csv_path().display());
                Some(logger)
            }
            None => None,
        };

        tracing::info!("Running {} cases", self.cases().len());
        let mut outcomes = Vec::with_capacity(self.cases().len());
        for case in self.cases() {
            let outcome = case.run(logger.as_ref());
            match &outcome {
                Ok(report) => tracing::info!(
                    "{} passed (max |Δ| fused {:e}, traced {:e}, runtime {:e} on {})",
                    case.name(),
                    report.max_diff,
                    report.traced_diff,
                    report.runtime_diff,
                    report.executor,
                ),
                Err(e) => tracing::error!("[{}] {}", e.kind(), e),
            }
            outcomes.push((case.shape(), outcome));
        }

        let summary = SuiteSummary { outcomes };
        tracing::info!("{} passed, {} failed", summary.passed(), summary.failed());
        Ok(summary)
    }
}
