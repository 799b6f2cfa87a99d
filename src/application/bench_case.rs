// ============================================================
// Layer 2 — Benchmark Case (the harness)
// ============================================================
// One BenchCase = one (batch, seq_len) shape. Running it:
//
//   Setup (untimed, once)
//     1. resolve BertConfig (tokenizer vocab size or config file)
//     2. init the reference Burn module, extract its weight set
//     3. trace the module on a sample input of the case shape
//     4. export the trace to a shape-keyed graph file
//     5. load that file into the graph runtime on the preferred
//        executor (parallel if supported, else generic)
//     6. build the fused kernel from the weight set
//
//   Execution
//     - one random input, shared by all four variants
//     - per variant: 1 warm-up call, then `iterations` timed calls,
//       print the QPS line
//     - compare reference vs accelerated: max |Δ| < tolerance
//
// Any failure is terminal for the case and classified as setup,
// execution or mismatch. Nothing is retried.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::Distribution};

use crate::application::bench_config::BenchConfig;
use crate::domain::{
    error::HarnessError,
    shape::ShapeCase,
    timing::Measurement,
    traits::IntermediateLayer,
    variant::Variant,
};
use crate::infra::{
    graph_export,
    metrics::{MetricsLogger, ThroughputRecord},
};
use crate::ml::{
    fused::FusedIntermediate,
    graph::IntermediateGraph,
    intermediate::{BertIntermediate, ReferenceLayer},
    runtime::{ExecDevice, GraphRuntime, PreparedGraph},
    tensor::NativeTensor,
    trace::{trace, TracedIntermediate},
    ReferenceBackend,
};

const LAYER_NAME: &str = "BertIntermediate";

/// Outcome of a passing case.
#[derive(Debug, Clone)]
pub struct CaseReport {
    /// Input shape the case ran with
    pub shape: ShapeCase,

    /// One timed loop per variant, in execution order
    pub measurements: Vec<(Variant, Measurement)>,

    /// max |reference - accelerated|, the gated comparison
    /// Always below the configured tolerance in a report
    pub max_diff: f32,

    /// max |reference - traced graph|, reported but not gated
    pub traced_diff: f32,

    /// max |reference - graph runtime|, reported but not gated
    pub runtime_diff: f32,

    /// Executor the graph runtime was prepared on
    pub executor: ExecDevice,

    /// Graph file the runtime loaded
    pub export_path: PathBuf,
}

impl CaseReport {
    pub fn measurement(&self, variant: Variant) -> Option<&Measurement> {
        self.measurements
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, m)| m)
    }
}

/// One-line summary, e.g.
/// `(1,010) Burn 2113.4 QPS, Traced 1980.2 QPS, Runtime 3051.7 QPS,
///  Fused 5480.1 QPS; max |Δ| fused 9.5e-7 traced 0e0 runtime 9.5e-7;
///  graph ./bert-intermediate-1-010.graph`
impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.shape)?;
        let mut sep = " ";
        for variant in Variant::ALL {
            if let Some(m) = self.measurement(variant) {
                write!(f, "{sep}{} {:.1} QPS", variant.label(), m.qps())?;
                sep = ", ";
            }
        }
        write!(
            f,
            "; max |Δ| fused {:e} traced {:e} runtime {:e}; graph {}",
            self.max_diff,
            self.traced_diff,
            self.runtime_diff,
            self.export_path.display(),
        )
    }
}

/// The four variants of one case, ready to run.
struct CaseSetup<B: Backend> {
    reference:   ReferenceLayer<B>,
    traced:      TracedIntermediate<B>,
    runtime:     PreparedGraph,
    fused:       FusedIntermediate,
    hidden_size: usize,
    export_path: PathBuf,
    device:      B::Device,
}

#[derive(Debug, Clone)]
pub struct BenchCase {
    shape:  ShapeCase,
    config: BenchConfig,
}

impl BenchCase {
    pub fn new(shape: ShapeCase, config: BenchConfig) -> Self {
        Self { shape, config }
    }

    pub fn shape(&self) -> ShapeCase {
        self.shape
    }

    pub fn name(&self) -> String {
        self.shape.name()
    }

    pub fn export_path(&self) -> PathBuf {
        graph_export::export_path(Path::new(&self.config.export_dir), self.shape)
    }

    /// Run setup and execution on the default reference backend.
    pub fn run(&self, logger: Option<&MetricsLogger>) -> Result<CaseReport, HarnessError> {
        tracing::info!("Running {} ({} token rows)", self.name(), self.shape.rows());
        let setup = self
            .setup::<ReferenceBackend>()
            .map_err(|source| HarnessError::Setup { case: self.name(), source })?;
        self.execute(&setup, logger)
    }

    /// Trace the reference module for this shape and write the graph
    /// to `out` (or the shape-keyed default path). No timing.
    pub fn export_graph(&self, out: Option<PathBuf>) -> Result<PathBuf> {
        let device  = <ReferenceBackend as Backend>::Device::default();
        let module  = self.build_reference::<ReferenceBackend>(&device)?;
        let graph   = self.trace_module(&module, &device)?;
        let path    = out.unwrap_or_else(|| self.export_path());
        graph_export::save(&graph, &path)?;
        Ok(path)
    }

    fn build_reference<B: Backend>(&self, device: &B::Device) -> Result<BertIntermediate<B>> {
        let bert = self.config.layer_config()?;
        tracing::debug!(
            "{}: vocab_size={} hidden_size={} intermediate_size={}",
            self.name(),
            bert.vocab_size,
            bert.hidden_size,
            bert.intermediate_size,
        );
        Ok(bert.init_intermediate::<B>(device))
    }

    fn trace_module<B: Backend>(
        &self,
        module: &BertIntermediate<B>,
        device: &B::Device,
    ) -> Result<IntermediateGraph> {
        let sample = random_input::<B>(self.shape, module.hidden_size(), device);
        trace(module, sample).context("Tracing the reference module failed")
    }

    fn setup<B: Backend>(&self) -> Result<CaseSetup<B>> {
        let device  = B::Device::default();
        let module  = self.build_reference::<B>(&device)?;
        let hidden  = module.hidden_size();
        let weights = module.weight_set()?;
        tracing::debug!(
            "{}: extracted weights [{}]",
            self.name(),
            weights.names().collect::<Vec<_>>().join(", "),
        );

        let graph  = self.trace_module(&module, &device)?;
        let traced = TracedIntermediate::<B>::new(&graph, &device)?;

        let export_path = self.export_path();
        graph_export::save(&graph, &export_path)?;

        let executor = GraphRuntime::preferred_device();
        let runtime  = GraphRuntime::prepare(&export_path, executor)?;

        let fused = FusedIntermediate::from_weights(&weights)
            .context("Cannot build the fused kernel from the extracted weights")?;
        tracing::debug!(
            "{}: fused kernel {} → {}, runtime on {} executor",
            self.name(),
            fused.hidden_size(),
            fused.intermediate_size(),
            executor,
        );

        Ok(CaseSetup {
            reference: ReferenceLayer::new(module),
            traced,
            runtime,
            fused,
            hidden_size: hidden,
            export_path,
            device,
        })
    }

    fn execute<B: Backend>(
        &self,
        setup:  &CaseSetup<B>,
        logger: Option<&MetricsLogger>,
    ) -> Result<CaseReport, HarnessError> {
        let input = random_input::<B>(self.shape, setup.hidden_size, &setup.device);
        let native_input = NativeTensor::from_burn(input.clone()).map_err(|e| HarnessError::Setup {
            case:   self.name(),
            source: e.into(),
        })?;

        let (m_ref,     ref_out)     = self.benchmark(&setup.reference, &input, logger)?;
        let (m_traced,  traced_out)  = self.benchmark(&setup.traced, &input, logger)?;
        let (m_runtime, runtime_out) = self.benchmark(&setup.runtime, &native_input, logger)?;
        let (m_fused,   fused_out)   = self.benchmark(&setup.fused, &native_input, logger)?;

        let to_native = |variant: Variant, t: Tensor<B, 3>| {
            NativeTensor::from_burn(t).map_err(|e| HarnessError::Execution {
                case:   self.name(),
                variant,
                source: e.into(),
            })
        };
        let ref_out    = to_native(Variant::Reference, ref_out)?;
        let traced_out = to_native(Variant::TracedGraph, traced_out)?;

        // Compared after the hand-off into the reference backend.
        tracing::trace!("{}: fused output {:?}", self.name(), fused_out.shape());
        let fused_out = fused_out
            .into_burn::<B, 3>(&setup.device)
            .map_err(|e| HarnessError::Execution {
                case:    self.name(),
                variant: Variant::Accelerated,
                source:  e.into(),
            })
            .and_then(|t| to_native(Variant::Accelerated, t))?;
        tracing::trace!("{}: fused output\n{}", self.name(), fused_out);
        let max_diff = verify(&self.name(), &ref_out, &fused_out, self.config.tolerance)?;

        let diff = |other: &NativeTensor| ref_out.max_abs_diff(other).unwrap_or(f32::NAN);
        let traced_diff  = diff(&traced_out);
        let runtime_diff = diff(&runtime_out);
        tracing::debug!(
            "{}: max |Δ| fused={:e} traced={:e} runtime={:e}",
            self.name(),
            max_diff,
            traced_diff,
            runtime_diff,
        );

        Ok(CaseReport {
            shape: self.shape,
            measurements: vec![
                (Variant::Reference,    m_ref),
                (Variant::TracedGraph,  m_traced),
                (Variant::GraphRuntime, m_runtime),
                (Variant::Accelerated,  m_fused),
            ],
            max_diff,
            traced_diff,
            runtime_diff,
            executor: setup.runtime.device(),
            export_path: setup.export_path.clone(),
        })
    }

    /// One untimed warm-up call, then the timed loop. Returns the
    /// measurement and the output of the last timed call.
    fn benchmark<L: IntermediateLayer>(
        &self,
        layer:  &L,
        input:  &L::Input,
        logger: Option<&MetricsLogger>,
    ) -> Result<(Measurement, L::Output), HarnessError> {
        let variant = layer.variant();
        let fail = |source: anyhow::Error| HarnessError::Execution {
            case: self.name(),
            variant,
            source,
        };

        layer.call(input).map_err(fail)?;
        let (m, last) = Measurement::measure(self.config.iterations, || layer.call(input))
            .map_err(fail)?;
        let last = match last {
            Some(out) => out,
            None      => layer.call(input).map_err(fail)?,
        };

        println!(
            "{} {} {} QPS, {}, time, {}",
            LAYER_NAME,
            self.shape,
            variant.label(),
            m.qps(),
            m.avg_seconds(),
        );

        if let Some(logger) = logger {
            let record = ThroughputRecord::new(LAYER_NAME, self.shape, variant, &m);
            if let Err(e) = logger.log(&record) {
                tracing::warn!("Cannot record throughput for {}: {:#}", self.name(), e);
            }
        }

        Ok((m, last))
    }
}

/// Gate a case on the reference/accelerated agreement. Returns the
/// maximum absolute difference when it is below `tolerance`.
fn verify(
    case:        &str,
    reference:   &NativeTensor,
    accelerated: &NativeTensor,
    tolerance:   f32,
) -> Result<f32, HarnessError> {
    if reference.shape() != accelerated.shape() {
        return Err(HarnessError::ShapeMismatch {
            case:        case.to_string(),
            reference:   reference.shape().to_vec(),
            accelerated: accelerated.shape().to_vec(),
        });
    }
    let max_diff = reference.max_abs_diff(accelerated).unwrap_or(f32::NAN);
    // Written as a negated `<` so that NaN fails the check.
    if !(max_diff < tolerance) {
        return Err(HarnessError::Mismatch { case: case.to_string(), max_diff, tolerance });
    }
    Ok(max_diff)
}

/// Uniform [0, 1) input of shape [batch, seq_len, hidden].
fn random_input<B: Backend>(shape: ShapeCase, hidden: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::<B, 3>::random(
        [shape.batch_size, shape.seq_len, hidden],
        Distribution::Uniform(0.0, 1.0),
        device,
    )
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;
    use rstest::rstest;
    use std::cell::Cell;

    /// A small layer (hidden 48 → intermediate 192) with a throwaway
    /// tokenizer, so the full grid runs in test time.
    fn small_config(dir: &Path, iterations: usize) -> BenchConfig {
        TokenizerStore::new(dir.join("models"))
            .write_word_level("tiny-bert", &["the", "quick", "brown", "fox"])
            .unwrap();
        BenchConfig {
            model_id:          "tiny-bert".into(),
            tokenizer_dir:     dir.join("models").display().to_string(),
            hidden_size:       Some(48),
            intermediate_size: Some(192),
            iterations,
            export_dir:        dir.join("graphs").display().to_string(),
            ..BenchConfig::default()
        }
    }

    fn assert_passing(report: &CaseReport, shape: ShapeCase) {
        assert_eq!(report.shape, shape);
        assert!(report.max_diff < 1e-5, "fused drifted: {}", report.max_diff);
        assert!(report.traced_diff < 1e-5, "traced drifted: {}", report.traced_diff);
        assert!(report.runtime_diff < 1e-5, "runtime drifted: {}", report.runtime_diff);
        assert_eq!(report.measurements.len(), 4);
        for variant in Variant::ALL {
            let m = report.measurement(variant).unwrap();
            assert!(m.qps().is_finite() && m.qps() > 0.0);
        }
        assert!(report.export_path.exists());
    }

    #[rstest]
    fn bert_intermediate_case(
        #[values(1, 2)] batch_size: usize,
        #[values(10, 20, 40, 60, 80, 100, 120)] seq_len: usize,
    ) {
        let dir   = tempfile::tempdir().unwrap();
        let shape = ShapeCase::new(batch_size, seq_len);
        let case  = BenchCase::new(shape, small_config(dir.path(), 3));

        let report = case.run(None).unwrap();
        assert_passing(&report, shape);
        assert_eq!(
            report.export_path,
            dir.path().join("graphs").join(format!("bert-intermediate-{batch_size}-{seq_len:03}.graph")),
        );
    }

    /// Full BERT-base width (768 → 3072) against the 1e-5 gate.
    #[rstest]
    #[case(1, 10)]
    #[case(2, 120)]
    fn bert_base_case(#[case] batch_size: usize, #[case] seq_len: usize) {
        let dir   = tempfile::tempdir().unwrap();
        let shape = ShapeCase::new(batch_size, seq_len);
        let cfg   = BenchConfig {
            hidden_size:       None,
            intermediate_size: None,
            ..small_config(dir.path(), 2)
        };
        let report = BenchCase::new(shape, cfg).run(None).unwrap();
        assert_passing(&report, shape);

        let graph = graph_export::load(&report.export_path).unwrap();
        assert_eq!(graph.example_shape, vec![batch_size, seq_len, 768]);
        assert_eq!(graph.validate().unwrap(), 3072);
    }

    #[test]
    fn test_missing_tokenizer_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BenchConfig {
            tokenizer_dir: dir.path().join("nothing-here").display().to_string(),
            export_dir:    dir.path().display().to_string(),
            ..BenchConfig::default()
        };
        let err = BenchCase::new(ShapeCase::new(1, 10), cfg).run(None).unwrap_err();
        assert!(matches!(err, HarnessError::Setup { .. }));
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_export_graph_writes_loadable_file() {
        let dir  = tempfile::tempdir().unwrap();
        let case = BenchCase::new(ShapeCase::new(2, 20), small_config(dir.path(), 1));
        let path = case.export_graph(None).unwrap();
        assert_eq!(path, case.export_path());

        let graph = graph_export::load(&path).unwrap();
        assert_eq!(graph.example_shape, vec![2, 20, 48]);
        assert_eq!(graph.validate().unwrap(), 192);
    }

    #[test]
    fn test_results_are_logged_per_variant() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path().join("results")).unwrap();
        let case   = BenchCase::new(ShapeCase::new(1, 10), small_config(dir.path(), 2));
        case.run(Some(&logger)).unwrap();

        let text = std::fs::read_to_string(logger.csv_path()).unwrap();
        // header + one row per variant
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains(",Fused,2,"));
    }

    #[test]
    fn test_report_summary_lists_every_variant_and_diff() {
        let m = |ms| Measurement::new(100, std::time::Duration::from_millis(ms));
        let report = CaseReport {
            shape:        ShapeCase::new(2, 40),
            measurements: vec![
                (Variant::Reference,    m(50)),
                (Variant::TracedGraph,  m(100)),
                (Variant::GraphRuntime, m(25)),
                (Variant::Accelerated,  m(10)),
            ],
            max_diff:     1e-6,
            traced_diff:  0.0,
            runtime_diff: 2e-6,
            executor:     ExecDevice::Generic,
            export_path:  PathBuf::from("out/bert-intermediate-2-040.graph"),
        };
        let line = report.to_string();
        assert!(line.starts_with("(2,040) Burn 2000.0 QPS, Traced 1000.0 QPS"));
        assert!(line.contains("Runtime 4000.0 QPS, Fused 10000.0 QPS"));
        assert!(line.contains("fused 1e-6 traced 0e0 runtime 2e-6"));
        assert!(line.ends_with("graph out/bert-intermediate-2-040.graph"));
    }

    // ── verify ───────────────────────────────────────────────────────────────

    #[test]
    fn test_verify_accepts_close_outputs() {
        let a = NativeTensor::from_vec(vec![1, 2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let b = NativeTensor::from_vec(vec![1, 2, 2], vec![1.0f32, 2.0, 3.0, 4.000001]).unwrap();
        let d = verify("c", &a, &b, 1e-5).unwrap();
        assert!(d < 1e-5);
    }

    #[test]
    fn test_verify_reports_mismatch_with_max_diff() {
        let a = NativeTensor::from_vec(vec![2], vec![1.0f32, 2.0]).unwrap();
        let b = NativeTensor::from_vec(vec![2], vec![1.0f32, 2.5]).unwrap();
        match verify("c", &a, &b, 1e-5) {
            Err(HarnessError::Mismatch { max_diff, .. }) => assert!((max_diff - 0.5).abs() < 1e-6),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_rejects_nan_and_shape_disagreement() {
        let a = NativeTensor::from_vec(vec![2], vec![1.0f32, 2.0]).unwrap();
        let n = NativeTensor::from_vec(vec![2], vec![1.0f32, f32::NAN]).unwrap();
        assert!(matches!(verify("c", &a, &n, 1e-5), Err(HarnessError::Mismatch { .. })));

        let s = NativeTensor::from_vec(vec![1, 2], vec![1.0f32, 2.0]).unwrap();
        assert!(matches!(verify("c", &a, &s, 1e-5), Err(HarnessError::ShapeMismatch { .. })));
    }

    // ── benchmark ────────────────────────────────────────────────────────────

    struct CountingLayer {
        calls:   Cell<usize>,
        fail_at: Option<usize>,
    }

    impl IntermediateLayer for CountingLayer {
        type Input  = ();
        type Output = usize;

        fn variant(&self) -> Variant {
            Variant::Accelerated
        }

        fn call(&self, _: &()) -> Result<usize> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if Some(n) == self.fail_at {
                anyhow::bail!("kernel fault on call {n}");
            }
            Ok(n)
        }
    }

    #[test]
    fn test_benchmark_warms_up_once_before_timing() {
        let dir   = tempfile::tempdir().unwrap();
        let case  = BenchCase::new(ShapeCase::new(1, 10), small_config(dir.path(), 5));
        let layer = CountingLayer { calls: Cell::new(0), fail_at: None };

        let (m, last) = case.benchmark(&layer, &(), None).unwrap();
        assert_eq!(m.iterations, 5);
        assert_eq!(layer.calls.get(), 6);
        // last output comes from the final timed call, not the warm-up
        assert_eq!(last, 6);
    }

    #[test]
    fn test_failing_call_is_an_execution_error() {
        let dir   = tempfile::tempdir().unwrap();
        let case  = BenchCase::new(ShapeCase::new(1, 10), small_config(dir.path(), 5));
        let layer = CountingLayer { calls: Cell::new(0), fail_at: Some(3) };

        match case.benchmark(&layer, &(), None) {
            Err(HarnessError::Execution { variant, source, .. }) => {
                assert_eq!(variant, Variant::Accelerated);
                assert!(source.to_string().contains("call 3"));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
        // no retry after the failure
        assert_eq!(layer.calls.get(), 3);
    }
}
