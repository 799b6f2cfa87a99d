// ============================================================
// Layer 3 — Timing Measurement
// ============================================================
// A measurement is just (iterations, elapsed wall-clock time).
// Throughput and per-call latency are derived from it and the
// measurement is discarded once printed / logged.

use std::time::{Duration, Instant};

/// Resolution of `Duration`, the smallest elapsed time a loop can report.
const CLOCK_RESOLUTION_SECS: f64 = 1e-9;

/// Iteration count and wall-clock time of one timed loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Number of timed calls (the warm-up is not counted)
    pub iterations: usize,

    /// Wall-clock time of the whole loop
    pub elapsed: Duration,
}

impl Measurement {
    pub fn new(iterations: usize, elapsed: Duration) -> Self {
        Self { iterations, elapsed }
    }

    /// Run `f` exactly `iterations` times and time the whole loop.
    /// Stops at the first error; no partial measurement is returned.
    pub fn measure<T, E, F>(iterations: usize, mut f: F) -> Result<(Self, Option<T>), E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut last  = None;
        let start     = Instant::now();
        for _ in 0..iterations {
            last = Some(f()?);
        }
        Ok((Self::new(iterations, start.elapsed()), last))
    }

    /// Elapsed seconds, never below one clock tick (1 ns), so a loop
    /// faster than the clock still has a finite throughput.
    fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64().max(CLOCK_RESOLUTION_SECS)
    }

    /// Calls per second.
    pub fn qps(&self) -> f64 {
        self.iterations as f64 / self.secs()
    }

    /// Average seconds per call.
    pub fn avg_seconds(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.secs() / self.iterations as f64
    }
}
