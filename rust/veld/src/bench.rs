//! Strategy comparison harness.
//!
//! Runs the same workload under each concurrency policy and reports average
//! wall-clock times and the speedups relative to sequential execution. Meant
//! for quick sizing experiments, not rigorous benchmarking.

use std::fmt::Display;

use crate::{
    config::{ConcurrencyPolicy, ProcessConfig},
    engine,
};

/// Timing comparison of the processing strategies over one workload.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    /// Average sequential run time in milliseconds.
    pub sequential_ms: f64,
    /// Average parallel run time in milliseconds.
    pub parallel_ms: f64,
    /// Average adaptive run time in milliseconds.
    pub adaptive_ms: f64,
    /// Sequential time divided by parallel time.
    pub speedup_parallel: f64,
    /// Sequential time divided by adaptive time.
    pub speedup_adaptive: f64,
    /// Thread count the parallel runs actually used.
    pub optimal_threads: usize,
}

/// Runs `f` over `input` `iterations` times per strategy and averages the
/// timings.
///
/// `iterations` of zero is treated as one. Failed runs still count toward
/// the averages; the work performed before the failure is what gets timed.
pub fn benchmark<In, Out, E, F>(input: &[In], f: F, iterations: usize) -> BenchmarkReport
where
    In: Sync,
    Out: Send,
    E: Display,
    F: Fn(&In) -> Result<Out, E> + Send + Sync,
{
    let iterations = iterations.max(1);

    let sequential_config = ProcessConfig {
        concurrency: ConcurrencyPolicy::Sequential,
        ..ProcessConfig::default()
    };
    let parallel_config = ProcessConfig {
        concurrency: ConcurrencyPolicy::Parallel,
        ..ProcessConfig::default()
    };
    let adaptive_config = ProcessConfig {
        concurrency: ConcurrencyPolicy::Adaptive,
        ..ProcessConfig::default()
    };

    let mut sequential_total = 0.0;
    let mut parallel_total = 0.0;
    let mut adaptive_total = 0.0;
    let mut optimal_threads = 0;
    for _ in 0..iterations {
        sequential_total += engine::process(input, &sequential_config, &f).execution_time_ms;
        let parallel = engine::process(input, &parallel_config, &f);
        parallel_total += parallel.execution_time_ms;
        optimal_threads = parallel.threads_used;
        adaptive_total += engine::process(input, &adaptive_config, &f).execution_time_ms;
    }

    let sequential_ms = sequential_total / iterations as f64;
    let parallel_ms = parallel_total / iterations as f64;
    let adaptive_ms = adaptive_total / iterations as f64;
    BenchmarkReport {
        sequential_ms,
        parallel_ms,
        adaptive_ms,
        speedup_parallel: speedup(sequential_ms, parallel_ms),
        speedup_adaptive: speedup(sequential_ms, adaptive_ms),
        optimal_threads,
    }
}

fn speedup(baseline_ms: f64, candidate_ms: f64) -> f64 {
    if candidate_ms > 0.0 {
        baseline_ms / candidate_ms
    } else {
        0.0
    }
}
