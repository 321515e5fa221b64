//! Dispatch and the three processing strategies.
//!
//! [`process`] routes on the configured [`ConcurrencyPolicy`]:
//! `Sequential` runs [`process_sequential`]; `Parallel` and `ThreadPool` both
//! run [`process_parallel`], whose chunk tasks execute on the shared
//! [`ThreadPool`](veld_workflow::thread_pool::ThreadPool); `Adaptive`
//! (the default) runs [`process_adaptive`], which picks one of the other two
//! from input size and detected hardware concurrency.
//!
//! Mapping functions report failure by returning `Err`. Failures are captured
//! into the returned [`ProcessResult`]; they never cross the engine boundary
//! as panics. A mapping function that panics, by contrast, is outside the
//! contract and propagates to the caller as a panic.

use std::{fmt::Display, time::Instant};

use log::debug;
use veld_common::error::Error;
use veld_workflow::thread_pool::ThreadPool;

use crate::{
    config::{ConcurrencyPolicy, ProcessConfig},
    result::ProcessResult,
};

/// Inputs below this length always run sequentially under adaptive dispatch.
const PARALLEL_THRESHOLD: usize = 1000;

/// Detected hardware concurrency, falling back to 1 when detection fails.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Maps `f` over `input` according to `config`.
///
/// An invalid configuration yields a failed result; it does not panic and
/// does not raise.
pub fn process<In, Out, E, F>(input: &[In], config: &ProcessConfig, f: F) -> ProcessResult<Out>
where
    In: Sync,
    Out: Send,
    E: Display,
    F: Fn(&In) -> Result<Out, E> + Send + Sync,
{
    if let Err(e) = config.validate() {
        return ProcessResult::rejected(e);
    }
    match config.concurrency {
        ConcurrencyPolicy::Sequential => process_sequential(input, f, config),
        ConcurrencyPolicy::Parallel | ConcurrencyPolicy::ThreadPool => {
            process_parallel(input, f, config)
        }
        ConcurrencyPolicy::Adaptive => process_adaptive(input, f, config),
    }
}

/// Maps `f` over `input` with the default configuration (adaptive dispatch).
pub fn process_with_defaults<In, Out, E, F>(input: &[In], f: F) -> ProcessResult<Out>
where
    In: Sync,
    Out: Send,
    E: Display,
    F: Fn(&In) -> Result<Out, E> + Send + Sync,
{
    process(input, &ProcessConfig::default(), f)
}

/// Maps `f` over `input` in order on the calling thread.
///
/// Fail-fast: the first `Err` stops iteration. The result then carries the
/// successfully mapped prefix, its length as `items_processed`, and the
/// rendered error.
pub fn process_sequential<In, Out, E, F>(
    input: &[In],
    f: F,
    config: &ProcessConfig,
) -> ProcessResult<Out>
where
    E: Display,
    F: Fn(&In) -> Result<Out, E>,
{
    let start = Instant::now();

    if input.is_empty() {
        return ProcessResult::empty(elapsed_ms(start));
    }

    let mut results = Vec::with_capacity(input.len());
    let mut failure = None;
    for (index, item) in input.iter().enumerate() {
        match f(item) {
            Ok(value) => results.push(value),
            Err(e) => {
                failure = Some(Error::user_function(index, e));
                break;
            }
        }
    }

    let execution_time_ms = elapsed_ms(start);
    if config.enable_logging {
        debug!(
            "sequential: {} of {} items in {execution_time_ms:.3} ms",
            results.len(),
            input.len()
        );
    }
    ProcessResult {
        items_processed: results.len(),
        memory_allocated: input.len() * std::mem::size_of::<Out>(),
        results,
        execution_time_ms,
        threads_used: 1,
        failure,
    }
}

/// Maps `f` over `input` in contiguous chunks on the shared worker pool.
///
/// Uses `min(config.max_threads, input.len())` threads and chunks of
/// `max(1, input.len() / threads)` elements (the chunk count may exceed the
/// thread count by one on uneven divisions). Each chunk task maps its range
/// into its own buffer; buffers are joined in chunk order, so
/// `results[i] == f(input[i])` regardless of execution order.
///
/// When chunks fail, the first failing chunk in chunk order is reported.
/// `results` then holds the concatenated output of the fully successful
/// chunks preceding it; later chunks still run to completion but their
/// output is discarded.
pub fn process_parallel<In, Out, E, F>(
    input: &[In],
    f: F,
    config: &ProcessConfig,
) -> ProcessResult<Out>
where
    In: Sync,
    Out: Send,
    E: Display,
    F: Fn(&In) -> Result<Out, E> + Send + Sync,
{
    let start = Instant::now();

    // The chunk-size division below is meaningless for zero threads, so the
    // empty input returns before any arithmetic.
    if input.is_empty() {
        return ProcessResult::empty(elapsed_ms(start));
    }

    let threads_used = config.max_threads.min(input.len()).max(1);
    let chunk_len = (input.len() / threads_used).max(1);

    let chunk_outputs = ThreadPool::global().scope(|scope| {
        let f = &f;
        let handles: Vec<_> = input
            .chunks(chunk_len)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let base = chunk_index * chunk_len;
                scope.spawn(move || map_chunk(base, chunk, f))
            })
            .collect();
        handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
    });

    let mut results = Vec::with_capacity(input.len());
    let mut failure = None;
    for chunk in chunk_outputs {
        match chunk {
            Ok(mut output) => results.append(&mut output),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let execution_time_ms = elapsed_ms(start);
    if config.enable_logging {
        debug!(
            "parallel: {} of {} items on {threads_used} threads in {execution_time_ms:.3} ms",
            results.len(),
            input.len()
        );
    }
    ProcessResult {
        items_processed: results.len(),
        memory_allocated: input.len() * std::mem::size_of::<Out>(),
        results,
        execution_time_ms,
        threads_used,
        failure,
    }
}

/// Picks a strategy from input size and hardware concurrency, then runs it.
///
/// Inputs shorter than 1000 elements run sequentially (the parallel setup
/// overhead dominates below that); longer inputs run in parallel when more
/// than one hardware thread is available, and sequentially otherwise.
pub fn process_adaptive<In, Out, E, F>(
    input: &[In],
    f: F,
    config: &ProcessConfig,
) -> ProcessResult<Out>
where
    In: Sync,
    Out: Send,
    E: Display,
    F: Fn(&In) -> Result<Out, E> + Send + Sync,
{
    if input.len() >= PARALLEL_THRESHOLD && hardware_concurrency() > 1 {
        if config.enable_logging {
            debug!("adaptive: {} items, dispatching parallel", input.len());
        }
        process_parallel(input, f, config)
    } else {
        if config.enable_logging {
            debug!("adaptive: {} items, dispatching sequential", input.len());
        }
        process_sequential(input, f, config)
    }
}

fn map_chunk<In, Out, E, F>(base: usize, chunk: &[In], f: &F) -> Result<Vec<Out>, Error>
where
    E: Display,
    F: Fn(&In) -> Result<Out, E>,
{
    let mut output = Vec::with_capacity(chunk.len());
    for (offset, item) in chunk.iter().enumerate() {
        match f(item) {
            Ok(value) => output.push(value),
            Err(e) => return Err(Error::user_function(base + offset, e)),
        }
    }
    Ok(output)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConcurrencyPolicy, ProcessConfig};

    fn parallel_config(max_threads: usize) -> ProcessConfig {
        ProcessConfig {
            concurrency: ConcurrencyPolicy::Parallel,
            max_threads,
            ..ProcessConfig::default()
        }
    }

    #[test]
    fn test_square_with_defaults() {
        let input = vec![1i64, 2, 3, 4, 5];
        let result = process_with_defaults(&input, |x| Ok::<_, String>(x * x));
        assert!(result.is_success());
        assert_eq!(result.results, vec![1, 4, 9, 16, 25]);
        assert_eq!(result.items_processed, 5);
        assert_eq!(result.threads_used, 1);
    }

    #[test]
    fn test_sequential_preserves_order() {
        let input: Vec<u32> = (0..257).collect();
        let result =
            process_sequential(&input, |x| Ok::<_, String>(x + 1), &ProcessConfig::default());
        assert!(result.is_success());
        assert_eq!(result.items_processed, input.len());
        for (i, out) in result.results.iter().enumerate() {
            assert_eq!(*out, input[i] + 1);
        }
    }

    #[test]
    fn test_sequential_failure_keeps_prefix() {
        // 100 / x fails on the zero at index 3.
        let input = vec![1i32, 2, 3, 0, 5];
        let result = process_sequential(
            &input,
            |x| {
                if *x == 0 {
                    Err("division by zero")
                } else {
                    Ok(100.0 / f64::from(*x))
                }
            },
            &ProcessConfig::default(),
        );
        assert!(!result.is_success());
        assert_eq!(result.items_processed, 3);
        assert_eq!(result.results.len(), 3);
        assert_eq!(result.results[0], 100.0);
        assert_eq!(result.results[1], 50.0);
        assert!((result.results[2] - 100.0 / 3.0).abs() < 1e-9);
        let message = result.error_message().unwrap();
        assert!(message.contains("element 3"));
        assert!(message.contains("division by zero"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input: Vec<i64> = (0..5000).collect();
        let f = |x: &i64| Ok::<_, String>(x * 3 - 7);
        let sequential = process_sequential(&input, f, &ProcessConfig::default());
        for max_threads in [1, 2, 3, 8, 64] {
            let parallel = process_parallel(&input, f, &parallel_config(max_threads));
            assert!(parallel.is_success());
            assert_eq!(parallel.results, sequential.results);
            assert_eq!(parallel.items_processed, input.len());
            assert_eq!(parallel.threads_used, max_threads.min(input.len()));
        }
    }

    #[test]
    fn test_parallel_uneven_chunks() {
        // 10 elements over 3 threads: chunks of 3,3,3,1 - one more chunk
        // than threads, remainder handled by the trailing chunk.
        let input: Vec<u32> = (0..10).collect();
        let result = process_parallel(&input, |x| Ok::<_, String>(x * 10), &parallel_config(3));
        assert!(result.is_success());
        assert_eq!(result.threads_used, 3);
        assert_eq!(
            result.results,
            (0..10).map(|x| x * 10).collect::<Vec<u32>>()
        );
    }

    #[test]
    fn test_parallel_empty_input() {
        let input: Vec<i32> = Vec::new();
        let result = process_parallel(&input, |x| Ok::<_, String>(*x), &parallel_config(4));
        assert!(result.is_success());
        assert_eq!(result.items_processed, 0);
        assert!(result.results.is_empty());
        assert_eq!(result.threads_used, 0);
    }

    #[test]
    fn test_parallel_reports_first_failing_chunk() {
        let input: Vec<i32> = (0..4000).collect();
        let result = process_parallel(
            &input,
            |x| {
                if *x == 2500 {
                    Err(format!("bad value {x}"))
                } else {
                    Ok(*x * 2)
                }
            },
            &parallel_config(4),
        );
        assert!(!result.is_success());
        let message = result.error_message().unwrap();
        assert!(message.contains("element 2500"));
        assert!(message.contains("bad value 2500"));
        // Chunks of 1000: the first two complete, the third fails, so the
        // reported prefix is exactly the first 2000 outputs.
        assert_eq!(result.items_processed, 2000);
        assert_eq!(result.results.len(), 2000);
        for (i, out) in result.results.iter().enumerate() {
            assert_eq!(*out, (i as i32) * 2);
        }
    }

    #[test]
    fn test_adaptive_small_input_is_sequential() {
        let input: Vec<i32> = (0..999).collect();
        let result = process_adaptive(&input, |x| Ok::<_, String>(x + 1), &ProcessConfig::default());
        assert!(result.is_success());
        assert_eq!(result.threads_used, 1);
        assert_eq!(result.items_processed, 999);
    }

    #[test]
    fn test_adaptive_large_input() {
        // On multi-core hosts adaptive dispatch goes parallel with 4
        // threads; on a single core it falls back to sequential.
        let input: Vec<i64> = (1..=2000).collect();
        let config = ProcessConfig {
            max_threads: 4,
            ..ProcessConfig::default()
        };
        let result = process_adaptive(&input, |x| Ok::<_, String>(2 * x), &config);
        assert!(result.is_success());
        assert_eq!(result.items_processed, 2000);
        if hardware_concurrency() > 1 {
            assert_eq!(result.threads_used, 4);
        } else {
            assert_eq!(result.threads_used, 1);
        }
        for (i, out) in result.results.iter().enumerate() {
            assert_eq!(*out, 2 * input[i]);
        }
    }

    #[test]
    fn test_dispatch_honors_policy() {
        let input: Vec<i32> = (0..50).collect();
        let f = |x: &i32| Ok::<_, String>(*x);

        let sequential = ProcessConfig {
            concurrency: ConcurrencyPolicy::Sequential,
            ..ProcessConfig::default()
        };
        assert_eq!(process(&input, &sequential, f).threads_used, 1);

        // Parallel and ThreadPool both use the chunked pool strategy, even
        // below the adaptive threshold.
        for policy in [ConcurrencyPolicy::Parallel, ConcurrencyPolicy::ThreadPool] {
            let config = ProcessConfig {
                concurrency: policy,
                max_threads: 4,
                ..ProcessConfig::default()
            };
            let result = process(&input, &config, f);
            assert!(result.is_success());
            assert_eq!(result.threads_used, 4);
            assert_eq!(result.results, input);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let input = vec![1, 2, 3];
        let config = ProcessConfig {
            max_threads: 0,
            ..ProcessConfig::default()
        };
        let result = process(&input, &config, |x| Ok::<_, String>(*x));
        assert!(!result.is_success());
        assert_eq!(result.items_processed, 0);
        assert!(result.error_message().unwrap().contains("max_threads"));
    }

    #[test]
    fn test_empty_input_all_policies() {
        let input: Vec<i32> = Vec::new();
        for policy in [
            ConcurrencyPolicy::Sequential,
            ConcurrencyPolicy::Parallel,
            ConcurrencyPolicy::Adaptive,
            ConcurrencyPolicy::ThreadPool,
        ] {
            let config = ProcessConfig {
                concurrency: policy,
                ..ProcessConfig::default()
            };
            let result = process(&input, &config, |x| Ok::<_, String>(*x));
            assert!(result.is_success());
            assert_eq!(result.items_processed, 0);
            assert_eq!(result.threads_used, 0);
            assert!(result.results.is_empty());
        }
    }

    #[test]
    fn test_execution_time_recorded() {
        let input: Vec<u64> = (0..200).collect();
        let result = process_sequential(
            &input,
            |x| {
                std::thread::sleep(std::time::Duration::from_micros(10));
                Ok::<_, String>(*x)
            },
            &ProcessConfig::default(),
        );
        assert!(result.execution_time_ms > 0.0);
    }
}
