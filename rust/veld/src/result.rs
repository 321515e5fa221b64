//! Processing outcome: ordered results plus execution metrics.

use veld_common::error::Error;

/// The outcome of one strategy invocation.
///
/// On success, `results` holds one output per input element in input order
/// and `items_processed == results.len() == input.len()`. On failure via the
/// sequential path, `results` is exactly the successfully mapped prefix and
/// `items_processed` is its length; the parallel path reports the prefix of
/// fully completed chunks preceding the first failed one.
///
/// Failures never escape the engine as panics or errors. Callers check
/// [`is_success`](Self::is_success) before trusting `results`.
#[derive(Debug)]
pub struct ProcessResult<Out> {
    /// Mapped output elements, always in input order.
    pub results: Vec<Out>,
    /// Count of elements successfully mapped before any failure.
    pub items_processed: usize,
    /// Wall-clock duration of the whole strategy invocation.
    pub execution_time_ms: f64,
    /// Worker threads the strategy ran on (0 for the empty-input guard,
    /// 1 for sequential).
    pub threads_used: usize,
    /// Bytes reserved for the output buffers.
    pub memory_allocated: usize,
    pub(crate) failure: Option<Error>,
}

impl<Out> ProcessResult<Out> {
    /// `true` when every input element was mapped.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The recorded failure, when one occurred.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Rendered failure message; `Some` exactly when the run failed.
    pub fn error_message(&self) -> Option<String> {
        self.failure.as_ref().map(|e| e.to_string())
    }

    /// An immediately successful result for empty input.
    pub(crate) fn empty(execution_time_ms: f64) -> ProcessResult<Out> {
        ProcessResult {
            results: Vec::new(),
            items_processed: 0,
            execution_time_ms,
            threads_used: 0,
            memory_allocated: 0,
            failure: None,
        }
    }

    /// A failed result that performed no processing, used when the
    /// configuration itself is rejected.
    pub(crate) fn rejected(error: Error) -> ProcessResult<Out> {
        ProcessResult {
            results: Vec::new(),
            items_processed: 0,
            execution_time_ms: 0.0,
            threads_used: 0,
            memory_allocated: 0,
            failure: Some(error),
        }
    }
}
