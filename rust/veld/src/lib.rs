//! # Veld: adaptive data-parallel processing
//!
//! Veld applies a caller-supplied mapping function to every element of a
//! slice, choosing between sequential and chunked-parallel execution based on
//! workload size and hardware concurrency, and reports timing and
//! thread-usage metrics alongside the results.
//!
//! The entry points live in [`engine`]:
//!
//! * [`engine::process`] - dispatches on the configured
//!   [`ConcurrencyPolicy`] to one of the three strategies
//! * [`engine::process_sequential`] - in-order mapping, fail-fast on the
//!   first error, partial prefix reported
//! * [`engine::process_parallel`] - chunked execution on the shared worker
//!   pool, output always in input order
//! * [`engine::process_adaptive`] - picks sequential or parallel from input
//!   size and detected hardware concurrency
//!
//! Mapping functions report failure by returning `Err`; the engine never lets
//! an error escape as a panic. Callers inspect
//! [`ProcessResult::is_success`] before trusting the results.
//!
//! The concurrency and memory primitives are reusable on their own and are
//! re-exported here: [`workflow`] provides the worker pool and join handles,
//! [`slab_pool`] the slab-style memory pool with RAII slot guards.
//!
//! ## Example
//!
//! ```
//! use veld::engine;
//!
//! let input = vec![1i64, 2, 3, 4, 5];
//! let result = engine::process_with_defaults(&input, |x| Ok::<_, String>(x * x));
//! assert!(result.is_success());
//! assert_eq!(result.results, vec![1, 4, 9, 16, 25]);
//! ```

pub mod bench;
pub mod config;
pub mod engine;
pub mod result;

pub use config::{ConcurrencyPolicy, MemoryPolicy, ProcessConfig, SafetyPolicy};
pub use result::ProcessResult;

pub use veld_common as common;
pub use veld_slab_pool as slab_pool;
pub use veld_workflow as workflow;
