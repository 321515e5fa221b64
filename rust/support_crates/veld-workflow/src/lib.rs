//! Workflow execution utilities for parallel processing.
//!
//! This crate provides the concurrency primitives used by the veld engine:
//!
//! - [`thread_pool::ThreadPool`] - a fixed-size worker pool consuming a shared
//!   FIFO task queue, with support for scoped (non-`'static`) task execution
//! - [`join_handle`] - handles for waiting on task results
//! - [`oneshot`] - single-value communication between threads, backing the
//!   join handles
//!
//! All primitives are plain OS-thread constructs; there is no async runtime
//! involved.

pub mod join_handle;
pub mod oneshot;
pub mod thread_pool;
