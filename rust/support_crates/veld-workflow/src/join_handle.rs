//! Handles for waiting on thread pool task results.
//!
//! [`JoinHandle`] covers `'static` tasks submitted with
//! [`ThreadPool::spawn`](crate::thread_pool::ThreadPool::spawn);
//! [`ScopedJoinHandle`] covers tasks spawned inside a
//! [`scope`](crate::thread_pool::ThreadPool::scope), where the extra lifetime
//! parameter keeps the handle from escaping the scope that owns the borrowed
//! data.

use crate::oneshot::{self, OneshotReceiver};

/// A handle for waiting on the result of a `'static` task.
pub struct JoinHandle<R>(OneshotReceiver<R>);

impl<R> JoinHandle<R> {
    pub(crate) fn new(rx: OneshotReceiver<R>) -> JoinHandle<R> {
        JoinHandle(rx)
    }

    /// Creates a handle that is immediately ready with `res`.
    pub fn ready(res: R) -> Self {
        Self(oneshot::ready(res))
    }

    /// Returns `true` once the task has completed and the result is waiting.
    pub fn is_ready(&self) -> bool {
        !self.0.is_pending()
    }

    /// Blocks until the task completes and returns its result.
    ///
    /// # Panics
    ///
    /// Panics if the task itself panicked before producing a result.
    pub fn join(self) -> R {
        self.0.recv().expect("task result")
    }

    /// Joins every handle, collecting the results in handle order.
    pub fn join_all(handles: impl IntoIterator<Item = JoinHandle<R>>) -> Vec<R> {
        handles.into_iter().map(|h| h.join()).collect()
    }
}

/// A handle for waiting on the result of a scoped task.
///
/// Identical to [`JoinHandle`] except for the `'scope` lifetime, which ties
/// the handle to the scope the task was spawned in.
pub struct ScopedJoinHandle<'scope, R>(OneshotReceiver<R>, std::marker::PhantomData<&'scope ()>);

impl<'scope, R> ScopedJoinHandle<'scope, R> {
    pub(crate) fn new(rx: OneshotReceiver<R>) -> ScopedJoinHandle<'scope, R> {
        ScopedJoinHandle(rx, Default::default())
    }

    /// Creates a handle that is immediately ready with `res`.
    pub fn ready(res: R) -> Self {
        Self(oneshot::ready(res), Default::default())
    }

    /// Returns `true` once the task has completed and the result is waiting.
    pub fn is_ready(&self) -> bool {
        !self.0.is_pending()
    }

    /// Blocks until the task completes and returns its result.
    ///
    /// # Panics
    ///
    /// Panics if the task itself panicked before producing a result.
    pub fn join(self) -> R {
        self.0.recv().expect("task result")
    }
}
