//! Fixed-size thread pool with a shared FIFO task queue.
//!
//! [`ThreadPool`] spawns a fixed set of worker threads that consume tasks from
//! one shared queue. Tasks can be submitted fire-and-forget with
//! [`enqueue`](ThreadPool::enqueue), with a result handle via
//! [`spawn`](ThreadPool::spawn), or - for closures borrowing stack data -
//! inside a [`scope`](ThreadPool::scope), which guarantees every scoped task
//! finishes before the scope returns.
//!
//! Tasks run in submission order (FIFO) whenever workers are contended. A
//! task that panics terminates only that task; the worker catches the unwind
//! and keeps serving the queue, so a failure that must be observed has to be
//! captured by the task itself (for example by returning a `Result` through
//! [`spawn`](ThreadPool::spawn)).
//!
//! On drop (or an explicit [`stop`](ThreadPool::stop)) the pool stops
//! accepting work, lets the workers drain every task enqueued beforehand, and
//! joins each worker thread. No worker outlives the pool.

use std::{
    collections::VecDeque,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Condvar, Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crate::{
    join_handle::{JoinHandle, ScopedJoinHandle},
    oneshot,
};

/// A boxed unit of work executed by a worker thread.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads consuming a shared FIFO task queue.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

struct PoolShared {
    state: Mutex<QueueState>,
    work_ready: Condvar,
}

struct QueueState {
    queue: VecDeque<Task>,
    /// Count of tasks currently executing on worker threads. Together with
    /// queue emptiness this defines quiescence for `wait_all`.
    active_tasks: usize,
    stop: bool,
}

impl ThreadPool {
    /// Creates a pool with `worker_count` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is 0.
    pub fn new(worker_count: usize) -> ThreadPool {
        assert_ne!(worker_count, 0);

        let shared = Arc::new(PoolShared {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                active_tasks: 0,
                stop: false,
            }),
            work_ready: Condvar::new(),
        });
        let workers = (0..worker_count)
            .map(|i| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("veld-worker-{i}"))
                    .spawn(move || Self::worker_fn(&shared))
                    .expect("spawn worker thread")
            })
            .collect();

        ThreadPool { shared, workers }
    }

    /// Creates a pool sized to the detected hardware concurrency
    /// (falling back to 8 threads when detection fails).
    pub fn with_default_threads() -> ThreadPool {
        let worker_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        Self::new(worker_count)
    }

    /// Configures the size of the global pool.
    ///
    /// Only takes effect if called before the first use of
    /// [`global()`](Self::global). Values below 1 are clamped to 1.
    pub fn configure_global_pool_size(pool_size: usize) {
        GLOBAL_POOL_SIZE.store(pool_size.max(1), Ordering::SeqCst);
    }

    /// Returns the shared process-wide pool, lazily initialized on first use.
    ///
    /// The pool size is the value set through
    /// [`configure_global_pool_size`](Self::configure_global_pool_size), or
    /// `(available_parallelism * 3 + 1) / 2` (fallback 8) when unset. The
    /// oversized default keeps workers available when a scope runs one more
    /// task than its nominal thread budget.
    pub fn global() -> &'static ThreadPool {
        static POOL: OnceLock<ThreadPool> = OnceLock::new();
        POOL.get_or_init(|| ThreadPool::new(Self::get_global_pool_size()))
    }

    /// Appends a task to the queue and wakes one waiting worker.
    ///
    /// Never blocks the caller. The task runs after every task enqueued
    /// before it has been claimed by a worker.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_boxed(Box::new(task));
    }

    /// Submits a task and returns a handle for its result.
    pub fn spawn<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<R>();
        self.enqueue(move || {
            let res = f();
            // The receiver may have been dropped; nothing to report then.
            let _ = tx.send(res);
        });
        JoinHandle::new(rx)
    }

    /// Blocks until the queue is empty and no task is executing.
    ///
    /// This is a completion barrier, not an error channel: task failures are
    /// not surfaced here. The wait polls the queue state once per
    /// millisecond.
    pub fn wait_all(&self) {
        loop {
            {
                let state = self.shared.state.lock().unwrap();
                if state.queue.is_empty() && state.active_tasks == 0 {
                    return;
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Number of worker threads owned by this pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Runs non-`'static` tasks on the pool workers.
    ///
    /// The closure receives a [`Scope`] through which tasks borrowing local
    /// data can be spawned. Every task spawned within the scope is guaranteed
    /// to finish before `scope` returns, which is what makes the borrows
    /// sound.
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> R,
    {
        let scope = Scope {
            pool: self,
            tracker: ScopeTracker::new(),
            scope: std::marker::PhantomData,
            env: std::marker::PhantomData,
        };
        let res = f(&scope);
        scope.tracker.wait();
        res
    }

    /// Signals stop, drains the remaining queue and joins every worker.
    ///
    /// Tasks enqueued before the stop signal still run. Idempotent; also
    /// invoked by `Drop`.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.stop = true;
        }
        self.shared.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }

    fn enqueue_boxed(&self, task: Task) {
        {
            let mut state = self.shared.state.lock().unwrap();
            assert!(!state.stop, "enqueue on a stopped thread pool");
            state.queue.push_back(task);
        }
        self.shared.work_ready.notify_one();
    }

    fn get_global_pool_size() -> usize {
        let size = GLOBAL_POOL_SIZE.load(Ordering::SeqCst);
        if size == 0 {
            thread::available_parallelism()
                .map(|n| (n.get() * 3).div_ceil(2))
                .unwrap_or(8)
        } else {
            size
        }
    }

    fn worker_fn(shared: &PoolShared) {
        loop {
            let task = {
                let mut state = shared.state.lock().unwrap();
                loop {
                    if let Some(task) = state.queue.pop_front() {
                        state.active_tasks += 1;
                        break task;
                    }
                    if state.stop {
                        return;
                    }
                    state = shared.work_ready.wait(state).unwrap();
                }
            };

            // A panicking task must not take the worker down with it.
            let _ = catch_unwind(AssertUnwindSafe(task));

            let mut state = shared.state.lock().unwrap();
            state.active_tasks -= 1;
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::with_default_threads()
    }
}

/// Size configured for the lazily-initialized global pool; 0 means "derive
/// from hardware concurrency".
static GLOBAL_POOL_SIZE: AtomicUsize = AtomicUsize::new(0);

/// A scope for running closures that borrow local data on pool workers.
///
/// Created by [`ThreadPool::scope`]. Tasks are spawned with
/// [`spawn`](Self::spawn); the scope blocks until all of them complete before
/// control returns to the caller of `scope`.
pub struct Scope<'scope, 'env: 'scope> {
    pool: &'scope ThreadPool,
    tracker: Arc<ScopeTracker>,
    scope: std::marker::PhantomData<&'scope mut &'scope ()>,
    env: std::marker::PhantomData<&'env mut &'env ()>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Enqueues a task that may borrow data from the scope's environment.
    ///
    /// Returns a handle for the task's result. Joining is optional; the scope
    /// itself waits for every spawned task on exit.
    pub fn spawn<F, R>(&'scope self, f: F) -> ScopedJoinHandle<'scope, R>
    where
        F: FnOnce() -> R + Send + 'scope,
        R: Send + 'scope,
    {
        self.tracker.task_spawned();
        let completion = CompletionGuard(self.tracker.clone());
        let (tx, rx) = oneshot::channel::<R>();
        let work_fn = move || {
            // Moved in so the tracker is notified even if `f` unwinds.
            let _completion = completion;
            let res = f();
            let _ = tx.send(res);
        };
        let work_fn = Box::into_raw(Box::new(work_fn) as Box<dyn FnOnce() + Send + 'scope>);
        // Casting away 'scope: sound because `ScopeTracker::wait` keeps the
        // scope (and everything it borrows) alive until this task finishes.
        let work_fn = unsafe {
            Box::from_raw(std::mem::transmute::<
                *mut (dyn FnOnce() + Send + 'scope),
                *mut (dyn FnOnce() + Send + 'static),
            >(work_fn))
        };
        self.pool.enqueue_boxed(work_fn);
        ScopedJoinHandle::new(rx)
    }
}

/// Counts in-flight scoped tasks and lets the scope block until the count
/// drains to zero.
struct ScopeTracker {
    state: Mutex<usize>,
    all_done: Condvar,
}

impl ScopeTracker {
    fn new() -> Arc<ScopeTracker> {
        Arc::new(ScopeTracker {
            state: Mutex::new(0),
            all_done: Condvar::new(),
        })
    }

    fn task_spawned(&self) {
        *self.state.lock().unwrap() += 1;
    }

    fn task_completed(&self) {
        let mut in_flight = self.state.lock().unwrap();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.all_done.notify_all();
        }
    }

    fn wait(&self) {
        let in_flight = self.state.lock().unwrap();
        let _guard = self
            .all_done
            .wait_while(in_flight, |in_flight| *in_flight > 0)
            .unwrap();
    }
}

struct CompletionGuard(Arc<ScopeTracker>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.task_completed();
    }
}
