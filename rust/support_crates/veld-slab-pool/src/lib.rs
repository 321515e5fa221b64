//! A slab-style memory pool handing out reusable typed slots.
//!
//! [`SlabPool`] owns one or more fixed-size blocks of `T` storage and a freelist
//! of currently unborrowed slots. Acquiring a slot pops it from the freelist,
//! growing the pool by one block when the freelist is empty; dropping the
//! returned [`PoolSlot`] guard pushes the slot back. The guard is the only way
//! to hold a slot: it cannot be copied or cloned, and it returns its slot
//! exactly once, so double-release and use-after-release cannot be expressed.
//!
//! Slots are initialized with `T::default()` when their block is allocated and
//! are handed out as-is afterwards, so a reacquired slot may still carry the
//! value left by its previous borrower. Use [`PoolSlot::reset`] when a fresh
//! value is needed.
//!
//! By default the pool grows without bound. [`SlabPool::with_max_blocks`]
//! creates a bounded pool whose [`acquire`](SlabPool::acquire) fails with
//! [`PoolError::Exhausted`] once the growth ceiling is reached.

use std::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    sync::{Mutex, MutexGuard},
};

use thiserror::Error;

/// Errors reported by [`SlabPool`] operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A bounded pool cannot grow past its block limit.
    #[error("slab pool exhausted: {allocated} slots allocated, growth limit {limit} blocks")]
    Exhausted { allocated: usize, limit: usize },
}

/// A thread-safe slab allocator over `T` slots.
///
/// All shared state (the blocks and the freelist) is guarded by a single
/// mutex, held only for freelist push/pop and the occasional block
/// allocation, never across user code.
pub struct SlabPool<T> {
    state: Mutex<PoolState<T>>,
    block_size: usize,
    max_blocks: Option<usize>,
}

struct PoolState<T> {
    /// Backing storage. Blocks are boxed slices, so slot addresses stay
    /// stable while the `blocks` vector itself grows.
    blocks: Vec<Box<[UnsafeCell<T>]>>,
    /// Addresses of slots not currently borrowed. Every entry points into
    /// exactly one block owned by this pool, and appears at most once.
    free: Vec<NonNull<T>>,
    total_allocated: usize,
}

impl<T: Default> SlabPool<T> {
    /// Creates a pool with one initial block of `block_size` slots, all
    /// available. The pool grows by one block whenever the freelist runs dry.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is 0.
    pub fn new(block_size: usize) -> SlabPool<T> {
        Self::with_limit(block_size, None)
    }

    /// Creates a bounded pool that refuses to grow past `max_blocks` blocks.
    ///
    /// Acquiring a slot when all `max_blocks * block_size` slots are borrowed
    /// returns [`PoolError::Exhausted`] instead of allocating.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` or `max_blocks` is 0.
    pub fn with_max_blocks(block_size: usize, max_blocks: usize) -> SlabPool<T> {
        assert_ne!(max_blocks, 0);
        Self::with_limit(block_size, Some(max_blocks))
    }

    fn with_limit(block_size: usize, max_blocks: Option<usize>) -> SlabPool<T> {
        assert_ne!(block_size, 0);
        let pool = SlabPool {
            state: Mutex::new(PoolState {
                blocks: Vec::new(),
                free: Vec::new(),
                total_allocated: 0,
            }),
            block_size,
            max_blocks,
        };
        let mut state = pool.state.lock().unwrap();
        pool.grow(&mut state).expect("initial block");
        drop(state);
        pool
    }

    /// Borrows one slot from the pool.
    ///
    /// Pops a slot from the freelist, growing the pool by exactly one block
    /// of `block_size` slots first when the freelist is empty. Unbounded
    /// pools never fail; bounded pools fail with [`PoolError::Exhausted`]
    /// once the ceiling is reached.
    ///
    /// The returned guard keeps the slot borrowed until it is dropped.
    pub fn acquire(&self) -> Result<PoolSlot<'_, T>, PoolError> {
        let mut state = self.state.lock().unwrap();
        if state.free.is_empty() {
            self.grow(&mut state)?;
        }
        let slot = state.free.pop().expect("nonempty freelist");
        Ok(PoolSlot { pool: self, slot })
    }

    /// Total number of slots ever allocated by this pool, borrowed or not.
    pub fn total_allocated(&self) -> usize {
        self.state.lock().unwrap().total_allocated
    }

    /// Number of slots currently available for borrowing.
    pub fn available_count(&self) -> usize {
        self.state.lock().unwrap().free.len()
    }

    /// Number of slots added per growth step.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn grow(&self, state: &mut MutexGuard<'_, PoolState<T>>) -> Result<(), PoolError> {
        if let Some(limit) = self.max_blocks {
            if state.blocks.len() >= limit {
                return Err(PoolError::Exhausted {
                    allocated: state.total_allocated,
                    limit,
                });
            }
        }
        let block: Box<[UnsafeCell<T>]> = (0..self.block_size)
            .map(|_| UnsafeCell::new(T::default()))
            .collect();
        for cell in block.iter() {
            let slot = NonNull::new(cell.get()).expect("boxed slot");
            state.free.push(slot);
        }
        state.blocks.push(block);
        state.total_allocated += self.block_size;
        Ok(())
    }

    fn release(&self, slot: NonNull<T>) {
        self.state.lock().unwrap().free.push(slot);
    }
}

// Safety: slot addresses are handed out to at most one `PoolSlot` at a time
// (freelist discipline), blocks never move once allocated, and all freelist
// manipulation happens under the state mutex.
unsafe impl<T: Send> Send for SlabPool<T> {}
unsafe impl<T: Send> Sync for SlabPool<T> {}

/// An exclusive borrow of one pool slot.
///
/// Derefs to the slot value. Dropping the guard returns the slot to the
/// pool's freelist. The guard is tied to the pool's lifetime and cannot be
/// cloned, so each borrowed slot is released exactly once.
pub struct PoolSlot<'a, T: Default> {
    pool: &'a SlabPool<T>,
    slot: NonNull<T>,
}

impl<T: Default> std::fmt::Debug for PoolSlot<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSlot")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl<T: Default> PoolSlot<'_, T> {
    /// Restores the slot to `T::default()`, discarding any value left by a
    /// previous borrower.
    pub fn reset(&mut self) {
        **self = T::default();
    }
}

impl<T: Default> Deref for PoolSlot<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the freelist discipline guarantees this guard is the sole
        // reference to the slot, and the pool (hence the block) outlives it.
        unsafe { self.slot.as_ref() }
    }
}

impl<T: Default> DerefMut for PoolSlot<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: same as `deref`, plus `&mut self` rules out aliasing
        // through this guard.
        unsafe { self.slot.as_mut() }
    }
}

impl<T: Default> Drop for PoolSlot<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}

// Safety: the guard carries exclusive access to a `T` plus a shared pool
// reference; both are safe to move across threads when `T: Send`.
unsafe impl<T: Send + Default> Send for PoolSlot<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_block() {
        let pool = SlabPool::<u64>::new(8);
        assert_eq!(pool.total_allocated(), 8);
        assert_eq!(pool.available_count(), 8);
        assert_eq!(pool.block_size(), 8);
    }

    #[test]
    #[should_panic]
    fn test_zero_block_size() {
        SlabPool::<u64>::new(0);
    }

    #[test]
    fn test_acquire_and_release_on_drop() {
        let pool = SlabPool::<u64>::new(4);
        {
            let mut slot = pool.acquire().unwrap();
            *slot = 17;
            assert_eq!(*slot, 17);
            assert_eq!(pool.available_count(), 3);
        }
        assert_eq!(pool.available_count(), 4);
        assert_eq!(pool.total_allocated(), 4);
    }

    #[test]
    fn test_growth_by_one_block() {
        // Four acquires drain the initial block; the fifth grows by exactly
        // one more block of four slots.
        let pool = SlabPool::<i32>::new(4);
        let slots: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.available_count(), 0);
        assert_eq!(pool.total_allocated(), 4);

        let addrs: Vec<*const i32> = slots.iter().map(|s| &**s as *const i32).collect();
        for (i, a) in addrs.iter().enumerate() {
            for b in &addrs[i + 1..] {
                assert_ne!(*a, *b);
            }
        }

        let fifth = pool.acquire().unwrap();
        assert_eq!(pool.total_allocated(), 8);
        assert_eq!(pool.available_count(), 3);
        drop(fifth);
        drop(slots);
        assert_eq!(pool.available_count(), 8);
    }

    #[test]
    fn test_bounded_pool_exhaustion() {
        let pool = SlabPool::<u8>::with_max_blocks(2, 1);
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(
            err,
            PoolError::Exhausted {
                allocated: 2,
                limit: 1
            }
        ));
        drop(_a);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_slot_reuse_and_reset() {
        let pool = SlabPool::<String>::new(1);
        {
            let mut slot = pool.acquire().unwrap();
            slot.push_str("leftover");
        }
        let mut slot = pool.acquire().unwrap();
        assert_eq!(&*slot, "leftover");
        slot.reset();
        assert!(slot.is_empty());
    }

    #[test]
    fn test_invariant_under_random_ops() {
        // available + outstanding == total_allocated after every operation.
        let pool = SlabPool::<u64>::new(3);
        let mut held = Vec::new();
        for _ in 0..500 {
            if held.is_empty() || fastrand::bool() {
                held.push(pool.acquire().unwrap());
            } else {
                let idx = fastrand::usize(..held.len());
                held.swap_remove(idx);
            }
            assert_eq!(
                pool.available_count() + held.len(),
                pool.total_allocated()
            );
        }
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = SlabPool::<u64>::new(4);
        std::thread::scope(|scope| {
            for t in 0..4 {
                let pool = &pool;
                scope.spawn(move || {
                    for i in 0..200 {
                        let mut slot = pool.acquire().unwrap();
                        *slot = t * 1000 + i;
                        assert_eq!(*slot, t * 1000 + i);
                    }
                });
            }
        });
        assert_eq!(pool.available_count(), pool.total_allocated());
    }
}
