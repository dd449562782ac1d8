//! Generic object pool (component C1).
//!
//! Grounded on the original `object_cache_t<T>`: a pool pre-warmed with a
//! configurable number of objects at construction, handed out by
//! `borrow()` and returned by `giveback()`, so that steady-state
//! transaction processing allocates no `Action`/`Rvp` nodes after warm-up.
//!
//! The original is a lock-free Treiber stack tuned for a specific
//! architecture (`sparcv9`). That's not a trade worth making here: the
//! pool is touched once per action/RVP allocation, not on every tuple
//! access, so a `parking_lot::Mutex<Vec<T>>` is plenty — parking_lot's
//! uncontended fast path is a handful of atomic ops, and the pool never
//! sits in a hot per-tuple loop the way the row cache this was modeled on
//! does.

use parking_lot::Mutex;

/// A pool of reusable `T`s.
///
/// `T` must supply a `reset()`-style constructor via `Default` plus a
/// factory closure so the pool can manufacture new objects on demand once
/// the free list runs dry; callers that need to clear object state before
/// reuse should do so themselves after `borrow()`, mirroring
/// `cacheable_iface::reset()` in the original.
pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> ObjectPool<T> {
    /// Build a pool pre-warmed with `init_count` objects, each produced by
    /// `factory`. Matches `object_cache_t`'s constructor, which allocates
    /// `DEFAULT_INIT_OBJECT_COUNT` objects up front so that early borrowers
    /// don't race each other into the allocator.
    pub fn with_capacity(init_count: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let mut free = Vec::with_capacity(init_count);
        for _ in 0..init_count {
            free.push(factory());
        }
        ObjectPool {
            free: Mutex::new(free),
            factory: Box::new(factory),
        }
    }

    /// Take an object from the free list, manufacturing a new one via the
    /// factory if the pool is empty.
    pub fn borrow(&self) -> T {
        if let Some(obj) = self.free.lock().pop() {
            obj
        } else {
            (self.factory)()
        }
    }

    /// Return an object to the free list for reuse.
    pub fn giveback(&self, obj: T) {
        self.free.lock().push(obj);
    }

    /// Number of objects currently sitting idle in the free list.
    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn pre_warms_to_init_count() {
        let pool = ObjectPool::with_capacity(5, || 0i32);
        assert_eq!(pool.idle_count(), 5);
    }

    #[test]
    fn borrow_drains_then_falls_back_to_factory() {
        let made = Arc::new(AtomicUsize::new(0));
        let made2 = made.clone();
        let pool = ObjectPool::with_capacity(1, move || {
            made2.fetch_add(1, Ordering::SeqCst);
            0i32
        });
        assert_eq!(made.load(Ordering::SeqCst), 1);
        let _a = pool.borrow();
        assert_eq!(pool.idle_count(), 0);
        let _b = pool.borrow();
        assert_eq!(made.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn giveback_makes_object_available_again() {
        let pool = ObjectPool::with_capacity(1, || 0i32);
        let obj = pool.borrow();
        assert_eq!(pool.idle_count(), 0);
        pool.giveback(obj);
        assert_eq!(pool.idle_count(), 1);
    }
}
