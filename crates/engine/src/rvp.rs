//! RVP: rendezvous point / join barrier (component C6).
//!
//! Two state words, per the design: a decrementable predecessor counter
//! and a single-writer fired flag. `post` atomically merges the outcome
//! into the aggregate (logical AND over success) and decrements the
//! counter; the atomics guarantee that exactly one `post` call observes
//! the counter reaching zero, so that call — and only that call — runs
//! the continuation. Continuations must not block: they enqueue the next
//! wave or request commit and return immediately, which is why they're
//! plain closures rather than anything that could suspend the calling
//! worker thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// What an RVP does when it fires.
pub enum RvpContinuation {
    /// Enqueue further actions. Takes the aggregate success flag (false
    /// means at least one predecessor failed, so the continuation should
    /// route to an abort/cleanup wave instead of the normal next wave).
    Midway(Box<dyn FnOnce(bool) + Send>),
    /// Request commit (on success) or abort (on failure) and reply to
    /// the client.
    Final(Box<dyn FnOnce(bool) + Send>),
}

/// A join barrier for one wave of a transaction's action graph.
pub struct Rvp {
    predecessors: AtomicU32,
    failed: AtomicBool,
    fired: AtomicBool,
    continuation: parking_lot::Mutex<Option<RvpContinuation>>,
}

impl Rvp {
    /// Create an armed RVP expecting `predecessor_count` `post` calls
    /// before it fires.
    pub fn new(predecessor_count: u32, continuation: RvpContinuation) -> Arc<Self> {
        Arc::new(Rvp {
            predecessors: AtomicU32::new(predecessor_count),
            failed: AtomicBool::new(false),
            fired: AtomicBool::new(false),
            continuation: parking_lot::Mutex::new(Some(continuation)),
        })
    }

    /// Whether this RVP has fired.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Whether any predecessor has posted failure so far.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Post one predecessor's outcome. Runs the continuation inline, on
    /// this call's thread, if this post brings the predecessor count to
    /// zero.
    pub fn post(&self, success: bool) {
        if !success {
            self.failed.store(true, Ordering::Release);
        }
        let remaining = self.predecessors.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(remaining >= 1, "RVP predecessor count underflowed — posted more times than armed");
        if remaining == 1 {
            self.fired.store(true, Ordering::Release);
            let aggregate_success = !self.failed.load(Ordering::Acquire);
            if let Some(continuation) = self.continuation.lock().take() {
                match continuation {
                    RvpContinuation::Midway(f) => f(aggregate_success),
                    RvpContinuation::Final(f) => f(aggregate_success),
                }
            }
        }
    }
}

/// A shared handle to an RVP, cheap to clone and hand to every
/// predecessor action.
pub type RvpHandle = Arc<Rvp>;
