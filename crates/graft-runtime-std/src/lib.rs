//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides the concrete implementation of the platform
//! abstraction defined in `graft-core`. An embedder constructs a
//! [`StdRuntime`], hands its scheduler to
//! [`graft_core::Reconciler::with_scheduler`], and drives flushes from its
//! own event loop by polling [`StdRuntime::take_flush_request`] or by
//! registering a waker.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use graft_core::FlushScheduler;

/// Flush scheduler that records requests behind an atomic flag and pokes an
/// optional waker, so any event loop can observe pending work.
pub struct StdScheduler {
    flush_requested: AtomicBool,
    flush_waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            flush_requested: AtomicBool::new(false),
            flush_waker: RwLock::new(None),
        }
    }

    /// Returns whether a flush has been requested since the last call.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a new flush is scheduled.
    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.flush_waker.write().unwrap() = Some(Arc::new(waker));
    }

    /// Clears any registered flush waker.
    pub fn clear_flush_waker(&self) {
        *self.flush_waker.write().unwrap() = None;
    }

    fn wake(&self) {
        let waker = self.flush_waker.read().unwrap().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "flush_requested",
                &self.flush_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl FlushScheduler for StdScheduler {
    fn schedule_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Convenience container bundling the standard flush scheduler.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self {
            scheduler: Arc::new(StdScheduler::default()),
        }
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns the scheduler as the trait object the reconciler expects.
    pub fn flush_scheduler(&self) -> Arc<dyn FlushScheduler> {
        Arc::clone(&self.scheduler) as Arc<dyn FlushScheduler>
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    /// Registers a waker to be called when the runtime schedules a flush.
    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_flush_waker(waker);
    }

    /// Clears any previously registered flush waker.
    pub fn clear_flush_waker(&self) {
        self.scheduler.clear_flush_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
