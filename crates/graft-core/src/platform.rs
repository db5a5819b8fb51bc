//! Platform abstraction for deferring a flush.
//!
//! The update scheduler never runs work inline; it asks the platform to
//! arrange one deferred flush and keeps queueing until that flush drains
//! everything. This keeps the engine independent of any particular event
//! loop while preserving single-writer, run-to-completion semantics.

/// Arranges for the embedder to invoke one flush after the current turn.
///
/// Implementations must be callable from any thread, but the flush itself
/// always runs on the thread that owns the reconciler.
pub trait FlushScheduler: Send + Sync {
    fn schedule_flush(&self);
}
