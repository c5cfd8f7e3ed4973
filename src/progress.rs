//! Progress-callback trait for per-item batch events.
//!
//! Pass a [`BatchProgressCallback`] to
//! [`crate::batch::Pipeline::run`] to observe every status transition as the
//! batch moves through its files. [`crate::stream::spawn_batch`] wraps the
//! same events in a channel for consumers that prefer a `Stream`.
//!
//! # Example
//!
//! ```rust
//! use millsheet_renamer::{BatchItem, BatchProgressCallback};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct DoneCounter(AtomicUsize);
//!
//! impl BatchProgressCallback for DoneCounter {
//!     fn on_status(&self, item: &BatchItem) {
//!         if item.final_path().is_some() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::BatchItem;
use std::sync::Arc;

/// Called by the orchestrator as items move through the pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls arrive from the batch worker, one at a time
/// and in transition order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item starts.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called after every status transition of `item`.
    fn on_status(&self, item: &BatchItem) {
        let _ = item;
    }

    /// Called once after the last item reaches a terminal state, however
    /// many of them failed.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias for a shared callback.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ItemStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        statuses: AtomicUsize,
        done: AtomicUsize,
        completed_ok: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_items: usize) {
            self.started_total.store(total_items, Ordering::SeqCst);
        }

        fn on_status(&self, item: &BatchItem) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
            if matches!(item.status, ItemStatus::Done(_)) {
                self.done.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_batch_complete(&self, succeeded: usize, _failed: usize) {
            self.completed_ok.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_status(&BatchItem::new(0, "/a.pdf".into()));
        cb.on_batch_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(1);

        let mut item = BatchItem::new(0, "/a.pdf".into());
        for next in [
            ItemStatus::Rendering,
            ItemStatus::Extracting,
            ItemStatus::Renaming,
            ItemStatus::Done("/b.pdf".into()),
        ] {
            item.advance(next);
            tracker.on_status(&item);
        }
        tracker.on_batch_complete(1, 0);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.statuses.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.done.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_ok.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_batch_complete(10, 0);
    }
}
