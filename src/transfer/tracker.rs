//! Sync process tracker
//!
//! Tracks fractional completion of one record's delivery across N
//! concurrent sub-tasks (chunks or peers). Completion is idempotent and
//! progress is always derived from the completion set, so the two can
//! never desync. The tracker only records outcomes; scheduling belongs
//! to the engine's bounded worker pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::record::RecordId;

struct HandleInner {
    record_id: RecordId,
    /// Fixed-size completion set, sized at creation
    done: Mutex<Vec<bool>>,
}

/// Handle to one tracked transfer. Cloning shares the same completion
/// set; dropping all clones discards the bookkeeping.
#[derive(Clone)]
pub struct TransferHandle {
    inner: Arc<HandleInner>,
}

impl TransferHandle {
    fn new(record_id: RecordId, task_count: usize) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                record_id,
                done: Mutex::new(vec![false; task_count]),
            }),
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.inner.record_id
    }

    pub fn task_count(&self) -> usize {
        self.inner.done.lock().unwrap().len()
    }

    /// Mark one task complete. Returns true only on the first call for
    /// a given index; repeats and out-of-range indices are no-ops.
    pub fn mark_task_complete(&self, task_index: usize) -> bool {
        let mut done = self.inner.done.lock().unwrap();
        match done.get_mut(task_index) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            Some(_) => false,
            None => {
                debug!(
                    "Ignoring completion for out-of-range task {} of record {}",
                    task_index, self.inner.record_id
                );
                false
            }
        }
    }

    /// Fraction complete in [0.0, 1.0], derived from the completion set
    pub fn progress(&self) -> f64 {
        let done = self.inner.done.lock().unwrap();
        if done.is_empty() {
            return 1.0;
        }
        done.iter().filter(|d| **d).count() as f64 / done.len() as f64
    }

    pub fn is_complete(&self) -> bool {
        self.inner.done.lock().unwrap().iter().all(|d| *d)
    }
}

/// Registry of in-flight transfers, keyed by record id
#[derive(Default)]
pub struct SyncTracker {
    active: Mutex<HashMap<RecordId, TransferHandle>>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a record's delivery across `task_count` tasks.
    /// Restarting an id replaces the previous handle.
    pub fn start_tracking(&self, record_id: RecordId, task_count: usize) -> TransferHandle {
        let handle = TransferHandle::new(record_id, task_count);
        self.active
            .lock()
            .unwrap()
            .insert(record_id, handle.clone());
        handle
    }

    /// Current progress for a record still being tracked
    pub fn current_progress(&self, record_id: RecordId) -> Option<f64> {
        self.active
            .lock()
            .unwrap()
            .get(&record_id)
            .map(|h| h.progress())
    }

    /// Forget a finished (or abandoned) transfer
    pub fn finish(&self, record_id: RecordId) {
        self.active.lock().unwrap().remove(&record_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reaches_exactly_one() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(1, 4);
        for i in 0..4 {
            assert!(handle.mark_task_complete(i));
        }
        assert_eq!(handle.progress(), 1.0);
        assert!(handle.is_complete());
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(1, 3);

        assert!(handle.mark_task_complete(0));
        let before = handle.progress();
        assert!(!handle.mark_task_complete(0));
        assert_eq!(handle.progress(), before);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(1, 2);
        assert!(!handle.mark_task_complete(7));
        assert_eq!(handle.progress(), 0.0);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(1, 10);
        let mut last = 0.0;
        for i in [3usize, 1, 1, 7, 3, 0, 9] {
            handle.mark_task_complete(i);
            let now = handle.progress();
            assert!(now >= last);
            last = now;
        }
    }

    #[tokio::test]
    async fn test_concurrent_completion_is_safe() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(1, 100);

        let mut tasks = Vec::new();
        for i in 0..100 {
            let handle = handle.clone();
            // Two tasks race for every index; exactly one wins each.
            for _ in 0..2 {
                let h = handle.clone();
                tasks.push(tokio::spawn(async move { h.mark_task_complete(i) }));
            }
        }

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 100);
        assert_eq!(handle.progress(), 1.0);
    }

    #[test]
    fn test_tracker_registry() {
        let tracker = SyncTracker::new();
        let handle = tracker.start_tracking(5, 2);
        handle.mark_task_complete(0);
        assert_eq!(tracker.current_progress(5), Some(0.5));
        tracker.finish(5);
        assert_eq!(tracker.current_progress(5), None);
    }
}
