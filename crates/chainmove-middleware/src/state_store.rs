//! [`JointStateStore`] – thread-safe cache of the latest joint readings.
//!
//! The store is written by the joint-state stream consumer and read by the
//! settle monitor and by trajectory construction.  It indexes purely by
//! joint name, so two chains that reference the same joint both observe the
//! same live value.
//!
//! A single coarse [`Mutex`] guards every read and write.  The lock is held
//! only while copying data in or out; callers work on their own copy.

use std::sync::{Mutex, MutexGuard};

use chainmove_types::{JointState, JointStateBatch, MotionError};
use chrono::{DateTime, Utc};
use tracing::error;

/// A consistent copy of the store contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSnapshot {
    pub state: JointState,
    /// `false` until at least one batch has been merged since construction
    /// or the last [`JointStateStore::invalidate`].
    pub valid: bool,
    /// Stamp of the most recently merged batch.
    pub stamp: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    state: JointState,
    valid: bool,
    stamp: Option<DateTime<Utc>>,
}

/// Lock-protected joint-state cache.  Share it behind an `Arc`.
#[derive(Default)]
pub struct JointStateStore {
    inner: Mutex<Inner>,
}

impl JointStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `batch` into the store.
    ///
    /// Joints already present are overwritten; unseen joints are appended.
    /// The store becomes valid after a successful merge.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::MalformedInput`] when `names`, `positions` and
    /// `velocities` differ in length.  The whole batch is dropped and the
    /// store is left untouched.
    pub fn update(&self, batch: &JointStateBatch) -> Result<(), MotionError> {
        if batch.names.len() != batch.positions.len() {
            error!(
                stamp = %batch.stamp,
                names = batch.names.len(),
                positions = batch.positions.len(),
                "joint state name array is not same size as position array"
            );
            return Err(MotionError::MalformedInput(format!(
                "{} names but {} positions",
                batch.names.len(),
                batch.positions.len()
            )));
        }
        if batch.positions.len() != batch.velocities.len() {
            error!(
                stamp = %batch.stamp,
                positions = batch.positions.len(),
                velocities = batch.velocities.len(),
                "joint state position array is not same size as velocity array"
            );
            return Err(MotionError::MalformedInput(format!(
                "{} positions but {} velocities",
                batch.positions.len(),
                batch.velocities.len()
            )));
        }

        let mut inner = self.lock();
        for ((name, &position), &velocity) in batch
            .names
            .iter()
            .zip(&batch.positions)
            .zip(&batch.velocities)
        {
            inner.state.set(name.clone(), position, velocity);
        }
        inner.valid = true;
        inner.stamp = Some(batch.stamp);
        Ok(())
    }

    /// Copy the current state and validity flag.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            state: inner.state.clone(),
            valid: inner.valid,
            stamp: inner.stamp,
        }
    }

    /// Mark the cached data as stale.  Joint values are kept; only the flag
    /// is cleared, so the next merged batch is distinguishable from data
    /// observed before this call.
    pub fn invalidate(&self) {
        self.lock().valid = false;
    }

    // The guarded data is plain values, so a panic in another holder cannot
    // leave it half-written in a way that matters here.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn batch(names: &[&str], positions: &[f64], velocities: &[f64]) -> JointStateBatch {
        JointStateBatch::new(
            names.iter().map(|n| n.to_string()).collect(),
            positions.to_vec(),
            velocities.to_vec(),
        )
    }

    #[test]
    fn new_store_is_invalid_and_empty() {
        let store = JointStateStore::new();
        let snap = store.snapshot();
        assert!(!snap.valid);
        assert!(snap.state.is_empty());
    }

    #[test]
    fn update_inserts_and_validates() {
        let store = JointStateStore::new();
        store
            .update(&batch(&["shoulder", "elbow"], &[0.1, 0.2], &[0.0, 0.5]))
            .unwrap();

        let snap = store.snapshot();
        assert!(snap.valid);
        assert_eq!(snap.state.len(), 2);
        assert_eq!(snap.state.position("elbow"), Some(0.2));
        assert_eq!(snap.state.get("elbow").map(|r| r.velocity), Some(0.5));
    }

    #[test]
    fn later_batches_overwrite_and_extend() {
        let store = JointStateStore::new();
        store
            .update(&batch(&["shoulder", "elbow"], &[0.1, 0.2], &[0.0, 0.0]))
            .unwrap();
        store
            .update(&batch(&["wrist", "shoulder"], &[1.0, 0.9], &[0.3, 0.0]))
            .unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.state.len(), 3);
        assert_eq!(snap.state.position("shoulder"), Some(0.9));
        assert_eq!(snap.state.position("elbow"), Some(0.2));
        assert_eq!(snap.state.position("wrist"), Some(1.0));
    }

    #[test]
    fn repeated_identical_updates_are_idempotent() {
        let store = JointStateStore::new();
        let b = batch(&["a", "b"], &[1.0, 2.0], &[0.0, 0.1]);
        store.update(&b).unwrap();
        let first = store.snapshot();
        store.update(&b).unwrap();
        store.update(&b).unwrap();
        assert_eq!(store.snapshot(), first);
    }

    #[test]
    fn mismatched_names_and_positions_leave_store_unchanged() {
        let store = JointStateStore::new();
        store.update(&batch(&["a"], &[1.0], &[0.0])).unwrap();
        let before = store.snapshot();

        let result = store.update(&batch(&["a", "b"], &[5.0], &[0.0, 0.0]));
        assert!(matches!(result, Err(MotionError::MalformedInput(_))));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn mismatched_velocities_leave_store_unchanged() {
        let store = JointStateStore::new();
        store.update(&batch(&["a"], &[1.0], &[0.0])).unwrap();
        store.invalidate();
        let before = store.snapshot();

        let result = store.update(&batch(&["a", "b"], &[5.0, 6.0], &[0.0]));
        assert!(matches!(result, Err(MotionError::MalformedInput(_))));
        // The rejected batch must not re-validate the store either.
        assert_eq!(store.snapshot(), before);
        assert!(!store.snapshot().valid);
    }

    #[test]
    fn snapshot_carries_stamp_of_last_merged_batch() {
        let store = JointStateStore::new();
        assert_eq!(store.snapshot().stamp, None);

        let first = batch(&["a"], &[1.0], &[0.0]);
        store.update(&first).unwrap();
        assert_eq!(store.snapshot().stamp, Some(first.stamp));

        let mut rejected = batch(&["a", "b"], &[2.0], &[0.0]);
        rejected.stamp = first.stamp + chrono::Duration::seconds(1);
        assert!(store.update(&rejected).is_err());
        store.invalidate();
        assert_eq!(store.snapshot().stamp, Some(first.stamp));
    }

    #[test]
    fn invalidate_keeps_values() {
        let store = JointStateStore::new();
        store.update(&batch(&["a"], &[1.0], &[0.0])).unwrap();
        store.invalidate();
        let snap = store.snapshot();
        assert!(!snap.valid);
        assert_eq!(snap.state.position("a"), Some(1.0));
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let store = Arc::new(JointStateStore::new());
        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for step in 0..100 {
                    let name = format!("joint_{i}");
                    store
                        .update(&JointStateBatch::new(
                            vec![name],
                            vec![step as f64],
                            vec![0.0],
                        ))
                        .unwrap();
                    let _ = store.snapshot();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = store.snapshot();
        assert_eq!(snap.state.len(), 4);
        for i in 0..4 {
            assert_eq!(snap.state.position(&format!("joint_{i}")), Some(99.0));
        }
    }
}
