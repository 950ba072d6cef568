//! Operation counters.

use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point-in-time operation counters.
///
/// Snapshots support subtraction, so periodic reporters can publish
/// deltas between two reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Total operations dispatched.
    pub operations: usize,
    /// Operations that completed without an error.
    pub completed: usize,
    /// Operations that surfaced an error.
    pub errors: usize,
    /// Errors that were no-wait lock acquisition failures.
    pub lock_conflicts: usize,
    /// Read operations.
    pub reads: usize,
    /// Write operations.
    pub writes: usize,
    /// Total time spent executing operations.
    pub total_time: Duration,
}

impl Sub for Counts {
    type Output = Counts;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            operations: self.operations.saturating_sub(rhs.operations),
            completed: self.completed.saturating_sub(rhs.completed),
            errors: self.errors.saturating_sub(rhs.errors),
            lock_conflicts: self.lock_conflicts.saturating_sub(rhs.lock_conflicts),
            reads: self.reads.saturating_sub(rhs.reads),
            writes: self.writes.saturating_sub(rhs.writes),
            total_time: self.total_time.saturating_sub(rhs.total_time),
        }
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            operations: self.operations + rhs.operations,
            completed: self.completed + rhs.completed,
            errors: self.errors + rhs.errors,
            lock_conflicts: self.lock_conflicts + rhs.lock_conflicts,
            reads: self.reads + rhs.reads,
            writes: self.writes + rhs.writes,
            total_time: self.total_time + rhs.total_time,
        }
    }
}

/// Live counters updated after each executed operation.
#[derive(Debug, Default)]
pub struct AtomicCounts {
    operations: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    lock_conflicts: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    total_time_us: AtomicU64,
}

impl AtomicCounts {
    pub fn record_ok(&self, write: bool, elapsed: Duration) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.direction(write);
        self.total_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, write: bool, lock_conflict: bool, elapsed: Duration) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
        if lock_conflict {
            self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
        }
        self.direction(write);
        self.total_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn direction(&self, write: bool) {
        if write {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Counts {
        Counts {
            operations: self.operations.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            lock_conflicts: self.lock_conflicts.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            total_time: Duration::from_micros(self.total_time_us.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_snapshot_delta() {
        let live = AtomicCounts::default();
        live.record_ok(false, Duration::from_micros(100));
        live.record_ok(true, Duration::from_micros(50));

        let first = live.snapshot();
        assert_eq!(first.operations, 2);
        assert_eq!(first.reads, 1);
        assert_eq!(first.writes, 1);

        live.record_error(true, true, Duration::from_micros(10));

        let second = live.snapshot();
        let delta = second - first;
        assert_eq!(delta.operations, 1);
        assert_eq!(delta.errors, 1);
        assert_eq!(delta.lock_conflicts, 1);
        assert_eq!(delta.completed, 0);
    }

    #[test]
    fn test_counts_serializable() {
        let counts = Counts::default();
        serde_json::to_string(&counts).unwrap();
    }
}
