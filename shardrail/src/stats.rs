//! Stats observer feeding the fleet counters.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use shardrail_stats::{AtomicCounts, Counts};

use crate::error::Error;
use crate::observer::{Observer, ObserverContext};

/// Records per-operation counters and latency totals.
#[derive(Debug, Default)]
pub struct StatsObserver {
    counts: Arc<AtomicCounts>,
    per_operation: Mutex<IndexMap<&'static str, usize>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the aggregate counters.
    pub fn counts(&self) -> Counts {
        self.counts.snapshot()
    }

    /// Dispatch totals keyed by operation variant name.
    pub fn per_operation(&self) -> IndexMap<&'static str, usize> {
        self.per_operation.lock().clone()
    }

    /// Shared handle for reporters that outlive the observer chain.
    pub fn handle(&self) -> Arc<AtomicCounts> {
        self.counts.clone()
    }

    fn bump(&self, ctx: &ObserverContext) {
        *self.per_operation.lock().entry(ctx.kind.name()).or_insert(0) += 1;
    }
}

impl Observer for StatsObserver {
    fn after(&self, ctx: &ObserverContext, elapsed: Duration) {
        self.bump(ctx);
        self.counts.record_ok(ctx.kind.is_write(), elapsed);
    }

    fn on_error(&self, ctx: &ObserverContext, error: &Error, elapsed: Duration) {
        self.bump(ctx);
        self.counts.record_error(
            ctx.kind.is_write(),
            matches!(error, Error::LockConflict),
            elapsed,
        );
    }
}
