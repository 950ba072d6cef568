//! Public routing surfaces keyed by a single string.

mod keyed;
mod related;
pub(crate) mod scatter;
pub mod scroll;

pub use keyed::Router;
pub use related::RelatedRouter;
pub use scroll::{ScrollPointer, ScrollResult};

use crate::store::{Criterion, LockMode};

/// Mutable view over a read before it is dispatched: callers may narrow
/// the criterion or elevate the lock.
#[derive(Debug, Clone)]
pub struct ReadSpec {
    pub(crate) criterion: Criterion,
    pub(crate) lock: LockMode,
}

impl ReadSpec {
    pub(crate) fn new(criterion: Criterion) -> Self {
        Self {
            criterion,
            lock: LockMode::None,
        }
    }

    pub fn lock(&mut self, lock: LockMode) -> &mut Self {
        self.lock = lock;
        self
    }

    /// AND another criterion into the read.
    pub fn restrict(&mut self, criterion: Criterion) -> &mut Self {
        let existing = std::mem::replace(&mut self.criterion, Criterion::All);
        self.criterion = existing.and(criterion);
        self
    }
}
