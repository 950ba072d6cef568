//! Composite operations driven by locked and read-only contexts.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::context::Populator;
use crate::error::Error;
use crate::store::{Criterion, Entity, LockMode, Selection, Session};
use crate::txn::TxnScope;

use super::{OpKind, Operation};

/// Closure queued on a locked context, run against the shared
/// transaction and the acquired parent.
pub(crate) type QueuedOp<T, S> =
    Box<dyn for<'a> FnOnce(TxnScope<'a, S>, &'a mut T) -> BoxFuture<'a, Result<(), Error>> + Send>;

/// Augmenter body run for each parent instance of a read-only context.
pub(crate) type AugmentOp<T, S> =
    Box<dyn for<'a> FnMut(TxnScope<'a, S>, &'a mut T) -> BoxFuture<'a, Result<(), Error>> + Send>;

/// How a locked context produces its parent row.
pub(crate) enum Acquire<T> {
    /// Fetch under a no-wait write lock; absence is an error.
    Fetch { criterion: Criterion },
    /// Persist a fresh entity; the augmented row becomes the parent.
    Persist { entity: T },
}

/// Acquire a parent row, then run the queued operations in insertion
/// order inside the same transaction.
pub struct LockAndExecute<T, S> {
    shard: usize,
    acquire: Acquire<T>,
    queued: Vec<QueuedOp<T, S>>,
}

impl<T, S> LockAndExecute<T, S> {
    pub(crate) fn new(shard: usize, acquire: Acquire<T>, queued: Vec<QueuedOp<T, S>>) -> Self {
        Self {
            shard,
            acquire,
            queued,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for LockAndExecute<T, S> {
    type Output = T;

    fn kind(&self) -> OpKind {
        OpKind::LockAndExecute
    }

    async fn apply(self, session: &mut S) -> Result<T, Error> {
        let mut parent = match self.acquire {
            Acquire::Fetch { criterion } => session
                .fetch_one::<T>(&criterion, LockMode::WriteNoWait)
                .await?
                .ok_or(Error::NotFound)?,
            Acquire::Persist { entity } => session.persist(entity).await?,
        };

        for op in self.queued {
            let scope = TxnScope::new(&mut *session, self.shard);
            op(scope, &mut parent).await?;
        }

        Ok(parent)
    }
}

/// How a read-only context fetches its parent rows.
pub(crate) enum Getter {
    One {
        criterion: Criterion,
        lock: LockMode,
    },
    Page {
        selection: Selection,
    },
}

/// One registered augmentation: an optional parent predicate plus the
/// child-fetching body.
pub(crate) struct Augmenter<T, S> {
    pub(crate) predicate: Option<Box<dyn Fn(&T) -> bool + Send>>,
    pub(crate) run: AugmentOp<T, S>,
}

/// Fetch parents, optionally retry once after the populator hydrates
/// them, then run each augmenter over each parent in order.
pub struct ReadOnlyExec<T, S> {
    shard: usize,
    getter: Getter,
    key: Option<String>,
    populator: Option<Arc<dyn Populator>>,
    augmenters: Vec<Augmenter<T, S>>,
}

impl<T, S> ReadOnlyExec<T, S> {
    pub(crate) fn new(
        shard: usize,
        getter: Getter,
        key: Option<String>,
        populator: Option<Arc<dyn Populator>>,
        augmenters: Vec<Augmenter<T, S>>,
    ) -> Self {
        Self {
            shard,
            getter,
            key,
            populator,
            augmenters,
        }
    }
}

async fn fetch_parents<T: Entity, S: Session>(
    getter: &Getter,
    session: &mut S,
) -> Result<Vec<T>, Error> {
    match getter {
        Getter::One { criterion, lock } => Ok(session
            .fetch_one::<T>(criterion, *lock)
            .await?
            .into_iter()
            .collect()),
        Getter::Page { selection } => Ok(session.list::<T>(selection, LockMode::None).await?),
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for ReadOnlyExec<T, S> {
    type Output = Vec<T>;

    fn kind(&self) -> OpKind {
        OpKind::ReadOnly
    }

    async fn apply(mut self, session: &mut S) -> Result<Vec<T>, Error> {
        let mut parents = fetch_parents(&self.getter, session).await?;

        // At most one retry, and only when the populator reports that it
        // actually hydrated the parent.
        if parents.is_empty() {
            if let (Some(populator), Some(key)) = (&self.populator, &self.key) {
                if populator.populate(key).await? {
                    debug!("populator hydrated \"{}\", retrying getter", key);
                    parents = fetch_parents(&self.getter, session).await?;
                }
            }
        }

        for augmenter in self.augmenters.iter_mut() {
            for parent in parents.iter_mut() {
                let selected = augmenter
                    .predicate
                    .as_ref()
                    .map(|predicate| predicate(parent))
                    .unwrap_or(true);

                if selected {
                    let scope = TxnScope::new(&mut *session, self.shard);
                    (augmenter.run)(scope, parent).await?;
                }
            }
        }

        Ok(parents)
    }
}
