//! Composable write context pinned to one shard.
//!
//! Composition queues closures; nothing touches the database until
//! `execute`, which opens one write transaction, produces the parent
//! (fetched under a no-wait write lock, or persisted), runs the queued
//! operations in insertion order, and commits. Any failure rolls the
//! whole transaction back.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Error;
use crate::fleet::Fleet;
use crate::ops::{self, Acquire, OpKind, QueuedOp};
use crate::router::RelatedRouter;
use crate::store::{Criterion, Entity, NamedQuery, Session, SessionGateway};
use crate::txn::{self, TxMode, TxnScope};

const CONTEXT: &str = "LockedContext";

pub struct LockedContext<T: Entity, G: SessionGateway> {
    fleet: Arc<Fleet<G>>,
    shard: usize,
    acquire: Acquire<T>,
    queued: Vec<QueuedOp<T, G::Session>>,
}

impl<T: Entity, G: SessionGateway> LockedContext<T, G> {
    pub(crate) fn fetch(fleet: Arc<Fleet<G>>, shard: usize, criterion: Criterion) -> Self {
        Self {
            fleet,
            shard,
            acquire: Acquire::Fetch { criterion },
            queued: Vec::new(),
        }
    }

    pub(crate) fn persist(fleet: Arc<Fleet<G>>, shard: usize, entity: T) -> Self {
        Self {
            fleet,
            shard,
            acquire: Acquire::Persist { entity },
            queued: Vec::new(),
        }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    /// Mutate the parent; the change is written back through the shared
    /// session.
    pub fn mutate(mut self, mutator: impl FnOnce(&mut T) + Send + 'static) -> Self {
        self.queued.push(Box::new(move |mut scope, parent| {
            let old = parent.clone();
            mutator(parent);
            let new = parent.clone();

            Box::pin(async move {
                scope.session().replace(old, new).await?;
                Ok(())
            })
        }));
        self
    }

    /// Fail the context with a constraint violation when the predicate
    /// rejects the parent.
    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.filter_with(predicate, "parent rejected by filter predicate")
    }

    pub fn filter_with(
        mut self,
        predicate: impl Fn(&T) -> bool + Send + 'static,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();

        self.queued.push(Box::new(move |_scope, parent| {
            let accepted = predicate(parent);

            Box::pin(async move {
                if accepted {
                    Ok(())
                } else {
                    Err(Error::ConstraintViolation(message))
                }
            })
        }));
        self
    }

    /// Save a child derived from the parent.
    pub fn save<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        child: impl FnOnce(&T) -> C + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, parent| {
            let child = child(parent);

            Box::pin(async move {
                related.save_in(&mut scope, child).await?;
                Ok(())
            })
        }));
        self
    }

    /// Save a batch of children derived from the parent.
    pub fn save_all<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        children: impl FnOnce(&T) -> Vec<C> + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, parent| {
            let children = children(parent);

            Box::pin(async move {
                related.save_all_in(&mut scope, children).await?;
                Ok(())
            })
        }));
        self
    }

    /// Update the child matching a criterion.
    pub fn update<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        criterion: Criterion,
        mutator: impl FnOnce(Option<C>) -> Option<C> + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, _parent| {
            Box::pin(async move {
                related
                    .update_matching_in(&mut scope, criterion, mutator)
                    .await?;
                Ok(())
            })
        }));
        self
    }

    /// Create or update the child matching a criterion; the generator
    /// sees the parent.
    pub fn create_or_update<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        criterion: Criterion,
        mutator: impl FnOnce(C) -> Option<C> + Send + 'static,
        generator: impl FnOnce(&T) -> C + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, parent| {
            let snapshot = parent.clone();

            Box::pin(async move {
                related
                    .create_or_update_in(&mut scope, criterion, mutator, move || {
                        generator(&snapshot)
                    })
                    .await?;
                Ok(())
            })
        }));
        self
    }

    /// Run a named update statement built from the parent.
    pub fn update_by_named_query<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        query: impl FnOnce(&T) -> NamedQuery + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, parent| {
            let query = query(parent);

            Box::pin(async move {
                related.update_by_named_query_in(&mut scope, query).await?;
                Ok(())
            })
        }));
        self
    }

    /// Walk a child cursor inside the shared transaction.
    pub fn update_where<C: Entity>(
        mut self,
        related: &RelatedRouter<C, G>,
        criterion: Criterion,
        mutator: impl FnMut(C) -> Option<C> + Send + 'static,
        keep_going: impl FnMut(&C) -> bool + Send + 'static,
    ) -> Self {
        let related = related.clone();

        self.queued.push(Box::new(move |mut scope, _parent| {
            Box::pin(async move {
                related
                    .update_where(&mut scope, criterion, mutator, keep_going)
                    .await?;
                Ok(())
            })
        }));
        self
    }

    /// Queue an arbitrary operation against the shared transaction.
    pub fn then(
        mut self,
        op: impl for<'a> FnOnce(TxnScope<'a, G::Session>, &'a mut T) -> BoxFuture<'a, Result<(), Error>>
            + Send
            + 'static,
    ) -> Self {
        self.queued.push(Box::new(op));
        self
    }

    /// Run the context: one transaction, parent acquisition, queued
    /// operations in order, commit. Returns the parent.
    pub async fn execute(self) -> Result<T, Error> {
        let record =
            self.fleet
                .record::<T>(CONTEXT, "execute", OpKind::LockAndExecute, self.shard);
        let op = ops::LockAndExecute::new(self.shard, self.acquire, self.queued);

        txn::execute(
            self.fleet.gateway(self.shard),
            self.fleet.observers(),
            record,
            TxMode::ReadWrite,
            op,
        )
        .await
    }
}
