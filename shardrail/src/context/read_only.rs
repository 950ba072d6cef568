//! Read pipeline pinned to one shard.
//!
//! Fetches a parent (single row or page), then augments it with child
//! rows drawn from related routers on the same session. The optional
//! populator is the hook for on-demand hydration from a cold tier: when
//! the getter comes back empty and the populator reports it loaded the
//! parent, the getter runs once more.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Error;
use crate::fleet::Fleet;
use crate::ops::{self, Augmenter, Getter, OpKind};
use crate::router::RelatedRouter;
use crate::store::{Criterion, Entity, LockMode, Selection, SessionGateway};
use crate::txn::{self, TxMode};

use super::association::QueryFilterSpec;

const CONTEXT: &str = "ReadOnlyContext";

/// Hydrates an absent parent from a cold tier.
#[async_trait]
pub trait Populator: Send + Sync {
    /// Returns true when the parent was loaded and the getter should
    /// run again.
    async fn populate(&self, key: &str) -> Result<bool, Error>;
}

pub struct ReadOnlyContext<T: Entity, G: SessionGateway> {
    fleet: Arc<Fleet<G>>,
    shard: usize,
    getter: Getter,
    key: Option<String>,
    populator: Option<Arc<dyn Populator>>,
    augmenters: Vec<Augmenter<T, G::Session>>,
    skip_transaction: bool,
}

impl<T: Entity, G: SessionGateway> ReadOnlyContext<T, G> {
    pub(crate) fn single(
        fleet: Arc<Fleet<G>>,
        shard: usize,
        key: String,
        criterion: Criterion,
        lock: LockMode,
    ) -> Self {
        let skip_transaction = fleet.config().read_only.skip_transaction;

        Self {
            fleet,
            shard,
            getter: Getter::One { criterion, lock },
            key: Some(key),
            populator: None,
            augmenters: Vec::new(),
            skip_transaction,
        }
    }

    pub(crate) fn page(fleet: Arc<Fleet<G>>, shard: usize, selection: Selection) -> Self {
        let skip_transaction = fleet.config().read_only.skip_transaction;

        Self {
            fleet,
            shard,
            getter: Getter::Page { selection },
            key: None,
            populator: None,
            augmenters: Vec::new(),
            skip_transaction,
        }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    /// Hydration hook for single-key contexts.
    pub fn populator(mut self, populator: Arc<dyn Populator>) -> Self {
        self.populator = Some(populator);
        self
    }

    /// Override the fleet-level skip-transaction setting.
    pub fn skip_transaction(mut self, skip: bool) -> Self {
        self.skip_transaction = skip;
        self
    }

    /// Augment every parent with the children selected by the filter
    /// spec.
    pub fn augment<C: Entity>(
        self,
        related: &RelatedRouter<C, G>,
        spec: impl Into<QueryFilterSpec>,
        consumer: impl FnMut(&mut T, Vec<C>) + Send + 'static,
    ) -> Self {
        self.push_augmenter(None, related, spec.into(), consumer)
    }

    /// Augment only the parents the predicate accepts.
    pub fn augment_when<C: Entity>(
        self,
        predicate: impl Fn(&T) -> bool + Send + 'static,
        related: &RelatedRouter<C, G>,
        spec: impl Into<QueryFilterSpec>,
        consumer: impl FnMut(&mut T, Vec<C>) + Send + 'static,
    ) -> Self {
        self.push_augmenter(Some(Box::new(predicate)), related, spec.into(), consumer)
    }

    fn push_augmenter<C: Entity>(
        mut self,
        predicate: Option<Box<dyn Fn(&T) -> bool + Send>>,
        related: &RelatedRouter<C, G>,
        spec: QueryFilterSpec,
        consumer: impl FnMut(&mut T, Vec<C>) + Send + 'static,
    ) -> Self {
        let related = related.clone();
        let consumer = Arc::new(Mutex::new(consumer));

        let run: ops::AugmentOp<T, G::Session> = Box::new(move |mut scope, parent| {
            let resolved = spec.resolve(&*parent);
            let related = related.clone();
            let consumer = consumer.clone();

            Box::pin(async move {
                let selection = resolved?;
                let children = related.select_scoped(&mut scope, selection).await?;
                (*consumer.lock())(parent, children);
                Ok(())
            })
        });

        self.augmenters.push(Augmenter { predicate, run });
        self
    }

    /// Run the pipeline; returns the augmented parents.
    pub async fn execute(self) -> Result<Vec<T>, Error> {
        let mode = if self.skip_transaction {
            TxMode::Skip
        } else {
            TxMode::ReadOnly
        };

        let record = self
            .fleet
            .record::<T>(CONTEXT, "execute", OpKind::ReadOnly, self.shard);
        let op = ops::ReadOnlyExec::new(
            self.shard,
            self.getter,
            self.key,
            self.populator,
            self.augmenters,
        );

        txn::execute(
            self.fleet.gateway(self.shard),
            self.fleet.observers(),
            record,
            mode,
            op,
        )
        .await
    }

    /// Run the pipeline for a single-parent context.
    pub async fn execute_one(self) -> Result<Option<T>, Error> {
        Ok(self.execute().await?.into_iter().next())
    }
}
