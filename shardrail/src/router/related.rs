//! Parent-keyed router over child entities identified by their own id.
//!
//! Routing always uses the parent key, so children live on their
//! parent's shard. Every operation also has an `*_in` variant that joins
//! the shared transaction of a locked or read-only context instead of
//! opening its own.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::context::ReadOnlyContext;
use crate::error::Error;
use crate::fleet::Fleet;
use crate::ops::{self, Operation};
use crate::store::{
    Criterion, Entity, EntityDescriptor, Filter, LockMode, NamedQuery, Page, Selection,
    SessionGateway, Value,
};
use crate::txn::{self, TxMode, TxnScope};

use super::scatter;

const ROUTER: &str = "RelatedRouter";

/// Router for child entities co-located with their parent.
pub struct RelatedRouter<C: Entity, G: SessionGateway> {
    fleet: Arc<Fleet<G>>,
    descriptor: EntityDescriptor<C>,
}

impl<C: Entity, G: SessionGateway> Clone for RelatedRouter<C, G> {
    fn clone(&self) -> Self {
        Self {
            fleet: self.fleet.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<C: Entity, G: SessionGateway> RelatedRouter<C, G> {
    pub fn new(fleet: Arc<Fleet<G>>, descriptor: EntityDescriptor<C>) -> Result<Self, Error> {
        descriptor.validate()?;

        Ok(Self { fleet, descriptor })
    }

    pub fn fleet(&self) -> &Arc<Fleet<G>> {
        &self.fleet
    }

    fn id_criterion(&self, id: Value) -> Criterion {
        Criterion::Eq(self.descriptor.key_field().to_string(), id)
    }

    async fn dispatch<O>(
        &self,
        parent_key: &str,
        command: &'static str,
        mode: TxMode,
        op: O,
    ) -> Result<O::Output, Error>
    where
        O: Operation<G::Session>,
    {
        let shard = self.fleet.shard_for(parent_key)?;
        let record = self.fleet.record::<C>(ROUTER, command, op.kind(), shard);

        txn::execute(
            self.fleet.gateway(shard),
            self.fleet.observers(),
            record,
            mode,
            op,
        )
        .await
    }

    async fn dispatch_nested<O>(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        command: &'static str,
        op: O,
    ) -> Result<O::Output, Error>
    where
        O: Operation<G::Session>,
    {
        let record = self.fleet.record::<C>(ROUTER, command, op.kind(), scope.shard);
        txn::execute_nested(&mut *scope.session, self.fleet.observers(), record, op).await
    }

    /// Fetch a child by its own id on the parent's shard.
    pub async fn get(&self, parent_key: &str, id: impl Into<Value>) -> Result<Option<C>, Error> {
        let op = ops::Get::<C>::new(self.id_criterion(id.into()), LockMode::None);
        self.dispatch(parent_key, "get", TxMode::ReadOnly, op).await
    }

    /// Ordered, optionally paginated list on the parent's shard.
    pub async fn select(
        &self,
        parent_key: &str,
        filter: impl Into<Filter>,
        page: Option<Page>,
    ) -> Result<Vec<C>, Error> {
        let mut selection = filter.into().resolve();
        selection.page = page;

        let op = ops::Select::<C>::new(selection, LockMode::None);
        self.dispatch(parent_key, "select", TxMode::ReadOnly, op)
            .await
    }

    /// [`RelatedRouter::select`] with a post-transform applied inside
    /// the transaction.
    pub async fn select_map<R, F>(
        &self,
        parent_key: &str,
        filter: impl Into<Filter>,
        page: Option<Page>,
        transform: F,
    ) -> Result<R, Error>
    where
        R: Send + 'static,
        F: FnOnce(Vec<C>) -> R + Send + 'static,
    {
        let mut selection = filter.into().resolve();
        selection.page = page;

        let op = ops::Select::<C, R>::mapped(selection, LockMode::None, transform);
        self.dispatch(parent_key, "select", TxMode::ReadOnly, op)
            .await
    }

    pub async fn count(&self, parent_key: &str, filter: impl Into<Filter>) -> Result<u64, Error> {
        let op = ops::Count::<C>::new(filter.into().resolve());
        self.dispatch(parent_key, "count", TxMode::ReadOnly, op)
            .await
    }

    pub async fn exists(&self, parent_key: &str, id: impl Into<Value>) -> Result<bool, Error> {
        let op = ops::Count::<C>::new(Selection::new(self.id_criterion(id.into())));
        Ok(self
            .dispatch(parent_key, "exists", TxMode::ReadOnly, op)
            .await?
            > 0)
    }

    pub async fn save(&self, parent_key: &str, entity: C) -> Result<C, Error> {
        self.dispatch(parent_key, "save", TxMode::ReadWrite, ops::Save::new(entity))
            .await
    }

    /// Persist, then run a handler on the same session before commit.
    pub async fn save_with<R, F>(&self, parent_key: &str, entity: C, handler: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut G::Session, &'a C) -> BoxFuture<'a, Result<R, Error>>
            + Send
            + 'static,
    {
        let op = ops::SaveThen::new(entity, Box::new(handler));
        self.dispatch(parent_key, "save", TxMode::ReadWrite, op)
            .await
    }

    pub async fn save_all(&self, parent_key: &str, entities: Vec<C>) -> Result<bool, Error> {
        self.dispatch(
            parent_key,
            "save_all",
            TxMode::ReadWrite,
            ops::SaveAll::new(entities),
        )
        .await
    }

    /// Fetch the child by id, mutate, write back.
    pub async fn update<F>(
        &self,
        parent_key: &str,
        id: impl Into<Value>,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        let op = ops::GetAndUpdate::new(
            self.id_criterion(id.into()),
            LockMode::None,
            Box::new(mutator),
        );
        self.dispatch(parent_key, "update", TxMode::ReadWrite, op)
            .await
    }

    /// [`RelatedRouter::update`] under a no-wait write lock.
    pub async fn update_in_lock<F>(
        &self,
        parent_key: &str,
        id: impl Into<Value>,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        let op = ops::GetAndUpdate::new(
            self.id_criterion(id.into()),
            LockMode::WriteNoWait,
            Box::new(mutator),
        );
        self.dispatch(parent_key, "update_in_lock", TxMode::ReadWrite, op)
            .await
    }

    /// Update the first row matching a criterion inside an optional
    /// range window.
    pub async fn update_matching<F>(
        &self,
        parent_key: &str,
        criterion: Criterion,
        page: Option<Page>,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        let op = ops::Update::new(criterion, page, Box::new(mutator));
        self.dispatch(parent_key, "update_matching", TxMode::ReadWrite, op)
            .await
    }

    /// Update the first row of a selection.
    pub async fn update_first<F>(
        &self,
        parent_key: &str,
        filter: impl Into<Filter>,
        page: Option<Page>,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        let mut selection = filter.into().resolve();
        selection.page = page;

        let op = ops::SelectAndUpdate::new(selection, Box::new(mutator));
        self.dispatch(parent_key, "update_first", TxMode::ReadWrite, op)
            .await
    }

    /// Mutate every row in the `[start, start + rows)` window. A `None`
    /// from the mutator aborts the remaining rows and reports `false`;
    /// rows already written in this transaction still commit.
    pub async fn update_all<F>(
        &self,
        parent_key: &str,
        start: u64,
        rows: u64,
        criterion: Criterion,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnMut(C) -> Option<C> + Send + 'static,
    {
        let selection = Selection::new(criterion).with_page(Page::new(start, rows)?);
        let op = ops::UpdateAll::new(selection, Box::new(mutator));

        self.dispatch(parent_key, "update_all", TxMode::ReadWrite, op)
            .await
    }

    pub async fn update_by_named_query(
        &self,
        parent_key: &str,
        query: NamedQuery,
    ) -> Result<u64, Error> {
        let op = ops::UpdateByNamedQuery::new(query);
        self.dispatch(parent_key, "update_by_named_query", TxMode::ReadWrite, op)
            .await
    }

    /// Fetch one child by criterion under a no-wait write lock; generate
    /// and persist when absent, mutate and write back when present.
    pub async fn create_or_update<M, F>(
        &self,
        parent_key: &str,
        criterion: Criterion,
        mutator: M,
        generator: F,
    ) -> Result<C, Error>
    where
        M: FnOnce(C) -> Option<C> + Send + 'static,
        F: FnOnce() -> C + Send + 'static,
    {
        let op = ops::CreateOrUpdate::new(criterion, Box::new(mutator), Box::new(generator));
        self.dispatch(parent_key, "create_or_update", TxMode::ReadWrite, op)
            .await
    }

    pub async fn delete(&self, parent_key: &str, id: impl Into<Value>) -> Result<bool, Error> {
        let op = ops::DeleteByKey::<C>::new(self.descriptor.key_field(), id.into());
        self.dispatch(parent_key, "delete", TxMode::ReadWrite, op)
            .await
    }

    /// Hand the parent's shard session to a handler inside a read
    /// transaction.
    pub async fn run_in_session<R, F>(&self, parent_key: &str, handler: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut G::Session) -> BoxFuture<'a, Result<R, Error>> + Send + 'static,
    {
        let op = ops::RunInSession::new(Box::new(handler));
        self.dispatch(parent_key, "run_in_session", TxMode::ReadOnly, op)
            .await
    }

    /// Run the filter on every shard serially, ignoring parent keys.
    pub async fn scatter_gather(&self, filter: impl Into<Filter>) -> Result<Vec<C>, Error> {
        scatter::list::<C, G>(&self.fleet, ROUTER, filter.into()).await
    }

    /// Per-shard counts, aligned to shard index.
    pub async fn scatter_count(&self, filter: impl Into<Filter>) -> Result<Vec<u64>, Error> {
        scatter::counts::<C, G>(&self.fleet, ROUTER, filter.into()).await
    }

    /// Per-shard results keyed by shard index.
    pub async fn scatter_map<R, F>(
        &self,
        filter: impl Into<Filter>,
        translator: F,
    ) -> Result<IndexMap<usize, R>, Error>
    where
        F: Fn(usize, Vec<C>) -> R,
    {
        scatter::map::<C, G, R, F>(&self.fleet, ROUTER, filter.into(), translator).await
    }

    /// Read-only context over a page of children on the parent's shard.
    pub fn read_only_page(
        &self,
        parent_key: &str,
        filter: impl Into<Filter>,
        page: Option<Page>,
    ) -> Result<ReadOnlyContext<C, G>, Error> {
        let shard = self.fleet.shard_for(parent_key)?;

        let mut selection = filter.into().resolve();
        selection.page = page;

        Ok(ReadOnlyContext::page(self.fleet.clone(), shard, selection))
    }

    // Shared-transaction variants. Each reuses the context's shard and
    // open session; the runner stays in nested mode.

    pub async fn get_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        id: impl Into<Value>,
    ) -> Result<Option<C>, Error> {
        let op = ops::Get::<C>::new(self.id_criterion(id.into()), LockMode::None);
        self.dispatch_nested(scope, "get", op).await
    }

    pub async fn select_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        filter: impl Into<Filter>,
        page: Option<Page>,
    ) -> Result<Vec<C>, Error> {
        let mut selection = filter.into().resolve();
        selection.page = page;

        self.select_scoped(scope, selection).await
    }

    pub(crate) async fn select_scoped(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        selection: Selection,
    ) -> Result<Vec<C>, Error> {
        let op = ops::Select::<C>::new(selection, LockMode::None);
        self.dispatch_nested(scope, "select", op).await
    }

    pub async fn count_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        filter: impl Into<Filter>,
    ) -> Result<u64, Error> {
        let op = ops::Count::<C>::new(filter.into().resolve());
        self.dispatch_nested(scope, "count", op).await
    }

    pub async fn save_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        entity: C,
    ) -> Result<C, Error> {
        self.dispatch_nested(scope, "save", ops::Save::new(entity))
            .await
    }

    pub async fn save_all_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        entities: Vec<C>,
    ) -> Result<bool, Error> {
        self.dispatch_nested(scope, "save_all", ops::SaveAll::new(entities))
            .await
    }

    pub async fn update_in<F>(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        id: impl Into<Value>,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        self.update_matching_in(scope, self.id_criterion(id.into()), mutator)
            .await
    }

    pub async fn update_matching_in<F>(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        criterion: Criterion,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<C>) -> Option<C> + Send + 'static,
    {
        let op = ops::GetAndUpdate::new(criterion, LockMode::None, Box::new(mutator));
        self.dispatch_nested(scope, "update", op).await
    }

    pub async fn create_or_update_in<M, F>(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        criterion: Criterion,
        mutator: M,
        generator: F,
    ) -> Result<bool, Error>
    where
        M: FnOnce(C) -> Option<C> + Send + 'static,
        F: FnOnce() -> C + Send + 'static,
    {
        let op = ops::CreateOrUpdateInLockedContext::new(
            criterion,
            Box::new(mutator),
            Box::new(generator),
        );
        self.dispatch_nested(scope, "create_or_update", op).await
    }

    pub async fn update_by_named_query_in(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        query: NamedQuery,
    ) -> Result<u64, Error> {
        let op = ops::UpdateByNamedQuery::new(query);
        self.dispatch_nested(scope, "update_by_named_query", op).await
    }

    /// Walk a forward-only cursor inside the shared transaction,
    /// mutating each row. Stops when the cursor is exhausted or the
    /// continue-predicate declines; a `None` from the mutator terminates
    /// immediately with `false`.
    pub async fn update_where<M, K>(
        &self,
        scope: &mut TxnScope<'_, G::Session>,
        filter: impl Into<Filter>,
        mutator: M,
        keep_going: K,
    ) -> Result<bool, Error>
    where
        M: FnMut(C) -> Option<C> + Send + 'static,
        K: FnMut(&C) -> bool + Send + 'static,
    {
        let op = ops::UpdateWithScroll::new(
            filter.into().resolve(),
            Box::new(mutator),
            Box::new(keep_going),
        );
        self.dispatch_nested(scope, "update_where", op).await
    }
}
