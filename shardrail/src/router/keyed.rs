//! Lookup-keyed router.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::context::{LockedContext, ReadOnlyContext};
use crate::error::Error;
use crate::fleet::Fleet;
use crate::ops::{self, Operation};
use crate::store::{
    Criterion, Direction, Entity, EntityDescriptor, Filter, LockMode, NamedQuery, Page, Selection,
    SessionGateway, Value,
};
use crate::txn::{self, TxMode};

use super::scatter;
use super::scroll::{self, ScrollPointer, ScrollResult};
use super::ReadSpec;

const ROUTER: &str = "Router";

/// Routes operations on a lookup-keyed entity to the shard its key
/// hashes to, one transaction per call.
///
/// Routers are cheap to clone and safe to share; all mutable state is
/// per-call.
pub struct Router<T: Entity, G: SessionGateway> {
    fleet: Arc<Fleet<G>>,
    descriptor: EntityDescriptor<T>,
}

impl<T: Entity, G: SessionGateway> std::fmt::Debug for Router<T, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish()
    }
}

impl<T: Entity, G: SessionGateway> Clone for Router<T, G> {
    fn clone(&self) -> Self {
        Self {
            fleet: self.fleet.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<T: Entity, G: SessionGateway> Router<T, G> {
    /// The descriptor must declare a string lookup key.
    pub fn new(fleet: Arc<Fleet<G>>, descriptor: EntityDescriptor<T>) -> Result<Self, Error> {
        descriptor.validate_lookup()?;

        Ok(Self { fleet, descriptor })
    }

    pub fn fleet(&self) -> &Arc<Fleet<G>> {
        &self.fleet
    }

    fn key_criterion(&self, key: &str) -> Criterion {
        Criterion::eq(self.descriptor.key_field(), Value::text(key))
    }

    async fn dispatch<O>(
        &self,
        shard: usize,
        command: &'static str,
        mode: TxMode,
        op: O,
    ) -> Result<O::Output, Error>
    where
        O: Operation<G::Session>,
    {
        let record = self.fleet.record::<T>(ROUTER, command, op.kind(), shard);
        txn::execute(
            self.fleet.gateway(shard),
            self.fleet.observers(),
            record,
            mode,
            op,
        )
        .await
    }

    /// Fetch by key, no lock.
    pub async fn get(&self, key: &str) -> Result<Option<T>, Error> {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::GetByKey::<T>::new(
            self.descriptor.key_field(),
            Value::text(key),
            LockMode::None,
        );

        self.dispatch(shard, "get", TxMode::ReadOnly, op).await
    }

    /// Fetch by key with a read-spec mutator that may narrow the
    /// criterion or elevate the lock.
    pub async fn get_with(
        &self,
        key: &str,
        configure: impl FnOnce(&mut ReadSpec),
    ) -> Result<Option<T>, Error> {
        let shard = self.fleet.shard_for(key)?;

        let mut spec = ReadSpec::new(self.key_criterion(key));
        configure(&mut spec);

        let op = ops::Get::<T>::new(spec.criterion, spec.lock);
        self.dispatch(shard, "get", TxMode::ReadOnly, op).await
    }

    /// Fetch many keys: grouped by shard, fetched serially, returned in
    /// shard order. A failure on any shard fails the whole read.
    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<T>, Error> {
        let mut grouped: BTreeMap<usize, Vec<Value>> = BTreeMap::new();
        for key in keys {
            let shard = self.fleet.shard_for(key)?;
            grouped.entry(shard).or_default().push(Value::text(*key));
        }

        let mut rows = Vec::new();
        for (shard, keys) in grouped {
            let selection = Selection::new(Criterion::In(
                self.descriptor.key_field().to_string(),
                keys,
            ));
            let op = ops::Select::<T>::new(selection, LockMode::None);
            rows.extend(
                self.dispatch(shard, "get_many", TxMode::ReadOnly, op)
                    .await?,
            );
        }

        Ok(rows)
    }

    /// Persist; returns the entity with generated fields populated.
    pub async fn save(&self, entity: T) -> Result<T, Error> {
        let key = self.descriptor.key_of(&entity)?;
        let shard = self.fleet.shard_for(&key)?;

        self.dispatch(shard, "save", TxMode::ReadWrite, ops::Save::new(entity))
            .await
    }

    /// Persist, then run a handler on the same session before commit.
    pub async fn save_with<R, F>(&self, entity: T, handler: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut G::Session, &'a T) -> BoxFuture<'a, Result<R, Error>>
            + Send
            + 'static,
    {
        let key = self.descriptor.key_of(&entity)?;
        let shard = self.fleet.shard_for(&key)?;

        let op = ops::SaveThen::new(entity, Box::new(handler));
        self.dispatch(shard, "save", TxMode::ReadWrite, op).await
    }

    /// Fetch without a lock, apply the mutator, write back. `None` from
    /// the mutator commits without a write and reports `false`.
    pub async fn update<F>(&self, key: &str, mutator: F) -> Result<bool, Error>
    where
        F: FnOnce(Option<T>) -> Option<T> + Send + 'static,
    {
        self.update_inner(key, LockMode::None, "update", mutator)
            .await
    }

    /// [`Router::update`] under a no-wait write lock.
    pub async fn update_in_lock<F>(&self, key: &str, mutator: F) -> Result<bool, Error>
    where
        F: FnOnce(Option<T>) -> Option<T> + Send + 'static,
    {
        self.update_inner(key, LockMode::WriteNoWait, "update_in_lock", mutator)
            .await
    }

    async fn update_inner<F>(
        &self,
        key: &str,
        lock: LockMode,
        command: &'static str,
        mutator: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(Option<T>) -> Option<T> + Send + 'static,
    {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::GetAndUpdate::new(self.key_criterion(key), lock, Box::new(mutator));

        self.dispatch(shard, command, TxMode::ReadWrite, op).await
    }

    /// Run a named update statement on the key's shard.
    pub async fn update_by_named_query(
        &self,
        key: &str,
        query: NamedQuery,
    ) -> Result<u64, Error> {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::UpdateByNamedQuery::new(query);

        self.dispatch(shard, "update_by_named_query", TxMode::ReadWrite, op)
            .await
    }

    /// Delete under a no-wait write lock. `false` when nothing matched.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::DeleteByKey::<T>::new(self.descriptor.key_field(), Value::text(key));

        self.dispatch(shard, "delete", TxMode::ReadWrite, op).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, Error> {
        Ok(self.get(key).await?.is_some())
    }

    /// Fetch under a no-wait write lock; generate and persist when
    /// absent, mutate and write back when present. The update path
    /// refetches and returns the stored row.
    pub async fn create_or_update<M, C>(
        &self,
        key: &str,
        mutator: M,
        generator: C,
    ) -> Result<T, Error>
    where
        M: FnOnce(T) -> Option<T> + Send + 'static,
        C: FnOnce() -> T + Send + 'static,
    {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::CreateOrUpdate::new(
            self.key_criterion(key),
            Box::new(mutator),
            Box::new(generator),
        );

        self.dispatch(shard, "create_or_update", TxMode::ReadWrite, op)
            .await
    }

    /// Hand the key's shard session to a handler inside a read
    /// transaction.
    pub async fn run_in_session<R, F>(&self, key: &str, handler: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut G::Session) -> BoxFuture<'a, Result<R, Error>> + Send + 'static,
    {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::RunInSession::new(Box::new(handler));

        self.dispatch(shard, "run_in_session", TxMode::ReadOnly, op)
            .await
    }

    /// Hand the session and the key's criterion to a handler.
    pub async fn run_with_criteria<R, F>(&self, key: &str, handler: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut G::Session, Criterion) -> BoxFuture<'a, Result<R, Error>>
            + Send
            + 'static,
    {
        let shard = self.fleet.shard_for(key)?;
        let op = ops::RunWithCriteria::new(self.key_criterion(key), Box::new(handler));

        self.dispatch(shard, "run_with_criteria", TxMode::ReadOnly, op)
            .await
    }

    /// Locked write context whose parent is fetched under a no-wait
    /// write lock.
    pub fn lock_and_get(&self, key: &str) -> Result<LockedContext<T, G>, Error> {
        let shard = self.fleet.shard_for(key)?;

        Ok(LockedContext::fetch(
            self.fleet.clone(),
            shard,
            self.key_criterion(key),
        ))
    }

    /// Locked write context whose parent is persisted on execution.
    pub fn save_and_get(&self, entity: T) -> Result<LockedContext<T, G>, Error> {
        let key = self.descriptor.key_of(&entity)?;
        let shard = self.fleet.shard_for(&key)?;

        Ok(LockedContext::persist(self.fleet.clone(), shard, entity))
    }

    /// Read-only context over the key's parent row.
    pub fn read_only(&self, key: &str) -> Result<ReadOnlyContext<T, G>, Error> {
        self.read_only_with(key, |_| {})
    }

    /// Read-only context with a read-spec mutator applied to the parent
    /// fetch.
    pub fn read_only_with(
        &self,
        key: &str,
        configure: impl FnOnce(&mut ReadSpec),
    ) -> Result<ReadOnlyContext<T, G>, Error> {
        let shard = self.fleet.shard_for(key)?;

        let mut spec = ReadSpec::new(self.key_criterion(key));
        configure(&mut spec);

        Ok(ReadOnlyContext::single(
            self.fleet.clone(),
            shard,
            key.to_string(),
            spec.criterion,
            spec.lock,
        ))
    }

    /// Read-only context over a page of parents on the key's shard.
    pub fn read_only_page(
        &self,
        key: &str,
        filter: impl Into<Filter>,
        page: Option<Page>,
    ) -> Result<ReadOnlyContext<T, G>, Error> {
        let shard = self.fleet.shard_for(key)?;

        let mut selection = filter.into().resolve();
        selection.page = page;

        Ok(ReadOnlyContext::page(self.fleet.clone(), shard, selection))
    }

    /// Run the filter on every shard serially and concatenate in shard
    /// order.
    pub async fn scatter_gather(&self, filter: impl Into<Filter>) -> Result<Vec<T>, Error> {
        scatter::list::<T, G>(&self.fleet, ROUTER, filter.into()).await
    }

    /// Per-shard counts, aligned to shard index.
    pub async fn count(&self, criterion: Criterion) -> Result<Vec<u64>, Error> {
        scatter::counts::<T, G>(&self.fleet, ROUTER, criterion.into()).await
    }

    /// Per-shard results keyed by shard index, transformed by the
    /// caller's translator.
    pub async fn scatter_map<R, F>(
        &self,
        filter: impl Into<Filter>,
        translator: F,
    ) -> Result<IndexMap<usize, R>, Error>
    where
        F: Fn(usize, Vec<T>) -> R,
    {
        scatter::map::<T, G, R, F>(&self.fleet, ROUTER, filter.into(), translator).await
    }

    /// One ascending scroll step ordered by `sort_field`. `None` starts
    /// a fresh pointer at offset zero on every shard.
    pub async fn scroll_down(
        &self,
        criterion: Criterion,
        pointer: Option<ScrollPointer>,
        page_size: usize,
        sort_field: &str,
    ) -> Result<ScrollResult<T>, Error> {
        scroll::step::<T, G>(
            &self.fleet,
            ROUTER,
            "scroll_down",
            criterion,
            pointer,
            page_size,
            sort_field,
            Direction::Ascending,
        )
        .await
    }

    /// One descending scroll step ordered by `sort_field`.
    pub async fn scroll_up(
        &self,
        criterion: Criterion,
        pointer: Option<ScrollPointer>,
        page_size: usize,
        sort_field: &str,
    ) -> Result<ScrollResult<T>, Error> {
        scroll::step::<T, G>(
            &self.fleet,
            ROUTER,
            "scroll_up",
            criterion,
            pointer,
            page_size,
            sort_field,
            Direction::Descending,
        )
        .await
    }
}
