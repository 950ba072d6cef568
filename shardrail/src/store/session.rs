//! Session and gateway contracts implemented by persistence engines.

use async_trait::async_trait;

use super::criterion::Criterion;
use super::entity::Entity;
use super::lock::LockMode;
use super::named::NamedQuery;
use super::query::Selection;
use super::value::Value;
use super::Error;

/// Per-shard handle that opens sessions against one database.
#[async_trait]
pub trait SessionGateway: Send + Sync + 'static {
    type Session: Session;

    /// Open a new session. The caller owns its transaction lifecycle.
    async fn session(&self) -> Result<Self::Session, Error>;

    /// Name of the shard this gateway fronts, for observability.
    fn shard_name(&self) -> &str;
}

/// One open session against one shard.
///
/// A session is used by a single task at a time. Writes require an open
/// transaction; engines reject them with [`Error::NoTransaction`] otherwise.
#[async_trait]
pub trait Session: Send {
    type Scroll<T: Entity>: ScrollCursor<T> + Send;

    async fn begin(&mut self, read_only: bool) -> Result<(), Error>;

    async fn commit(&mut self) -> Result<(), Error>;

    async fn rollback(&mut self) -> Result<(), Error>;

    /// Release the session. Open transactions are rolled back.
    async fn close(&mut self) -> Result<(), Error>;

    fn in_transaction(&self) -> bool;

    /// The single matching row, or none. More than one match is
    /// [`Error::NonUnique`].
    async fn fetch_one<T: Entity>(
        &mut self,
        criterion: &Criterion,
        lock: LockMode,
    ) -> Result<Option<T>, Error>;

    /// Convenience over [`Session::fetch_one`] for a single field equality.
    async fn fetch_one_by_field<T: Entity>(
        &mut self,
        field: &str,
        value: Value,
        lock: LockMode,
    ) -> Result<Option<T>, Error> {
        self.fetch_one(&Criterion::Eq(field.into(), value), lock)
            .await
    }

    /// Ordered list of matching rows; pagination applies when the
    /// selection carries a page.
    async fn list<T: Entity>(
        &mut self,
        selection: &Selection,
        lock: LockMode,
    ) -> Result<Vec<T>, Error>;

    /// Forward-only cursor over matching rows. Usable only inside the
    /// open transaction; drop it before committing.
    async fn scroll<T: Entity>(&mut self, selection: &Selection) -> Result<Self::Scroll<T>, Error>;

    async fn count<T: Entity>(&mut self, selection: &Selection) -> Result<u64, Error>;

    /// Insert the entity and return it with generated fields populated.
    async fn persist<T: Entity>(&mut self, entity: T) -> Result<T, Error>;

    /// Detach `old` from the session, then attach `new` as the
    /// replacement row. The detach step is part of the contract:
    /// attaching a modified instance without it is a no-op in engines
    /// that track instances by identity.
    async fn replace<T: Entity>(&mut self, old: T, new: T) -> Result<T, Error>;

    async fn delete<T: Entity>(&mut self, entity: &T) -> Result<(), Error>;

    /// Run a named update statement; returns the affected-row count.
    async fn execute_named(&mut self, query: &NamedQuery) -> Result<u64, Error>;
}

/// Lazy, finite, non-restartable sequence of entities.
#[async_trait]
pub trait ScrollCursor<T: Entity>: Send {
    async fn next(&mut self) -> Result<Option<T>, Error>;
}
