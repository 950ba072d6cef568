//! Read-side operation contexts.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::Error;
use crate::store::{Criterion, Entity, LockMode, Selection, Session, Value};

use super::{CriteriaHandler, OpKind, Operation, SessionHandler};

/// Count rows matching a selection.
pub struct Count<T> {
    selection: Selection,
    _entity: PhantomData<T>,
}

impl<T> Count<T> {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for Count<T> {
    type Output = u64;

    fn kind(&self) -> OpKind {
        OpKind::Count
    }

    async fn apply(self, session: &mut S) -> Result<u64, Error> {
        Ok(session.count::<T>(&self.selection).await?)
    }
}

/// Unique fetch by criterion with an optional post-transform.
pub struct Get<T> {
    criterion: Criterion,
    lock: LockMode,
    transform: Option<Box<dyn FnOnce(T) -> T + Send>>,
}

impl<T> Get<T> {
    pub fn new(criterion: Criterion, lock: LockMode) -> Self {
        Self {
            criterion,
            lock,
            transform: None,
        }
    }

    pub fn transformed(mut self, transform: impl FnOnce(T) -> T + Send + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for Get<T> {
    type Output = Option<T>;

    fn kind(&self) -> OpKind {
        OpKind::Get
    }

    async fn apply(self, session: &mut S) -> Result<Option<T>, Error> {
        let row = session.fetch_one::<T>(&self.criterion, self.lock).await?;

        Ok(match (row, self.transform) {
            (Some(row), Some(transform)) => Some(transform(row)),
            (row, _) => row,
        })
    }
}

/// Unique fetch by key field.
pub struct GetByKey<T> {
    field: String,
    key: Value,
    lock: LockMode,
    transform: Option<Box<dyn FnOnce(T) -> T + Send>>,
}

impl<T> GetByKey<T> {
    pub fn new(field: impl Into<String>, key: Value, lock: LockMode) -> Self {
        Self {
            field: field.into(),
            key,
            lock,
            transform: None,
        }
    }

    pub fn transformed(mut self, transform: impl FnOnce(T) -> T + Send + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for GetByKey<T> {
    type Output = Option<T>;

    fn kind(&self) -> OpKind {
        OpKind::GetByKey
    }

    async fn apply(self, session: &mut S) -> Result<Option<T>, Error> {
        let row = session
            .fetch_one_by_field::<T>(&self.field, self.key, self.lock)
            .await?;

        Ok(match (row, self.transform) {
            (Some(row), Some(transform)) => Some(transform(row)),
            (row, _) => row,
        })
    }
}

/// Ordered list fetch with a post-transform over the whole result.
pub struct Select<T, R = Vec<T>> {
    selection: Selection,
    lock: LockMode,
    transform: Box<dyn FnOnce(Vec<T>) -> R + Send>,
}

impl<T: Entity> Select<T> {
    pub fn new(selection: Selection, lock: LockMode) -> Select<T, Vec<T>> {
        Select {
            selection,
            lock,
            transform: Box::new(|rows| rows),
        }
    }
}

impl<T: Entity, R> Select<T, R> {
    pub fn mapped(
        selection: Selection,
        lock: LockMode,
        transform: impl FnOnce(Vec<T>) -> R + Send + 'static,
    ) -> Self {
        Self {
            selection,
            lock,
            transform: Box::new(transform),
        }
    }
}

#[async_trait]
impl<T: Entity, R: Send, S: Session> Operation<S> for Select<T, R> {
    type Output = R;

    fn kind(&self) -> OpKind {
        OpKind::Select
    }

    async fn apply(self, session: &mut S) -> Result<R, Error> {
        let rows = session.list::<T>(&self.selection, self.lock).await?;
        Ok((self.transform)(rows))
    }
}

/// Hand the open session to a caller-supplied handler.
pub struct RunInSession<S, R> {
    handler: SessionHandler<S, R>,
}

impl<S, R> RunInSession<S, R> {
    pub fn new(handler: SessionHandler<S, R>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<S: Session, R: Send> Operation<S> for RunInSession<S, R> {
    type Output = R;

    fn kind(&self) -> OpKind {
        OpKind::RunInSession
    }

    async fn apply(self, session: &mut S) -> Result<R, Error> {
        (self.handler)(session).await
    }
}

/// Hand the open session and a prepared criterion to a handler.
pub struct RunWithCriteria<S, R> {
    criterion: Criterion,
    handler: CriteriaHandler<S, R>,
}

impl<S, R> RunWithCriteria<S, R> {
    pub fn new(criterion: Criterion, handler: CriteriaHandler<S, R>) -> Self {
        Self { criterion, handler }
    }
}

#[async_trait]
impl<S: Session, R: Send> Operation<S> for RunWithCriteria<S, R> {
    type Output = R;

    fn kind(&self) -> OpKind {
        OpKind::RunWithCriteria
    }

    async fn apply(self, session: &mut S) -> Result<R, Error> {
        (self.handler)(session, self.criterion).await
    }
}
