//! Write-side operation contexts.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::Error;
use crate::store::{Entity, LockMode, NamedQuery, Session, Value};

use super::{OpKind, Operation, SaveHandler};

/// Persist one entity; returns it with generated fields populated.
pub struct Save<T> {
    entity: T,
    transform: Option<Box<dyn FnOnce(T) -> T + Send>>,
}

impl<T> Save<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            transform: None,
        }
    }

    pub fn transformed(mut self, transform: impl FnOnce(T) -> T + Send + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for Save<T> {
    type Output = T;

    fn kind(&self) -> OpKind {
        OpKind::Save
    }

    async fn apply(self, session: &mut S) -> Result<T, Error> {
        let persisted = session.persist(self.entity).await?;

        Ok(match self.transform {
            Some(transform) => transform(persisted),
            None => persisted,
        })
    }
}

/// Persist one entity, then run a handler inside the same transaction.
pub struct SaveThen<S, T, R> {
    entity: T,
    handler: SaveHandler<S, T, R>,
}

impl<S, T, R> SaveThen<S, T, R> {
    pub fn new(entity: T, handler: SaveHandler<S, T, R>) -> Self {
        Self { entity, handler }
    }
}

#[async_trait]
impl<S: Session, T: Entity, R: Send> Operation<S> for SaveThen<S, T, R> {
    type Output = R;

    fn kind(&self) -> OpKind {
        OpKind::Save
    }

    async fn apply(self, session: &mut S) -> Result<R, Error> {
        let persisted = session.persist(self.entity).await?;
        (self.handler)(session, &persisted).await
    }
}

/// Persist a collection.
pub struct SaveAll<T> {
    entities: Vec<T>,
}

impl<T> SaveAll<T> {
    pub fn new(entities: Vec<T>) -> Self {
        Self { entities }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for SaveAll<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::SaveAll
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        for entity in self.entities {
            session.persist(entity).await?;
        }

        Ok(true)
    }
}

/// Delete the row addressed by a key field, if present.
pub struct DeleteByKey<T> {
    field: String,
    key: Value,
    _entity: PhantomData<T>,
}

impl<T> DeleteByKey<T> {
    pub fn new(field: impl Into<String>, key: Value) -> Self {
        Self {
            field: field.into(),
            key,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for DeleteByKey<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::DeleteByKey
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        let row = session
            .fetch_one_by_field::<T>(&self.field, self.key, LockMode::WriteNoWait)
            .await?;

        match row {
            Some(row) => {
                session.delete(&row).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Execute a named update statement.
pub struct UpdateByNamedQuery {
    query: NamedQuery,
}

impl UpdateByNamedQuery {
    pub fn new(query: NamedQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl<S: Session> Operation<S> for UpdateByNamedQuery {
    type Output = u64;

    fn kind(&self) -> OpKind {
        OpKind::UpdateByNamedQuery
    }

    async fn apply(self, session: &mut S) -> Result<u64, Error> {
        Ok(session.execute_named(&self.query).await?)
    }
}
