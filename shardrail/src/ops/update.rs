//! Update-family operation contexts.
//!
//! The shared contract: a mutator returning `None` means "do not update".
//! Single-row updates commit and report `false`; range updates abort the
//! remaining rows.

use async_trait::async_trait;

use crate::error::Error;
use crate::store::{Criterion, Entity, LockMode, Page, ScrollCursor, Selection, Session};

use super::{Generator, Mutator, OpKind, Operation, RowMutator};

/// Replace the row when the mutator produced one, persist it when the
/// mutator created it from an absent row.
async fn apply_mutation<T: Entity, S: Session>(
    session: &mut S,
    old: Option<T>,
    mutator: Mutator<T>,
) -> Result<bool, Error> {
    let prior = old.clone();

    match (prior, mutator(old)) {
        (_, None) => Ok(false),
        (Some(old), Some(new)) => {
            session.replace(old, new).await?;
            Ok(true)
        }
        (None, Some(new)) => {
            session.persist(new).await?;
            Ok(true)
        }
    }
}

/// Fetch one row by criterion, mutate, write back.
pub struct GetAndUpdate<T> {
    criterion: Criterion,
    lock: LockMode,
    mutator: Mutator<T>,
}

impl<T> GetAndUpdate<T> {
    pub fn new(criterion: Criterion, lock: LockMode, mutator: Mutator<T>) -> Self {
        Self {
            criterion,
            lock,
            mutator,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for GetAndUpdate<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::GetAndUpdate
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        let row = session.fetch_one::<T>(&self.criterion, self.lock).await?;
        apply_mutation(session, row, self.mutator).await
    }
}

/// Update the first row inside a criterion + range window.
pub struct Update<T> {
    criterion: Criterion,
    page: Option<Page>,
    mutator: Mutator<T>,
}

impl<T> Update<T> {
    pub fn new(criterion: Criterion, page: Option<Page>, mutator: Mutator<T>) -> Self {
        Self {
            criterion,
            page,
            mutator,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for Update<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::Update
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        let mut selection = Selection::new(self.criterion);
        selection.page = self.page;

        let row = session
            .list::<T>(&selection, LockMode::None)
            .await?
            .into_iter()
            .next();
        apply_mutation(session, row, self.mutator).await
    }
}

/// Update the first row of a full selection (order, pagination).
pub struct SelectAndUpdate<T> {
    selection: Selection,
    mutator: Mutator<T>,
}

impl<T> SelectAndUpdate<T> {
    pub fn new(selection: Selection, mutator: Mutator<T>) -> Self {
        Self { selection, mutator }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for SelectAndUpdate<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::SelectAndUpdate
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        let row = session
            .list::<T>(&self.selection, LockMode::None)
            .await?
            .into_iter()
            .next();
        apply_mutation(session, row, self.mutator).await
    }
}

/// Mutate every row in a selection window. A `None` from the mutator
/// aborts the remaining rows and reports `false`.
pub struct UpdateAll<T> {
    selection: Selection,
    mutator: RowMutator<T>,
}

impl<T> UpdateAll<T> {
    pub fn new(selection: Selection, mutator: RowMutator<T>) -> Self {
        Self { selection, mutator }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for UpdateAll<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::UpdateAll
    }

    async fn apply(mut self, session: &mut S) -> Result<bool, Error> {
        let rows = session.list::<T>(&self.selection, LockMode::None).await?;

        for row in rows {
            let old = row.clone();
            match (self.mutator)(row) {
                Some(new) => {
                    session.replace(old, new).await?;
                }
                None => return Ok(false),
            }
        }

        Ok(true)
    }
}

/// Mutate rows behind a forward-only cursor until it is exhausted, the
/// mutator declines, or the continue-predicate stops the walk.
pub struct UpdateWithScroll<T> {
    selection: Selection,
    mutator: RowMutator<T>,
    keep_going: Box<dyn FnMut(&T) -> bool + Send>,
}

impl<T> UpdateWithScroll<T> {
    pub fn new(
        selection: Selection,
        mutator: RowMutator<T>,
        keep_going: Box<dyn FnMut(&T) -> bool + Send>,
    ) -> Self {
        Self {
            selection,
            mutator,
            keep_going,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for UpdateWithScroll<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::UpdateWithScroll
    }

    async fn apply(mut self, session: &mut S) -> Result<bool, Error> {
        let mut cursor = session.scroll::<T>(&self.selection).await?;

        while let Some(row) = cursor.next().await? {
            let old = row.clone();
            match (self.mutator)(row) {
                Some(new) => {
                    session.replace(old, new.clone()).await?;
                    if !(self.keep_going)(&new) {
                        break;
                    }
                }
                None => return Ok(false),
            }
        }

        Ok(true)
    }
}

/// Fetch under a no-wait write lock; create through the generator when
/// absent, mutate and write back when present. The update path refetches
/// and returns the stored row.
pub struct CreateOrUpdate<T> {
    criterion: Criterion,
    mutator: Box<dyn FnOnce(T) -> Option<T> + Send>,
    generator: Generator<T>,
}

impl<T> CreateOrUpdate<T> {
    pub fn new(
        criterion: Criterion,
        mutator: Box<dyn FnOnce(T) -> Option<T> + Send>,
        generator: Generator<T>,
    ) -> Self {
        Self {
            criterion,
            mutator,
            generator,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for CreateOrUpdate<T> {
    type Output = T;

    fn kind(&self) -> OpKind {
        OpKind::CreateOrUpdate
    }

    async fn apply(self, session: &mut S) -> Result<T, Error> {
        let row = session
            .fetch_one::<T>(&self.criterion, LockMode::WriteNoWait)
            .await?;

        match row {
            None => {
                let created = (self.generator)();
                Ok(session.persist(created).await?)
            }
            Some(old) => {
                let current = old.clone();
                match (self.mutator)(old.clone()) {
                    Some(new) => {
                        session.replace(old, new).await?;
                        session
                            .fetch_one::<T>(&self.criterion, LockMode::None)
                            .await?
                            .ok_or(Error::NotFound)
                    }
                    None => Ok(current),
                }
            }
        }
    }
}

/// Create-or-update inside an already locked context: the parent row is
/// pinned by the outer frame, so the child fetch takes no lock of its own.
pub struct CreateOrUpdateInLockedContext<T> {
    criterion: Criterion,
    mutator: Box<dyn FnOnce(T) -> Option<T> + Send>,
    generator: Generator<T>,
}

impl<T> CreateOrUpdateInLockedContext<T> {
    pub fn new(
        criterion: Criterion,
        mutator: Box<dyn FnOnce(T) -> Option<T> + Send>,
        generator: Generator<T>,
    ) -> Self {
        Self {
            criterion,
            mutator,
            generator,
        }
    }
}

#[async_trait]
impl<T: Entity, S: Session> Operation<S> for CreateOrUpdateInLockedContext<T> {
    type Output = bool;

    fn kind(&self) -> OpKind {
        OpKind::CreateOrUpdateInLockedContext
    }

    async fn apply(self, session: &mut S) -> Result<bool, Error> {
        let row = session
            .fetch_one::<T>(&self.criterion, LockMode::None)
            .await?;

        match row {
            None => {
                let created = (self.generator)();
                session.persist(created).await?;
                Ok(true)
            }
            Some(old) => match (self.mutator)(old.clone()) {
                Some(new) => {
                    session.replace(old, new).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}
