//! Session over one in-memory shard: undo-log transactions and no-wait
//! row locks.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::store::{
    Criterion, Direction, Entity, Error, LockMode, NamedQuery, Page, ScrollCursor, Selection,
    Session, SortKey,
};

use super::store::{AnyRow, MemStore, Row, State, Table};

enum Undo {
    Insert {
        table: &'static str,
        row: u64,
    },
    Replace {
        table: &'static str,
        row: u64,
        prior: Box<dyn AnyRow>,
    },
    Remove {
        table: &'static str,
        row: u64,
        prior: Box<dyn AnyRow>,
    },
}

struct Tx {
    id: u64,
    read_only: bool,
    undo: Vec<Undo>,
    locks: Vec<(&'static str, u64)>,
}

pub struct MemSession {
    store: MemStore,
    tx: Option<Tx>,
}

impl MemSession {
    pub(crate) fn new(store: MemStore) -> Self {
        Self { store, tx: None }
    }

    fn rollback_inner(&mut self) {
        if let Some(tx) = self.tx.take() {
            let mut state = self.store.state.lock();

            for undo in tx.undo.into_iter().rev() {
                match undo {
                    Undo::Insert { table, row } => {
                        if let Some(table) = state.tables.get_mut(table) {
                            table.rows.remove(&row);
                        }
                    }
                    Undo::Replace { table, row, prior } => {
                        if let Some(row) = state
                            .tables
                            .get_mut(table)
                            .and_then(|table| table.rows.get_mut(&row))
                        {
                            row.data = prior;
                        }
                    }
                    Undo::Remove { table, row, prior } => {
                        if let Some(table) = state.tables.get_mut(table) {
                            table.rows.insert(
                                row,
                                Row {
                                    data: prior,
                                    lock: None,
                                },
                            );
                        }
                    }
                }
            }

            release_locks(&mut state, &tx.locks, tx.id);
        }
    }
}

fn write_tx(tx: &mut Option<Tx>) -> Result<&mut Tx, Error> {
    match tx {
        Some(tx) if !tx.read_only => Ok(tx),
        Some(_) => Err(Error::engine("transaction is read-only")),
        None => Err(Error::NoTransaction),
    }
}

fn release_locks(state: &mut State, locks: &[(&'static str, u64)], tx_id: u64) {
    for (table, row_id) in locks {
        if let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|table| table.rows.get_mut(row_id))
        {
            if row.lock == Some(tx_id) {
                row.lock = None;
            }
        }
    }
}

fn acquire_lock(
    state: &mut State,
    tx: &mut Tx,
    table: &'static str,
    row_id: u64,
) -> Result<(), Error> {
    let row = state
        .tables
        .get_mut(table)
        .and_then(|table| table.rows.get_mut(&row_id))
        .ok_or_else(|| Error::engine("locked row vanished"))?;

    match row.lock {
        Some(owner) if owner != tx.id => Err(Error::LockConflict),
        Some(_) => Ok(()),
        None => {
            row.lock = Some(tx.id);
            tx.locks.push((table, row_id));
            Ok(())
        }
    }
}

fn matching<T: Entity>(state: &State, criterion: &Criterion) -> Vec<(u64, T)> {
    state
        .tables
        .get(T::entity_name())
        .map(|table| {
            table
                .rows
                .iter()
                .filter_map(|(id, row)| {
                    row.data
                        .as_any()
                        .downcast_ref::<T>()
                        .filter(|entity| criterion.matches(*entity))
                        .map(|entity| (*id, entity.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn sort_rows<T: Entity>(rows: &mut [(u64, T)], order: &[SortKey]) {
    if order.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for key in order {
            let left = a.1.field(&key.field).unwrap_or(crate::store::Value::Null);
            let right = b.1.field(&key.field).unwrap_or(crate::store::Value::Null);

            let mut ordering = left.try_cmp(&right).unwrap_or(Ordering::Equal);
            if key.direction == Direction::Descending {
                ordering = ordering.reverse();
            }

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        a.0.cmp(&b.0)
    });
}

fn paginate<T>(rows: Vec<(u64, T)>, page: &Option<Page>) -> Vec<(u64, T)> {
    match page {
        Some(page) => rows
            .into_iter()
            .skip(page.start as usize)
            .take(page.rows as usize)
            .collect(),
        None => rows,
    }
}

/// Find the stored row equal to the detached instance.
fn row_id_of<T: Entity>(table: &Table, detached: &T) -> Result<u64, Error> {
    let detached = serde_json::to_value(detached).map_err(|err| Error::Engine(err.into()))?;

    table
        .rows
        .iter()
        .find_map(|(id, row)| {
            let entity = row.data.as_any().downcast_ref::<T>()?;
            (serde_json::to_value(entity).ok()? == detached).then_some(*id)
        })
        .ok_or_else(|| Error::engine("detached row not found"))
}

#[async_trait]
impl Session for MemSession {
    type Scroll<T: Entity> = MemScroll<T>;

    async fn begin(&mut self, read_only: bool) -> Result<(), Error> {
        if self.tx.is_some() {
            return Err(Error::engine("transaction already open"));
        }

        let mut state = self.store.state.lock();
        let id = state.next_tx;
        state.next_tx += 1;

        self.tx = Some(Tx {
            id,
            read_only,
            undo: Vec::new(),
            locks: Vec::new(),
        });

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), Error> {
        let tx = self.tx.take().ok_or(Error::NoTransaction)?;
        release_locks(&mut self.store.state.lock(), &tx.locks, tx.id);

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        if self.tx.is_none() {
            return Err(Error::NoTransaction);
        }
        self.rollback_inner();

        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.rollback_inner();

        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    async fn fetch_one<T: Entity>(
        &mut self,
        criterion: &Criterion,
        lock: LockMode,
    ) -> Result<Option<T>, Error> {
        let mut state = self.store.state.lock();
        let mut rows = matching::<T>(&state, criterion);

        match rows.len() {
            0 => Ok(None),
            1 => {
                let (row_id, entity) = rows.remove(0);

                if lock == LockMode::WriteNoWait {
                    let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
                    acquire_lock(&mut state, tx, T::entity_name(), row_id)?;
                }

                Ok(Some(entity))
            }
            _ => Err(Error::NonUnique),
        }
    }

    async fn list<T: Entity>(
        &mut self,
        selection: &Selection,
        lock: LockMode,
    ) -> Result<Vec<T>, Error> {
        let mut state = self.store.state.lock();

        let mut rows = matching::<T>(&state, &selection.criterion);
        sort_rows(&mut rows, &selection.order);
        let rows = paginate(rows, &selection.page);

        if lock == LockMode::WriteNoWait {
            let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
            for (row_id, _) in &rows {
                acquire_lock(&mut state, tx, T::entity_name(), *row_id)?;
            }
        }

        Ok(rows.into_iter().map(|(_, entity)| entity).collect())
    }

    async fn scroll<T: Entity>(&mut self, selection: &Selection) -> Result<MemScroll<T>, Error> {
        let state = self.store.state.lock();

        let mut rows = matching::<T>(&state, &selection.criterion);
        sort_rows(&mut rows, &selection.order);
        let rows = paginate(rows, &selection.page);

        Ok(MemScroll {
            store: self.store.clone(),
            ids: rows.into_iter().map(|(id, _)| id).collect(),
            _entity: PhantomData,
        })
    }

    async fn count<T: Entity>(&mut self, selection: &Selection) -> Result<u64, Error> {
        let state = self.store.state.lock();
        Ok(matching::<T>(&state, &selection.criterion).len() as u64)
    }

    async fn persist<T: Entity>(&mut self, entity: T) -> Result<T, Error> {
        let tx = write_tx(&mut self.tx)?;
        let mut state = self.store.state.lock();

        let row_id = state.next_row;
        state.next_row += 1;

        state
            .tables
            .entry(T::entity_name())
            .or_default()
            .rows
            .insert(
                row_id,
                Row {
                    data: Box::new(entity.clone()),
                    lock: None,
                },
            );

        tx.undo.push(Undo::Insert {
            table: T::entity_name(),
            row: row_id,
        });

        Ok(entity)
    }

    async fn replace<T: Entity>(&mut self, old: T, new: T) -> Result<T, Error> {
        let tx = write_tx(&mut self.tx)?;
        let mut state = self.store.state.lock();

        let table = state
            .tables
            .get_mut(T::entity_name())
            .ok_or(Error::UnknownEntity(T::entity_name()))?;

        // Detach `old`, attach `new` in its place.
        let row_id = row_id_of(table, &old)?;
        if let Some(row) = table.rows.get_mut(&row_id) {
            if row.lock.is_some() && row.lock != Some(tx.id) {
                return Err(Error::LockConflict);
            }

            tx.undo.push(Undo::Replace {
                table: T::entity_name(),
                row: row_id,
                prior: row.data.clone_box(),
            });
            row.data = Box::new(new.clone());
        }

        Ok(new)
    }

    async fn delete<T: Entity>(&mut self, entity: &T) -> Result<(), Error> {
        let tx = write_tx(&mut self.tx)?;
        let mut state = self.store.state.lock();

        let table = state
            .tables
            .get_mut(T::entity_name())
            .ok_or(Error::UnknownEntity(T::entity_name()))?;

        let row_id = row_id_of(table, entity)?;
        if let Some(row) = table.rows.get(&row_id) {
            if row.lock.is_some() && row.lock != Some(tx.id) {
                return Err(Error::LockConflict);
            }
        }

        if let Some(row) = table.rows.remove(&row_id) {
            tx.undo.push(Undo::Remove {
                table: T::entity_name(),
                row: row_id,
                prior: row.data,
            });
        }

        Ok(())
    }

    async fn execute_named(&mut self, query: &NamedQuery) -> Result<u64, Error> {
        let tx = write_tx(&mut self.tx)?;
        let mut state = self.store.state.lock();

        let (table_name, apply) = {
            let handler = state
                .named
                .get(query.name())
                .ok_or_else(|| Error::UnknownNamedQuery(query.name().to_string()))?;
            (handler.table, handler.apply.clone())
        };

        let mut affected = 0;
        if let Some(table) = state.tables.get_mut(table_name) {
            for (row_id, row) in table.rows.iter_mut() {
                let prior = row.data.clone_box();

                if apply(query.params(), row.data.as_any_mut()) {
                    tx.undo.push(Undo::Replace {
                        table: table_name,
                        row: *row_id,
                        prior,
                    });
                    affected += 1;
                }
            }
        }

        Ok(affected)
    }
}

/// Forward-only cursor: ids are pinned when the cursor opens, rows are
/// re-read as the cursor advances, rows deleted in the meantime are
/// skipped.
pub struct MemScroll<T> {
    store: MemStore,
    ids: VecDeque<u64>,
    _entity: PhantomData<T>,
}

#[async_trait]
impl<T: Entity> ScrollCursor<T> for MemScroll<T> {
    async fn next(&mut self) -> Result<Option<T>, Error> {
        let state = self.store.state.lock();
        let table = state.tables.get(T::entity_name());

        while let Some(id) = self.ids.pop_front() {
            if let Some(entity) = table
                .and_then(|table| table.rows.get(&id))
                .and_then(|row| row.data.as_any().downcast_ref::<T>())
            {
                return Ok(Some(entity.clone()));
            }
        }

        Ok(None)
    }
}
