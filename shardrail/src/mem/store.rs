//! Shared state of one in-memory shard.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::store::{Entity, Error, SessionGateway, Value};

use super::session::MemSession;

/// Type-erased stored row.
pub(crate) trait AnyRow: Any + Send + Sync {
    fn clone_box(&self) -> Box<dyn AnyRow>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> AnyRow for T {
    fn clone_box(&self) -> Box<dyn AnyRow> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct Row {
    pub(crate) data: Box<dyn AnyRow>,
    /// Transaction currently holding the write lock.
    pub(crate) lock: Option<u64>,
}

#[derive(Default)]
pub(crate) struct Table {
    /// Row id → row; ids are monotonic, so iteration is insertion order.
    pub(crate) rows: BTreeMap<u64, Row>,
}

pub(crate) struct NamedHandler {
    pub(crate) table: &'static str,
    pub(crate) apply: Arc<dyn Fn(&IndexMap<String, Value>, &mut dyn Any) -> bool + Send + Sync>,
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) tables: HashMap<&'static str, Table>,
    pub(crate) named: HashMap<String, NamedHandler>,
    pub(crate) next_row: u64,
    pub(crate) next_tx: u64,
}

/// One shard's in-memory database.
#[derive(Clone, Default)]
pub struct MemStore {
    pub(crate) state: Arc<Mutex<State>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent stores fronted by gateways named `shard_0..shard_N`.
    pub fn fleet(shards: usize) -> Vec<MemGateway> {
        (0..shards)
            .map(|shard| MemGateway::new(MemStore::new(), format!("shard_{}", shard)))
            .collect()
    }

    /// Register a named update statement. The handler runs once per row
    /// of `T`'s table and reports whether it modified the row.
    pub fn register_named_query<T, F>(&self, name: impl Into<String>, handler: F)
    where
        T: Entity,
        F: Fn(&IndexMap<String, Value>, &mut T) -> bool + Send + Sync + 'static,
    {
        let apply = Arc::new(
            move |params: &IndexMap<String, Value>, row: &mut dyn Any| match row
                .downcast_mut::<T>()
            {
                Some(row) => handler(params, row),
                None => false,
            },
        );

        self.state.lock().named.insert(
            name.into(),
            NamedHandler {
                table: T::entity_name(),
                apply,
            },
        );
    }

    /// Snapshot of a table, in row-id order. Inspection helper.
    pub fn rows<T: Entity>(&self) -> Vec<T> {
        self.state
            .lock()
            .tables
            .get(T::entity_name())
            .map(|table| {
                table
                    .rows
                    .values()
                    .filter_map(|row| row.data.as_any().downcast_ref::<T>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len<T: Entity>(&self) -> usize {
        self.rows::<T>().len()
    }
}

/// Gateway over one in-memory shard.
#[derive(Clone)]
pub struct MemGateway {
    store: MemStore,
    name: String,
}

impl MemGateway {
    pub fn new(store: MemStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn store(&self) -> &MemStore {
        &self.store
    }
}

#[async_trait]
impl SessionGateway for MemGateway {
    type Session = MemSession;

    async fn session(&self) -> Result<MemSession, Error> {
        Ok(MemSession::new(self.store.clone()))
    }

    fn shard_name(&self) -> &str {
        &self.name
    }
}
