//! Serial cross-shard reads.
//!
//! Shards run one after another, 0 → N−1, on the caller's task: memory
//! stays bounded at one shard's result set plus the accumulator, and
//! observer ordering matches shard order. Any per-shard failure fails
//! the whole aggregation; no partial results.

use indexmap::IndexMap;

use crate::error::Error;
use crate::fleet::Fleet;
use crate::ops;
use crate::ops::Operation;
use crate::store::{Entity, Filter, LockMode, SessionGateway};
use crate::txn::{self, TxMode};

pub(crate) async fn list<T, G>(
    fleet: &Fleet<G>,
    router: &'static str,
    filter: Filter,
) -> Result<Vec<T>, Error>
where
    T: Entity,
    G: SessionGateway,
{
    let selection = filter.resolve();
    let mut rows = Vec::new();

    for shard in 0..fleet.shards() {
        let op = ops::Select::<T>::new(selection.clone(), LockMode::None);
        let record = fleet.record::<T>(router, "scatter_gather", Operation::<G::Session>::kind(&op), shard);

        rows.extend(
            txn::execute(
                fleet.gateway(shard),
                fleet.observers(),
                record,
                TxMode::ReadOnly,
                op,
            )
            .await?,
        );
    }

    Ok(rows)
}

pub(crate) async fn counts<T, G>(
    fleet: &Fleet<G>,
    router: &'static str,
    filter: Filter,
) -> Result<Vec<u64>, Error>
where
    T: Entity,
    G: SessionGateway,
{
    let selection = filter.resolve();
    let mut counts = Vec::with_capacity(fleet.shards());

    for shard in 0..fleet.shards() {
        let op = ops::Count::<T>::new(selection.clone());
        let record = fleet.record::<T>(router, "count", Operation::<G::Session>::kind(&op), shard);

        counts.push(
            txn::execute(
                fleet.gateway(shard),
                fleet.observers(),
                record,
                TxMode::ReadOnly,
                op,
            )
            .await?,
        );
    }

    Ok(counts)
}

pub(crate) async fn map<T, G, R, F>(
    fleet: &Fleet<G>,
    router: &'static str,
    filter: Filter,
    translator: F,
) -> Result<IndexMap<usize, R>, Error>
where
    T: Entity,
    G: SessionGateway,
    F: Fn(usize, Vec<T>) -> R,
{
    let selection = filter.resolve();
    let mut grouped = IndexMap::with_capacity(fleet.shards());

    for shard in 0..fleet.shards() {
        let op = ops::Select::<T>::new(selection.clone(), LockMode::None);
        let record = fleet.record::<T>(router, "scatter_map", Operation::<G::Session>::kind(&op), shard);

        let rows = txn::execute(
            fleet.gateway(shard),
            fleet.observers(),
            record,
            TxMode::ReadOnly,
            op,
        )
        .await?;

        grouped.insert(shard, translator(shard, rows));
    }

    Ok(grouped)
}
