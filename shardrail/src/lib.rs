//! Sharded relational data-access layer.
//!
//! Routes keyed operations to one of a fixed fleet of relational shards
//! by stable hashing, executes each inside a per-shard transaction, and
//! composes the rest on top: locked write contexts pinned to one row,
//! read-only contexts that augment a parent with child rows, serial
//! scatter-gather with merging, and cross-shard scroll iteration driven
//! by per-shard offset pointers.
//!
//! The persistence engine stays outside: embedders implement
//! [`store::SessionGateway`] and [`store::Session`] over their engine of
//! choice. [`mem`] ships a complete in-memory implementation used by the
//! test suite.

pub mod context;
pub mod error;
pub mod fleet;
pub mod mem;
pub mod observer;
pub mod ops;
pub mod router;
pub mod sharding;
pub mod stats;
pub mod store;
pub mod txn;

pub use context::{AssociationSpec, LockedContext, Populator, QueryFilterSpec, ReadOnlyContext};
pub use error::{Error, SpecError};
pub use fleet::{Fleet, FleetBuilder};
pub use router::{ReadSpec, RelatedRouter, Router, ScrollPointer, ScrollResult};
pub use shardrail_config::Config;

/// Set up the tracing logger. Tests and embedders call this once;
/// repeated calls are no-ops.
pub fn logger() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
