//! Structured execution contexts composed on top of the routers.

pub mod association;
pub mod locked;
pub mod read_only;

pub use association::{AssociationSpec, QueryFilterSpec};
pub use locked::LockedContext;
pub use read_only::{Populator, ReadOnlyContext};
