//! Session layer: the contracts persistence engines implement and the
//! query model routers build against them.

pub mod criterion;
pub mod entity;
pub mod error;
pub mod lock;
pub mod named;
pub mod query;
pub mod session;
pub mod value;

pub use criterion::Criterion;
pub use entity::{Entity, EntityDescriptor, KeyKind};
pub use error::Error;
pub use lock::LockMode;
pub use named::NamedQuery;
pub use query::{Direction, Filter, Page, QueryBuilder, QuerySpec, Selection, SortKey};
pub use session::{ScrollCursor, Session, SessionGateway};
pub use value::{Value, ValueKind};
