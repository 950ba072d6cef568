//! Tagged operation contexts executed by the transaction runner.
//!
//! Each variant is a data-only description of one unit of work on one
//! shard: the inputs, the callbacks, the post-transform. Observers
//! discriminate variants through [`OpKind`] without type introspection.

mod context;
mod read;
mod update;
mod write;

pub use context::{LockAndExecute, ReadOnlyExec};
pub(crate) use context::{Acquire, AugmentOp, Augmenter, Getter, QueuedOp};
pub use read::{Count, Get, GetByKey, RunInSession, RunWithCriteria, Select};
pub use update::{
    CreateOrUpdate, CreateOrUpdateInLockedContext, GetAndUpdate, SelectAndUpdate, Update,
    UpdateAll, UpdateWithScroll,
};
pub use write::{DeleteByKey, Save, SaveAll, SaveThen, UpdateByNamedQuery};

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Error;
use crate::store::{Criterion, Session};

/// Discriminant observers use to tell operation variants apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Count,
    Get,
    GetByKey,
    Select,
    Save,
    SaveAll,
    Update,
    GetAndUpdate,
    SelectAndUpdate,
    UpdateWithScroll,
    UpdateAll,
    UpdateByNamedQuery,
    CreateOrUpdate,
    CreateOrUpdateInLockedContext,
    DeleteByKey,
    RunInSession,
    RunWithCriteria,
    LockAndExecute,
    ReadOnly,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Count => "count",
            OpKind::Get => "get",
            OpKind::GetByKey => "get_by_key",
            OpKind::Select => "select",
            OpKind::Save => "save",
            OpKind::SaveAll => "save_all",
            OpKind::Update => "update",
            OpKind::GetAndUpdate => "get_and_update",
            OpKind::SelectAndUpdate => "select_and_update",
            OpKind::UpdateWithScroll => "update_with_scroll",
            OpKind::UpdateAll => "update_all",
            OpKind::UpdateByNamedQuery => "update_by_named_query",
            OpKind::CreateOrUpdate => "create_or_update",
            OpKind::CreateOrUpdateInLockedContext => "create_or_update_in_locked_context",
            OpKind::DeleteByKey => "delete_by_key",
            OpKind::RunInSession => "run_in_session",
            OpKind::RunWithCriteria => "run_with_criteria",
            OpKind::LockAndExecute => "lock_and_execute",
            OpKind::ReadOnly => "read_only",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            OpKind::Count
                | OpKind::Get
                | OpKind::GetByKey
                | OpKind::Select
                | OpKind::RunInSession
                | OpKind::RunWithCriteria
                | OpKind::ReadOnly
        )
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work applied to an open session on one shard.
#[async_trait]
pub trait Operation<S: Session>: Send {
    type Output: Send;

    fn kind(&self) -> OpKind;

    async fn apply(self, session: &mut S) -> Result<Self::Output, Error>;
}

/// Mutator over an optionally present row. `None` means "do not update".
pub type Mutator<T> = Box<dyn FnOnce(Option<T>) -> Option<T> + Send>;

/// Mutator applied to each row of a range or cursor.
pub type RowMutator<T> = Box<dyn FnMut(T) -> Option<T> + Send>;

/// Produces the row to create when none matched.
pub type Generator<T> = Box<dyn FnOnce() -> T + Send>;

/// Handler run against the open session.
pub type SessionHandler<S, R> =
    Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<R, Error>> + Send>;

/// Handler run against the open session with a prepared criterion.
pub type CriteriaHandler<S, R> =
    Box<dyn for<'a> FnOnce(&'a mut S, Criterion) -> BoxFuture<'a, Result<R, Error>> + Send>;

/// Handler run against the open session and the just-persisted entity.
pub type SaveHandler<S, T, R> =
    Box<dyn for<'a> FnOnce(&'a mut S, &'a T) -> BoxFuture<'a, Result<R, Error>> + Send>;

#[cfg(test)]
mod test {
    use super::OpKind;

    #[test]
    fn test_read_kinds() {
        assert!(!OpKind::Get.is_write());
        assert!(!OpKind::Select.is_write());
        assert!(!OpKind::ReadOnly.is_write());
        assert!(OpKind::Save.is_write());
        assert!(OpKind::DeleteByKey.is_write());
        assert!(OpKind::LockAndExecute.is_write());
    }

    #[test]
    fn test_names() {
        assert_eq!(OpKind::CreateOrUpdate.name(), "create_or_update");
        assert_eq!(OpKind::UpdateWithScroll.to_string(), "update_with_scroll");
    }
}
