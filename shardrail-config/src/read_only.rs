//! Read-only context settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadOnly {
    /// Skip begin/commit for read-only contexts; the getter runs
    /// directly on the open session. Only safe when the engine permits
    /// session access without a transaction for read-only work.
    #[serde(default)]
    pub skip_transaction: bool,
}
