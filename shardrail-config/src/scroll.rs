//! Scroll engine settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scroll {
    /// Optional upper bound on the per-step page size.
    #[serde(default)]
    pub max_page_size: Option<usize>,
}
