//! General settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct General {
    /// Fleet label used in shard names and observer records.
    #[serde(default = "General::default_fleet_name")]
    pub fleet_name: String,

    /// Bucket count for the default key assignment.
    #[serde(default = "General::default_buckets")]
    pub buckets: usize,
}

impl General {
    fn default_fleet_name() -> String {
        "shardrail".into()
    }

    fn default_buckets() -> usize {
        1024
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            fleet_name: Self::default_fleet_name(),
            buckets: Self::default_buckets(),
        }
    }
}
