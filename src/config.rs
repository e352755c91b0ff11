use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration for the durable replication status store.
///
/// Constructed once at process start (typically deserialized from the job's
/// configuration file) and passed by reference to every component that needs
/// it. There is no process-wide singleton.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Pre-provisioned base directory on the target cluster. Must already
    /// exist with permissions allowing all principals all operations (0777);
    /// the store never creates or chmods it.
    pub base_path: PathBuf,
    /// How many historical snapshots to retain per (database, job) key.
    #[serde(default = "default_retained_snapshots")]
    pub retained_snapshots: usize,
    /// Grace period in milliseconds: excess historical snapshots younger than
    /// this are kept even when the retained count is exceeded.
    #[serde(default = "default_max_snapshot_age_ms")]
    pub max_snapshot_age_ms: u64,
}

impl StoreConfig {
    /// Creates a configuration with default retention settings.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            retained_snapshots: default_retained_snapshots(),
            max_snapshot_age_ms: default_max_snapshot_age_ms(),
        }
    }

    pub fn max_snapshot_age(&self) -> Duration {
        Duration::from_millis(self.max_snapshot_age_ms)
    }
}

const fn default_retained_snapshots() -> usize {
    10
}

// 1 day
const fn default_max_snapshot_age_ms() -> u64 {
    86_400_000
}
