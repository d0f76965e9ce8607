//! Configuration types and defaults for metalock.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One backing store replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local map. Only useful for demos and tests.
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Directory of entry files, shareable between processes on one host.
    File { path: PathBuf },
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::Memory { label: None }
    }
}

// Default value functions for serde
pub(crate) fn default_lock_name() -> String {
    "metalock".to_string()
}
pub(crate) fn default_stores() -> Vec<StoreConfig> {
    vec![StoreConfig::memory()]
}
pub(crate) fn default_lock_expiry_ms() -> u64 {
    30_000
}
pub(crate) fn default_retry_interval_ms() -> u64 {
    50
}
pub(crate) fn default_metadata_timeout_ms() -> u64 {
    2_000
}
pub(crate) fn default_true() -> bool {
    true
}
