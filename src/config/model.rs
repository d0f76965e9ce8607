//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a metalock instance.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Name of the lock; also the key written on every store.
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Backing store replicas. A quorum is a strict majority of these.
    #[serde(default = "default_stores")]
    pub stores: Vec<StoreConfig>,

    /// Expiry of the lock key on each store, in milliseconds.
    #[serde(default = "default_lock_expiry_ms")]
    pub lock_expiry_ms: u64,

    /// Pause between acquisition attempts while the lock is busy.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    // =========================================================================
    // Metadata settings
    // =========================================================================
    /// Caller-fixed entries stamped on every acquisition (e.g. `app: billing`).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Upper bound for each metadata store call, read or write.
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,

    /// Record a full backtrace in `stackTrace`.
    #[serde(default = "default_true")]
    pub capture_stack_trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_name: default_lock_name(),
            stores: default_stores(),
            lock_expiry_ms: default_lock_expiry_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            metadata: BTreeMap::new(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            capture_stack_trace: default_true(),
        }
    }
}
