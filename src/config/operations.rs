//! Config loading, validation, and construction of the configured lock.

use super::model::Config;
use super::types::StoreConfig;
use crate::error::{MetaLockError, Result};
use crate::meta_lock::{LockOptions, MetaLock};
use crate::metadata::{MetadataOptions, OwnershipRecord};
use crate::primitive::QuorumOptions;
use crate::store::{BackingStore, FileStore, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "METALOCK_CONFIG";

/// Pick the config file to load: the explicit path, else `METALOCK_CONFIG`,
/// else none (defaults apply).
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            MetaLockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load the resolved config file, or defaults when there is none.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match resolve_path(explicit) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| MetaLockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            MetaLockError::Config(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_name` must be non-empty
    /// - `stores` must be non-empty, file stores need a non-empty path
    /// - `lock_expiry_ms` and `metadata_timeout_ms` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.lock_name.trim().is_empty() {
            return Err(MetaLockError::Config(
                "config validation failed: lock_name must not be empty".to_string(),
            ));
        }

        if self.stores.is_empty() {
            return Err(MetaLockError::Config(
                "config validation failed: at least one store is required".to_string(),
            ));
        }

        for (i, store) in self.stores.iter().enumerate() {
            if matches!(store, StoreConfig::File { path } if path.as_os_str().is_empty()) {
                return Err(MetaLockError::Config(format!(
                    "config validation failed: stores[{}] is a file store without a path",
                    i
                )));
            }
        }

        if self.lock_expiry_ms == 0 {
            return Err(MetaLockError::Config(
                "config validation failed: lock_expiry_ms must be greater than 0".to_string(),
            ));
        }

        if self.metadata_timeout_ms == 0 {
            return Err(MetaLockError::Config(
                "config validation failed: metadata_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Open every configured store.
    pub fn build_stores(&self) -> Result<Vec<Arc<dyn BackingStore>>> {
        self.stores
            .iter()
            .enumerate()
            .map(|(i, store)| -> Result<Arc<dyn BackingStore>> {
                Ok(match store {
                    StoreConfig::Memory { label } => Arc::new(MemoryStore::new(
                        label.clone().unwrap_or_else(|| format!("memory-{}", i)),
                    )),
                    StoreConfig::File { path } => Arc::new(FileStore::open(path)?),
                })
            })
            .collect()
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            quorum: QuorumOptions {
                expiry: Duration::from_millis(self.lock_expiry_ms),
                retry_interval: Duration::from_millis(self.retry_interval_ms),
            },
            metadata: MetadataOptions {
                io_timeout: Duration::from_millis(self.metadata_timeout_ms),
                capture_stack_trace: self.capture_stack_trace,
            },
        }
    }

    pub fn fixed_metadata(&self) -> OwnershipRecord {
        OwnershipRecord::from(self.metadata.clone())
    }

    /// Build the configured lock over freshly opened stores.
    pub fn build_lock(&self) -> Result<MetaLock> {
        self.validate()?;
        MetaLock::new(
            self.lock_name.clone(),
            self.build_stores()?,
            self.fixed_metadata(),
            self.lock_options(),
        )
    }
}
