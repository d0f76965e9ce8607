//! Directory-backed store shared between processes on one host.
//!
//! Each key maps to `<dir>/<encoded key>.entry`, a JSON document holding the
//! base64 value and an optional RFC 3339 expiry. Reads go straight to the
//! entry file; every mutation runs while holding `<encoded key>.guard`.

use super::{BackingStore, Ttl};
use crate::error::{MetaLockError, Result};
use crate::fs::{ExclusiveFile, atomic_write};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

const GUARD_WAIT: Duration = Duration::from_secs(2);

/// On-disk entry format.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// Base64 (standard alphabet) encoded value.
    value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// TTL key-value store persisted as one file per key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            MetaLockError::Store(format!(
                "failed to create store directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Get the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.entry", URL_SAFE_NO_PAD.encode(key.as_bytes())))
    }

    fn guard_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.guard", URL_SAFE_NO_PAD.encode(key.as_bytes())))
    }

    async fn lock_key(&self, key: &str) -> Result<ExclusiveFile> {
        ExclusiveFile::acquire(self.guard_path(key), GUARD_WAIT).await
    }
}

/// Run file work on tokio's blocking pool so an fsync never stalls a worker.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MetaLockError::Store(format!("file store task failed: {}", e)))?
}

/// Read the live entry at `path`, treating expired entries as absent.
fn read_live(path: &Path) -> Result<Option<(Vec<u8>, Option<DateTime<Utc>>)>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MetaLockError::Store(format!(
                "failed to read entry '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let entry: StoredEntry = serde_json::from_str(&content).map_err(|e| {
        MetaLockError::Store(format!(
            "failed to parse entry '{}': {}",
            path.display(),
            e
        ))
    })?;

    if !entry.is_live(Utc::now()) {
        return Ok(None);
    }

    let value = STANDARD.decode(entry.value.as_bytes()).map_err(|e| {
        MetaLockError::Store(format!(
            "entry '{}' holds invalid base64: {}",
            path.display(),
            e
        ))
    })?;
    Ok(Some((value, entry.expires_at)))
}

fn write_entry(path: &Path, value: &[u8], ttl: Option<Duration>) -> Result<()> {
    // An expiry too far out to represent is stored as no expiry.
    let expires_at = ttl
        .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    let entry = StoredEntry {
        value: STANDARD.encode(value),
        expires_at,
    };
    let json = serde_json::to_vec(&entry)
        .map_err(|e| MetaLockError::Store(format!("failed to serialize entry: {}", e)))?;
    atomic_write(path, &json)
}

fn remove_entry(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MetaLockError::Store(format!(
            "failed to remove entry '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl BackingStore for FileStore {
    fn label(&self) -> String {
        format!("file:{}", self.dir.display())
    }

    async fn time_to_live(&self, key: &str) -> Result<Ttl> {
        let path = self.entry_path(key);
        Ok(match blocking(move || read_live(&path)).await? {
            None => Ttl::Missing,
            Some((_, None)) => Ttl::Persistent,
            Some((_, Some(at))) => Ttl::Expires(
                at.signed_duration_since(Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            ),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        Ok(blocking(move || read_live(&path))
            .await?
            .map(|(value, _)| value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let _guard = self.lock_key(key).await?;
        let path = self.entry_path(key);
        blocking(move || write_entry(&path, &value, ttl)).await
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let _guard = self.lock_key(key).await?;
        let path = self.entry_path(key);
        blocking(move || {
            if read_live(&path)?.is_some() {
                return Ok(false);
            }
            write_entry(&path, &value, Some(ttl))?;
            Ok(true)
        })
        .await
    }

    async fn delete_if(
        &self,
        key: &str,
        predicate: &(dyn for<'v> Fn(&'v [u8]) -> bool + Send + Sync),
    ) -> Result<bool> {
        let _guard = self.lock_key(key).await?;
        let path = self.entry_path(key);
        let current = {
            let path = path.clone();
            blocking(move || read_live(&path)).await?
        };
        match current {
            // Predicate is borrowed; evaluate it here while the guard is held.
            Some((value, _)) if predicate(&value) => {
                blocking(move || remove_entry(&path)).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
