//! Cross-process exclusive section backed by a `create_new` guard file.

use crate::error::{MetaLockError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Guard files older than this are assumed abandoned by a crashed process.
const STALE_AFTER: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// RAII guard for an exclusive guard file.
///
/// The file is created with `create_new` semantics, so only one holder exists
/// at a time. Dropping the guard deletes the file; if deletion fails a warning
/// is logged and the stale-takeover rule eventually frees it.
#[derive(Debug)]
pub struct ExclusiveFile {
    path: PathBuf,
}

impl ExclusiveFile {
    /// Wait up to `wait` to become the sole holder of `path`.
    pub async fn acquire(path: impl Into<PathBuf>, wait: Duration) -> Result<Self> {
        let path = path.into();
        let deadline = Instant::now() + wait;

        loop {
            match try_create(&path) {
                Ok(()) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        tracing::warn!(guard = %path.display(), "removing stale guard file");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                }
                Err(e) => {
                    return Err(MetaLockError::Store(format!(
                        "failed to create guard file '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }

            if Instant::now() >= deadline {
                return Err(MetaLockError::Store(format!(
                    "timed out waiting for guard file '{}'",
                    path.display()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Get the path to the guard file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusiveFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(guard = %self.path.display(), error = %e, "failed to remove guard file");
        }
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    // Holder pid helps when inspecting a leftover guard by hand.
    let _ = write!(file, "{}", std::process::id());
    Ok(())
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_AFTER)
}
