//! Error types for metalock.
//!
//! Uses thiserror for derive macros. Only lock-level failures (timeout,
//! cancellation) and construction errors reach callers of the facade; store
//! and codec errors on the metadata path are absorbed into reports.

use crate::exit_codes;
use crate::metadata::OwnershipRecord;
use thiserror::Error;

/// Main error type for metalock operations.
#[derive(Error, Debug)]
pub enum MetaLockError {
    /// Invalid construction input or configuration.
    #[error("{0}")]
    Config(String),

    /// A blocking acquire gave up after its timeout elapsed.
    ///
    /// `holder` is the best-effort ownership record read at failure time.
    #[error("timed out acquiring lock '{name}'")]
    Timeout { name: String, holder: OwnershipRecord },

    /// The caller's cancellation token fired before the lock was obtained.
    #[error("acquisition of lock '{name}' was cancelled")]
    Cancelled { name: String, holder: OwnershipRecord },

    /// A backing store operation failed.
    #[error("store operation failed: {0}")]
    Store(String),

    /// An ownership record could not be encoded or decoded.
    #[error("metadata codec error: {0}")]
    Codec(String),

    /// The async runtime needed by a blocking call was unavailable.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl MetaLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MetaLockError::Config(_) => exit_codes::USER_ERROR,
            MetaLockError::Runtime(_) => exit_codes::USER_ERROR,
            MetaLockError::Codec(_) => exit_codes::CODEC_FAILURE,
            MetaLockError::Store(_) => exit_codes::STORE_FAILURE,
            MetaLockError::Timeout { .. } => exit_codes::LOCK_FAILURE,
            MetaLockError::Cancelled { .. } => exit_codes::CANCELLED,
        }
    }

    /// The holder record attached to a timeout or cancellation, if any.
    pub fn holder(&self) -> Option<&OwnershipRecord> {
        match self {
            MetaLockError::Timeout { holder, .. } | MetaLockError::Cancelled { holder, .. } => {
                Some(holder)
            }
            _ => None,
        }
    }

    pub(crate) fn with_holder(self, record: OwnershipRecord) -> Self {
        match self {
            MetaLockError::Timeout { name, .. } => MetaLockError::Timeout {
                name,
                holder: record,
            },
            MetaLockError::Cancelled { name, .. } => MetaLockError::Cancelled {
                name,
                holder: record,
            },
            other => other,
        }
    }
}

/// Result type alias for metalock operations.
pub type Result<T> = std::result::Result<T, MetaLockError>;
