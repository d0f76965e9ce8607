//! Exit code constants for the metalock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, misuse of the blocking API)
//! - 2: Ownership record could not be encoded or decoded
//! - 3: Backing store failure
//! - 4: Lock is held by someone else (busy or timed out)
//! - 5: Acquisition cancelled

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Ownership record encode/decode failure.
pub const CODEC_FAILURE: i32 = 2;

/// Backing store I/O failure.
pub const STORE_FAILURE: i32 = 3;

/// Lock acquisition failure: the lock is held by another owner.
pub const LOCK_FAILURE: i32 = 4;

/// Acquisition was cancelled before the lock became available.
pub const CANCELLED: i32 = 5;
