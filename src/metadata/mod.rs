//! Ownership metadata channel.
//!
//! Every successful acquisition overwrites the lock key on each backing store
//! with a JSON record describing the holder:
//! - caller-fixed entries (e.g. `app`)
//! - `originalValue`: what the key held just before the write
//! - `stackTrace`: the acquiring call's context
//! - `acquiredAt`, `owner`, `pid`: when and by whom it was written
//!
//! Failed contenders read that record back so "who holds this?" can be
//! answered without external tooling. The channel is advisory: it may be
//! stale, briefly absent, or disagree between stores.

pub mod codec;
mod record;
mod store;

#[cfg(test)]
mod tests;

pub use record::{
    ACQUIRED_AT_KEY, ContextSnapshot, ORIGINAL_VALUE_KEY, OWNER_KEY, OwnershipRecord, PID_KEY,
    RESERVED_KEYS, STACK_TRACE_KEY,
};
pub use store::{
    MetadataOptions, OwnershipStore, ReadReport, StoreWrite, StoreWriteOutcome, WriteReport,
};
