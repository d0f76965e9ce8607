//! Filesystem utilities for the directory-backed store.
//!
//! Entry files are replaced atomically so readers never observe a partial
//! write, and read-modify-write sequences on one key are serialized across
//! processes through an exclusive guard file.

pub mod atomic;
mod exclusive;

pub use atomic::atomic_write;
pub use exclusive::ExclusiveFile;
