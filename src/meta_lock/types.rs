//! Result and option types for the meta-lock facade.

use crate::metadata::{MetadataOptions, OwnershipRecord, ReadReport, WriteReport};
use crate::primitive::QuorumOptions;

/// Construction-time tuning, passed through to the primitive and the
/// metadata channel.
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    pub quorum: QuorumOptions,
    pub metadata: MetadataOptions,
}

/// Why a try-acquire came back without a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireFailure {
    /// The lock stayed held by someone else until the timeout.
    Busy,
    /// The caller's cancellation token fired first.
    Cancelled,
}

/// Best-effort metadata I/O attached to an acquisition.
#[derive(Debug)]
pub enum MetadataReport {
    /// The lock was obtained and the record written.
    Written(WriteReport),
    /// The lock was not obtained and the holder's record read back.
    Read(ReadReport),
}

/// Outcome of a try-acquire: an optional handle plus ownership metadata.
///
/// With a handle, `metadata` is the record just written. Without one it is
/// the current holder's record, possibly empty.
#[derive(Debug)]
pub struct MetaAcquisition<H> {
    pub handle: Option<H>,
    pub metadata: OwnershipRecord,
    pub failure: Option<AcquireFailure>,
    pub report: MetadataReport,
}

impl<H> MetaAcquisition<H> {
    pub fn is_acquired(&self) -> bool {
        self.handle.is_some()
    }

    pub fn into_parts(self) -> (Option<H>, OwnershipRecord) {
        (self.handle, self.metadata)
    }
}

/// Outcome of a successful blocking acquire.
#[derive(Debug)]
pub struct MetaGrant<H> {
    pub handle: H,
    /// The record just written.
    pub metadata: OwnershipRecord,
    pub report: WriteReport,
}

impl<H> MetaGrant<H> {
    pub fn into_parts(self) -> (H, OwnershipRecord) {
        (self.handle, self.metadata)
    }
}
