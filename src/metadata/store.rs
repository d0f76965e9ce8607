//! Replication of the ownership record across backing stores.
//!
//! The record lives at the lock key itself, overwriting the primitive's
//! token. Writes fan out to every store and preserve each key's remaining
//! TTL; reads race all stores and keep the first successful answer.
//!
//! Nothing here is transactional. Between the primitive reporting success
//! and the write landing, contenders can read the previous holder's record;
//! after a release, contenders can read a record describing a holder that is
//! already gone. Stores can also disagree with each other, and the read path
//! does not reconcile them.

use super::codec;
use super::record::{ContextSnapshot, OwnershipRecord};
use crate::error::{MetaLockError, Result};
use crate::store::{BackingStore, Ttl};
use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Tuning for the metadata channel.
#[derive(Debug, Clone)]
pub struct MetadataOptions {
    /// Upper bound for each individual store call on the metadata path.
    pub io_timeout: Duration,

    /// Record a full backtrace in `stackTrace` (otherwise the thread name).
    pub capture_stack_trace: bool,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(2),
            capture_stack_trace: true,
        }
    }
}

/// What happened to the metadata write on one store.
#[derive(Debug)]
pub enum StoreWrite {
    /// The record was written with the key's previous TTL re-applied.
    Written { ttl: Ttl },
    /// The key was gone, so writing would have resurrected an expired lock.
    Skipped,
    /// The store failed; the error was absorbed.
    Failed(MetaLockError),
}

/// Per-store entry of a [`WriteReport`].
#[derive(Debug)]
pub struct StoreWriteOutcome {
    pub store: String,
    pub result: StoreWrite,
}

/// Best-effort result of a metadata write.
#[derive(Debug)]
pub struct WriteReport {
    /// The record written to the first store that accepted it, or the record
    /// that would have been written if none did.
    pub record: OwnershipRecord,

    /// One outcome per store, in store order.
    pub outcomes: Vec<StoreWriteOutcome>,
}

impl WriteReport {
    pub fn written_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, StoreWrite::Written { .. }))
            .count()
    }

    /// Whether every store accepted the record.
    pub fn is_complete(&self) -> bool {
        self.written_count() == self.outcomes.len()
    }

    /// Absorbed errors, labelled by store.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &MetaLockError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            StoreWrite::Failed(err) => Some((o.store.as_str(), err)),
            _ => None,
        })
    }
}

/// Best-effort result of a metadata read.
#[derive(Debug, Default)]
pub struct ReadReport {
    /// Decoded record, empty when nothing usable was found.
    pub record: OwnershipRecord,

    /// Label of the store that answered first, if any did.
    pub source: Option<String>,

    /// Errors from stores that failed before a winner was found.
    pub errors: Vec<(String, MetaLockError)>,
}

/// Writes and reads the ownership record for one lock key.
pub struct OwnershipStore {
    key: String,
    stores: Vec<Arc<dyn BackingStore>>,
    fixed: OwnershipRecord,
    options: MetadataOptions,
}

impl OwnershipStore {
    /// `stores` must be non-empty; `fixed` holds the caller's entries.
    pub fn new(
        key: impl Into<String>,
        stores: Vec<Arc<dyn BackingStore>>,
        fixed: OwnershipRecord,
        options: MetadataOptions,
    ) -> Result<Self> {
        if stores.is_empty() {
            return Err(MetaLockError::Config(
                "at least one backing store is required".to_string(),
            ));
        }
        Ok(Self {
            key: key.into(),
            stores,
            fixed,
            options,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fixed(&self) -> &OwnershipRecord {
        &self.fixed
    }

    pub fn options(&self) -> &MetadataOptions {
        &self.options
    }

    /// Write the record to every store concurrently and wait for all of them.
    ///
    /// Never fails: per-store errors are kept in the report.
    pub async fn record_ownership(&self, context: &ContextSnapshot) -> WriteReport {
        let results = join_all(
            self.stores
                .iter()
                .map(|store| self.write_one(store.as_ref(), context)),
        )
        .await;

        let mut record = None;
        let mut outcomes = Vec::with_capacity(results.len());
        for (store, (result, written)) in self.stores.iter().zip(results) {
            if let StoreWrite::Failed(err) = &result {
                tracing::warn!(
                    lock = %self.key,
                    store = %store.label(),
                    error = %err,
                    "ownership metadata write failed"
                );
            }
            if record.is_none() {
                record = written;
            }
            outcomes.push(StoreWriteOutcome {
                store: store.label(),
                result,
            });
        }

        let report = WriteReport {
            record: record.unwrap_or_else(|| OwnershipRecord::stamped(&self.fixed, "", context)),
            outcomes,
        };
        tracing::debug!(
            lock = %self.key,
            written = report.written_count(),
            stores = report.outcomes.len(),
            "ownership metadata recorded"
        );
        report
    }

    /// TTL read, value read, then write; three round trips on one store.
    async fn write_one(
        &self,
        store: &dyn BackingStore,
        context: &ContextSnapshot,
    ) -> (StoreWrite, Option<OwnershipRecord>) {
        let ttl = match self.bounded(store.time_to_live(&self.key)).await {
            Ok(ttl) => ttl,
            Err(err) => return (StoreWrite::Failed(err), None),
        };
        let Some(expiry) = ttl.preserved_expiry() else {
            return (StoreWrite::Skipped, None);
        };

        let original_value = match self.bounded(store.get(&self.key)).await {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => String::new(),
            Err(err) => {
                tracing::debug!(
                    lock = %self.key,
                    store = %store.label(),
                    error = %err,
                    "original value unavailable"
                );
                String::new()
            }
        };

        let record = OwnershipRecord::stamped(&self.fixed, original_value, context);
        let encoded = match codec::encode(&record) {
            Ok(encoded) => encoded,
            Err(err) => return (StoreWrite::Failed(err), None),
        };

        match self.bounded(store.set(&self.key, encoded, expiry)).await {
            Ok(()) => (StoreWrite::Written { ttl }, Some(record)),
            Err(err) => (StoreWrite::Failed(err), None),
        }
    }

    /// Read the record from whichever store answers successfully first.
    ///
    /// A store holding a value that does not decode counts as failed, so a
    /// healthier store can still win. When all stores fail the record is
    /// empty.
    pub async fn read_ownership(&self) -> ReadReport {
        let mut pending: FuturesUnordered<_> = self
            .stores
            .iter()
            .map(|store| async move {
                let result = self
                    .bounded(store.get(&self.key))
                    .await
                    .and_then(|value| codec::decode(value.as_deref()));
                (store.label(), result)
            })
            .collect();

        let mut report = ReadReport::default();
        while let Some((label, result)) = pending.next().await {
            match result {
                Ok(record) => {
                    report.record = record.unwrap_or_default();
                    report.source = Some(label);
                    break;
                }
                Err(err) => {
                    tracing::debug!(
                        lock = %self.key,
                        store = %label,
                        error = %err,
                        "ownership metadata read failed"
                    );
                    report.errors.push((label, err));
                }
            }
        }

        if report.source.is_none() {
            tracing::warn!(
                lock = %self.key,
                failures = report.errors.len(),
                "no store returned ownership metadata"
            );
        }
        report
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.options.io_timeout, call)
            .await
            .map_err(|_| {
                MetaLockError::Store(format!(
                    "metadata call on '{}' exceeded {:?}",
                    self.key, self.options.io_timeout
                ))
            })?
    }
}
