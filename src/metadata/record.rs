//! The ownership record and the diagnostic fields stamped into it.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;

/// Value found at the lock key just before the metadata write.
pub const ORIGINAL_VALUE_KEY: &str = "originalValue";

/// Execution context of the acquiring call.
pub const STACK_TRACE_KEY: &str = "stackTrace";

/// RFC 3339 time of the metadata write.
pub const ACQUIRED_AT_KEY: &str = "acquiredAt";

/// `user@host` of the writing process.
pub const OWNER_KEY: &str = "owner";

/// Process id of the writer.
pub const PID_KEY: &str = "pid";

/// Keys the system writes on every acquisition. They take precedence over
/// caller-supplied entries with the same name.
pub const RESERVED_KEYS: [&str; 5] = [
    ORIGINAL_VALUE_KEY,
    STACK_TRACE_KEY,
    ACQUIRED_AT_KEY,
    OWNER_KEY,
    PID_KEY,
];

/// Flat string-to-string mapping describing the current (or last) holder of
/// a lock.
///
/// Keys are kept sorted so the encoded form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipRecord(BTreeMap<String, String>);

impl OwnershipRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the outgoing record for one store: the caller-fixed entries plus
    /// the reserved diagnostic fields.
    pub fn stamped(
        fixed: &OwnershipRecord,
        original_value: impl Into<String>,
        context: &ContextSnapshot,
    ) -> Self {
        let mut record = fixed.clone();
        record.insert(ORIGINAL_VALUE_KEY, original_value);
        record.insert(STACK_TRACE_KEY, context.as_str());
        record.insert(
            ACQUIRED_AT_KEY,
            context.taken_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        record.insert(OWNER_KEY, get_owner_string());
        record.insert(PID_KEY, std::process::id().to_string());
        record
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// When the record was written, if it carries a parseable timestamp.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.get(ACQUIRED_AT_KEY)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Age of the record, based on `acquiredAt`.
    pub fn age(&self) -> Option<Duration> {
        self.acquired_at()
            .map(|at| Utc::now().signed_duration_since(at))
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> Option<String> {
        let age = self.age()?;
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        Some(if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds.max(0))
        })
    }

    /// One-line summary for operators: every entry except the stack trace
    /// and the raw original value.
    pub fn summary(&self) -> String {
        self.iter()
            .filter(|(k, _)| *k != STACK_TRACE_KEY && *k != ORIGINAL_VALUE_KEY)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<BTreeMap<String, String>> for OwnershipRecord {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OwnershipRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Snapshot of the acquiring call's execution context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    trace: String,
    taken_at: DateTime<Utc>,
}

impl ContextSnapshot {
    /// Capture the current context. With `full_trace` a backtrace is
    /// recorded, otherwise only the thread name.
    pub fn capture(full_trace: bool) -> Self {
        let trace = if full_trace {
            Backtrace::force_capture().to_string()
        } else {
            let thread = std::thread::current();
            format!("thread '{}'", thread.name().unwrap_or("<unnamed>"))
        };
        Self::from_text(trace)
    }

    pub fn from_text(trace: impl Into<String>) -> Self {
        Self {
            trace: trace.into(),
            taken_at: Utc::now(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.trace
    }
}

/// Get the owner string for ownership records.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
