//! Tests for the ownership metadata channel.

use super::*;
use crate::error::MetaLockError;
use crate::store::{BackingStore, MemoryStore, Ttl};
use crate::test_support::{DelayedStore, memory_stores};
use std::sync::Arc;
use std::time::Duration;

fn fixed() -> OwnershipRecord {
    [("app", "AAA")].into_iter().collect()
}

fn options() -> MetadataOptions {
    MetadataOptions {
        io_timeout: Duration::from_millis(200),
        capture_stack_trace: false,
    }
}

fn ownership(stores: Vec<Arc<dyn BackingStore>>) -> OwnershipStore {
    OwnershipStore::new("TestLock", stores, fixed(), options()).unwrap()
}

async fn seed(stores: &[Arc<MemoryStore>], value: &[u8], ttl: Option<Duration>) {
    for store in stores {
        store.set("TestLock", value.to_vec(), ttl).await.unwrap();
    }
}

// ========================================================================
// Codec
// ========================================================================

#[test]
fn codec_round_trips_empty_and_unicode_values() {
    let record: OwnershipRecord = [("app", "AAA"), ("note", ""), ("who", "Zoë 🦀")]
        .into_iter()
        .collect();

    let encoded = codec::encode(&record).unwrap();
    let decoded = codec::decode(Some(&encoded)).unwrap().unwrap();

    assert_eq!(decoded, record);
    assert_eq!(decoded.get("note"), Some(""));
}

#[test]
fn codec_round_trips_an_empty_record_as_present() {
    let encoded = codec::encode(&OwnershipRecord::new()).unwrap();

    assert_eq!(encoded, b"{}".to_vec());
    assert_eq!(codec::decode(Some(&encoded)).unwrap(), Some(OwnershipRecord::new()));
}

#[test]
fn codec_treats_absent_or_empty_value_as_no_record() {
    assert_eq!(codec::decode(None).unwrap(), None);
    assert_eq!(codec::decode(Some(b"")).unwrap(), None);
}

#[test]
fn codec_rejects_values_that_are_not_records() {
    for value in [&b"not json"[..], b"[1,2]", b"{\"app\":3}", b"a-uuid-token"] {
        let result = codec::decode(Some(value));
        assert!(matches!(result, Err(MetaLockError::Codec(_))), "{:?}", value);
    }
}

#[test]
fn codec_output_is_independent_of_insertion_order() {
    let mut a = OwnershipRecord::new();
    a.insert("zeta", "1");
    a.insert("alpha", "2");
    let b: OwnershipRecord = [("alpha", "2"), ("zeta", "1")].into_iter().collect();

    assert_eq!(codec::encode(&a).unwrap(), codec::encode(&b).unwrap());
    assert_eq!(codec::encode(&a).unwrap(), br#"{"alpha":"2","zeta":"1"}"#.to_vec());
}

// ========================================================================
// Record
// ========================================================================

#[test]
fn stamped_record_overrides_caller_supplied_reserved_keys() {
    let mut caller = fixed();
    caller.insert(ORIGINAL_VALUE_KEY, "spoofed");
    caller.insert(PID_KEY, "0");

    let record = OwnershipRecord::stamped(&caller, "token-1", &ContextSnapshot::from_text("here"));

    assert_eq!(record.get("app"), Some("AAA"));
    assert_eq!(record.get(ORIGINAL_VALUE_KEY), Some("token-1"));
    assert_eq!(record.get(STACK_TRACE_KEY), Some("here"));
    assert_eq!(record.get(PID_KEY), Some(std::process::id().to_string().as_str()));
    for key in RESERVED_KEYS {
        assert!(record.contains_key(key), "missing {}", key);
    }
}

#[test]
fn record_age_comes_from_acquired_at() {
    let record = OwnershipRecord::stamped(&fixed(), "", &ContextSnapshot::from_text("t"));
    assert!(record.acquired_at().is_some());
    assert_eq!(record.age_string().as_deref(), Some("0s"));

    let mut old = OwnershipRecord::new();
    old.insert(ACQUIRED_AT_KEY, "2020-01-01T00:00:00.000Z");
    assert!(old.age().unwrap().num_days() > 365);

    assert_eq!(OwnershipRecord::new().age_string(), None);
}

#[test]
fn summary_skips_bulky_fields() {
    let record = OwnershipRecord::stamped(&fixed(), "tok", &ContextSnapshot::from_text("deep\ntrace"));
    let summary = record.summary();

    assert!(summary.contains("app=AAA"));
    assert!(summary.contains("owner="));
    assert!(!summary.contains("trace"));
    assert!(!summary.contains("tok"));
}

#[test]
fn context_capture_without_trace_names_the_thread() {
    let snapshot = std::thread::Builder::new()
        .name("worker-7".to_string())
        .spawn(|| ContextSnapshot::capture(false))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(snapshot.as_str(), "thread 'worker-7'");
}

// ========================================================================
// Write path
// ========================================================================

#[test]
fn ownership_store_requires_a_store() {
    let result = OwnershipStore::new("TestLock", Vec::new(), fixed(), options());
    assert!(matches!(result, Err(MetaLockError::Config(_))));
}

#[tokio::test]
async fn write_preserves_remaining_ttl_and_records_original_value() {
    let (concrete, stores) = memory_stores(2);
    seed(&concrete, b"token-1", Some(Duration::from_secs(5))).await;

    let report = ownership(stores)
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert!(report.is_complete());
    assert_eq!(report.record.get(ORIGINAL_VALUE_KEY), Some("token-1"));
    for store in &concrete {
        match store.time_to_live("TestLock").await.unwrap() {
            Ttl::Expires(left) => {
                assert!(left <= Duration::from_secs(5));
                assert!(left > Duration::from_secs(4));
            }
            other => panic!("expiry was not preserved: {:?}", other),
        }
        let stored = codec::decode(store.get("TestLock").await.unwrap().as_deref())
            .unwrap()
            .unwrap();
        assert_eq!(stored, report.record);
    }
}

#[tokio::test]
async fn write_keeps_persistent_keys_persistent() {
    let (concrete, stores) = memory_stores(1);
    seed(&concrete, b"token-1", None).await;

    let report = ownership(stores)
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert!(matches!(
        report.outcomes[0].result,
        StoreWrite::Written { ttl: Ttl::Persistent }
    ));
    assert_eq!(
        concrete[0].time_to_live("TestLock").await.unwrap(),
        Ttl::Persistent
    );
}

#[tokio::test]
async fn write_skips_stores_where_the_key_is_gone() {
    let (concrete, stores) = memory_stores(2);
    seed(&concrete[..1], b"token-1", Some(Duration::from_secs(5))).await;

    let report = ownership(stores)
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert!(matches!(report.outcomes[0].result, StoreWrite::Written { .. }));
    assert!(matches!(report.outcomes[1].result, StoreWrite::Skipped));
    assert_eq!(concrete[1].get("TestLock").await.unwrap(), None);
    assert_eq!(report.failures().count(), 0);
}

#[tokio::test]
async fn write_absorbs_failures_per_store() {
    let (concrete, stores) = memory_stores(3);
    seed(&concrete, b"token-1", Some(Duration::from_secs(5))).await;
    concrete[0].set_offline(true);

    let report = ownership(stores)
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert_eq!(report.written_count(), 2);
    assert!(!report.is_complete());
    let failed: Vec<_> = report.failures().map(|(store, _)| store).collect();
    assert_eq!(failed, vec!["mem-0"]);
    assert_eq!(report.record.get(ORIGINAL_VALUE_KEY), Some("token-1"));
}

#[tokio::test]
async fn write_with_every_store_down_still_returns_intended_record() {
    let (concrete, stores) = memory_stores(2);
    for store in &concrete {
        store.set_offline(true);
    }

    let report = ownership(stores)
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert_eq!(report.written_count(), 0);
    assert_eq!(report.failures().count(), 2);
    assert_eq!(report.record.get("app"), Some("AAA"));
    assert_eq!(report.record.get(ORIGINAL_VALUE_KEY), Some(""));
}

#[tokio::test]
async fn slow_store_is_cut_off_by_io_timeout() {
    let (concrete, _) = memory_stores(2);
    seed(&concrete, b"token-1", Some(Duration::from_secs(5))).await;
    let slow: Arc<dyn BackingStore> = Arc::new(DelayedStore::new(
        concrete[0].clone(),
        Duration::from_secs(2),
    ));
    let fast: Arc<dyn BackingStore> = concrete[1].clone();

    let started = std::time::Instant::now();
    let report = ownership(vec![slow, fast])
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        report.outcomes[0].result,
        StoreWrite::Failed(MetaLockError::Store(_))
    ));
    assert!(matches!(report.outcomes[1].result, StoreWrite::Written { .. }));
}

// ========================================================================
// Read path
// ========================================================================

#[tokio::test]
async fn read_returns_the_written_record() {
    let (concrete, stores) = memory_stores(3);
    seed(&concrete, b"token-1", Some(Duration::from_secs(5))).await;
    let channel = ownership(stores);
    let written = channel
        .record_ownership(&ContextSnapshot::from_text("t"))
        .await;

    let read = channel.read_ownership().await;

    assert_eq!(read.record, written.record);
    assert!(read.source.is_some());
}

#[tokio::test]
async fn read_of_missing_key_is_an_empty_success() {
    let (_, stores) = memory_stores(2);

    let read = ownership(stores).read_ownership().await;

    assert!(read.record.is_empty());
    assert!(read.source.is_some());
    assert!(read.errors.is_empty());
}

#[tokio::test]
async fn read_falls_back_past_offline_and_undecodable_stores() {
    let (concrete, stores) = memory_stores(3);
    concrete[0].set_offline(true);
    concrete[1]
        .set("TestLock", b"raw-token".to_vec(), None)
        .await
        .unwrap();
    let record = OwnershipRecord::stamped(&fixed(), "tok", &ContextSnapshot::from_text("t"));
    concrete[2]
        .set("TestLock", codec::encode(&record).unwrap(), None)
        .await
        .unwrap();

    let read = ownership(stores).read_ownership().await;

    assert_eq!(read.record, record);
    assert_eq!(read.source.as_deref(), Some("mem-2"));
    assert_eq!(read.errors.len(), 2);
}

#[tokio::test]
async fn read_with_every_store_failing_is_empty() {
    let (concrete, stores) = memory_stores(2);
    for store in &concrete {
        store.set_offline(true);
    }

    let read = ownership(stores).read_ownership().await;

    assert!(read.record.is_empty());
    assert_eq!(read.source, None);
    assert_eq!(read.errors.len(), 2);
}

#[tokio::test]
async fn read_prefers_the_fastest_healthy_store() {
    let (concrete, _) = memory_stores(2);
    let old: OwnershipRecord = [("app", "OLD")].into_iter().collect();
    concrete[0]
        .set("TestLock", codec::encode(&old).unwrap(), None)
        .await
        .unwrap();
    concrete[1]
        .set("TestLock", codec::encode(&fixed()).unwrap(), None)
        .await
        .unwrap();
    let slow: Arc<dyn BackingStore> = Arc::new(DelayedStore::new(
        concrete[0].clone(),
        Duration::from_millis(100),
    ));
    let fast: Arc<dyn BackingStore> = concrete[1].clone();

    let read = ownership(vec![slow, fast]).read_ownership().await;

    assert_eq!(read.record.get("app"), Some("AAA"));
    assert_eq!(read.source.as_deref(), Some("mem-1"));
}
