//! Implementation of the `metalock demo` command.
//!
//! Two lock instances share three in-memory stores. The first (`app=AAA`)
//! takes the lock and keeps it; the second (`app=BBB`) gives up after the
//! timeout and reports who is in the way.

use super::print_record;
use crate::cli::DemoArgs;
use metalock::error::Result;
use metalock::{
    BackingStore, CancellationToken, LockHandle, LockOptions, MemoryStore, MetaLock,
    OwnershipRecord,
};
use std::sync::Arc;
use std::time::Duration;

const DEMO_LOCK: &str = "TestLock";

/// Execute the `metalock demo` command.
pub async fn cmd_demo(args: DemoArgs) -> Result<()> {
    let stores: Vec<Arc<dyn BackingStore>> = (0..3)
        .map(|i| Arc::new(MemoryStore::new(format!("memory-{}", i))) as Arc<dyn BackingStore>)
        .collect();
    let app = |name: &str| -> OwnershipRecord { [("app", name)].into_iter().collect() };

    let first = MetaLock::new(DEMO_LOCK, stores.clone(), app("AAA"), LockOptions::default())?;
    let second = MetaLock::new(DEMO_LOCK, stores, app("BBB"), LockOptions::default())?;
    let cancel = CancellationToken::new();

    let held = first
        .try_acquire_with_meta_async(Duration::from_secs(10), &cancel)
        .await?;
    println!("AAA acquired: {}", held.is_acquired());
    print_record(&held.metadata);

    let attempt = second
        .try_acquire_with_meta_async(Duration::from_millis(args.timeout_ms), &cancel)
        .await?;
    if attempt.is_acquired() {
        println!("BBB acquired the lock unexpectedly");
    } else {
        println!(
            "Resource is used by: {}",
            attempt.metadata.get("app").unwrap_or("<unknown>")
        );
    }

    if let Some(handle) = held.handle {
        handle.release().await?;
    }
    if let Some(handle) = attempt.handle {
        handle.release().await?;
    }
    Ok(())
}
