//! Implementation of the `metalock acquire` command.

use super::{interrupt_token, print_record};
use crate::cli::AcquireArgs;
use metalock::error::{MetaLockError, Result};
use metalock::{AcquireFailure, Config, LockHandle, MetadataReport};
use std::time::Duration;

/// Execute the `metalock acquire` command.
///
/// Busy and cancelled outcomes become `Timeout` / `Cancelled` errors carrying
/// the holder's record, so the process exits with the matching code.
pub async fn cmd_acquire(mut config: Config, args: AcquireArgs) -> Result<()> {
    config.metadata.extend(args.meta);
    let lock = config.build_lock()?;
    let cancel = interrupt_token();

    let attempt = lock
        .try_acquire_with_meta_async(Duration::from_millis(args.timeout_ms), &cancel)
        .await?;

    let Some(handle) = attempt.handle else {
        println!("Resource is used by: {}", attempt.metadata.summary());
        print_record(&attempt.metadata);
        if matches!(&attempt.report, MetadataReport::Read(report) if report.source.is_none()) {
            eprintln!("warning: no store answered the ownership read");
        }

        let name = lock.name().to_string();
        return Err(match attempt.failure {
            Some(AcquireFailure::Cancelled) => MetaLockError::Cancelled {
                name,
                holder: attempt.metadata,
            },
            _ => MetaLockError::Timeout {
                name,
                holder: attempt.metadata,
            },
        });
    };

    println!("Acquired lock '{}'", lock.name());
    print_record(&attempt.metadata);
    if let MetadataReport::Written(report) = &attempt.report {
        for (store, err) in report.failures() {
            eprintln!("warning: metadata not written to {}: {}", store, err);
        }
    }

    if args.hold_ms > 0 {
        tokio::select! {
            _ = cancel.cancelled() => println!("Interrupted, releasing"),
            _ = tokio::time::sleep(Duration::from_millis(args.hold_ms)) => {}
        }
    }

    handle.release().await?;
    println!("Released lock '{}'", lock.name());
    Ok(())
}
