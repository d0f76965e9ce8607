//! Implementation of the `metalock inspect` command.

use super::print_record;
use metalock::Config;
use metalock::error::Result;

/// Execute the `metalock inspect` command.
pub async fn cmd_inspect(config: Config) -> Result<()> {
    let lock = config.build_lock()?;
    let report = lock.read_ownership().await;

    match &report.source {
        Some(store) => println!("Lock '{}' (answered by {})", lock.name(), store),
        None => println!("Lock '{}' (no store answered)", lock.name()),
    }
    print_record(&report.record);
    for (store, err) in &report.errors {
        eprintln!("warning: {}: {}", store, err);
    }
    Ok(())
}
