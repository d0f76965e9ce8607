//! Command implementations for metalock.
//!
//! Each subcommand has its own module; this module dispatches to them and
//! holds the output helpers they share.

mod acquire;
mod demo;
mod inspect;

use crate::cli::{Cli, Command};
use metalock::Config;
use metalock::error::Result;
use metalock::metadata::{OwnershipRecord, STACK_TRACE_KEY};
use tokio_util::sync::CancellationToken;

/// Dispatch a command to its implementation.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Acquire(args) => {
            let config = Config::resolve(cli.config.as_deref())?;
            acquire::cmd_acquire(config, args).await
        }
        Command::Inspect => {
            let config = Config::resolve(cli.config.as_deref())?;
            inspect::cmd_inspect(config).await
        }
        Command::Demo(args) => demo::cmd_demo(args).await,
    }
}

/// Cancellation token fired by Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

/// Print a record one entry per line, with the stack trace cut to its first
/// few frames.
fn print_record(record: &OwnershipRecord) {
    if record.is_empty() {
        println!("  (no ownership record)");
        return;
    }
    for (key, value) in record.iter() {
        if key == STACK_TRACE_KEY {
            continue;
        }
        println!("  {}: {}", key, value);
    }
    if let Some(age) = record.age_string() {
        println!("  age: {}", age);
    }
    if let Some(trace) = record.get(STACK_TRACE_KEY) {
        println!("  {}:", STACK_TRACE_KEY);
        for line in trace.lines().take(6) {
            println!("    {}", line.trim_end());
        }
    }
}
