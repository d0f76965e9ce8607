//! CLI argument parsing for metalock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// metalock: a distributed mutex that tells you who holds it.
///
/// Acquisitions stamp an ownership record onto the lock key of every
/// configured store; failed contenders read it back.
#[derive(Parser, Debug)]
#[command(name = "metalock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a metalock.yaml config (falls back to $METALOCK_CONFIG).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for metalock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Try to acquire the configured lock and hold it.
    ///
    /// Prints the ownership record on success. When the lock stays busy,
    /// prints the current holder and exits with code 4.
    Acquire(AcquireArgs),

    /// Print the current ownership record without acquiring.
    Inspect,

    /// Run two in-process contenders against shared in-memory stores.
    Demo(DemoArgs),
}

/// Arguments for the `acquire` command.
#[derive(Args, Debug)]
pub struct AcquireArgs {
    /// How long to keep trying before giving up.
    #[arg(long, default_value_t = 0, value_name = "MS")]
    pub timeout_ms: u64,

    /// How long to hold the lock once acquired (Ctrl-C releases early).
    #[arg(long, default_value_t = 0, value_name = "MS")]
    pub hold_ms: u64,

    /// Extra metadata entries for this acquisition, e.g. `--meta app=billing`.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,
}

/// Arguments for the `demo` command.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// How long the second contender waits before giving up.
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub timeout_ms: u64,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
