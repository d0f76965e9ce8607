//! Configuration model for metalock.
//!
//! This module defines the Config struct that represents a `metalock.yaml`
//! file. It supports forward-compatible YAML parsing (unknown fields are
//! ignored), sensible defaults for optional fields, and validation of config
//! values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use operations::{CONFIG_ENV_VAR, resolve_path};
pub use types::StoreConfig;
