//! Application-level utilities for the notevault CLI.
//!
//! This module provides:
//! - Path resolution for config and vault directories
//! - Secret store selection
//! - The per-invocation [`AppContext`]

mod context;
mod resolver;

pub use context::AppContext;
pub use resolver::{build_secret_store, resolve_config_path};
