//! I/O helpers for CLI commands.

pub mod config;
pub mod graph_store;
pub mod scenario;
