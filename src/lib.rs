// ABOUTME: Library root for stowage - exposes backends and workflows for testing.
// ABOUTME: The main binary is in main.rs.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod images;
pub mod output;
pub mod process;
pub mod prompt;
pub mod syscontainer;
pub mod types;
