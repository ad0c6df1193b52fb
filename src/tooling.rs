//! Tooling & Integration Layer
//!
//! Command-line access to the path index for operators: rebuilds, lookups, root segments
//! and diagnostics.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
