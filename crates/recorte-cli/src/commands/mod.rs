//! CLI command implementations.

pub mod process;
pub mod sessions;
