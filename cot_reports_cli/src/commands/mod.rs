//! CLI subcommand implementations.

pub mod contracts;
pub mod families;
pub mod report;
