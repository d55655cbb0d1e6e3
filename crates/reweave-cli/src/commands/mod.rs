//! CLI subcommand implementations.

pub mod dump;
pub mod verify;
pub mod weave;
