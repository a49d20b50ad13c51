//! Subcommand implementations

pub mod cluster;
pub mod predict;
pub mod status;
