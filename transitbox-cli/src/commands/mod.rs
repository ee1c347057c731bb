//! CLI subcommands.

pub mod config;
pub mod decode;
pub mod sources;
pub mod watch;
