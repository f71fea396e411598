//! Command-line interface for flowkit.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, OrderArgs, RunArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
