//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flowkit - Run IC design flows as a dependency graph of steps.
#[derive(Debug, Parser)]
#[command(name = "flowkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the whole flow, or a single step
    Run(RunArgs),

    /// Print the execution order of the declared steps
    Order(OrderArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Dependency document(s), merged in order
    #[arg(short, long = "dependency", required = true, num_args = 1..)]
    pub dependency: Vec<PathBuf>,

    /// Run configuration document(s), merged in order
    #[arg(short, long = "config", required = true, num_args = 1..)]
    pub config: Vec<PathBuf>,

    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    pub project_dir: Option<PathBuf>,

    /// Run only this step
    #[arg(short, long)]
    pub step: Option<String>,

    /// Run even if predecessors have not finished
    #[arg(short, long)]
    pub force: bool,

    /// Keep running independent steps after a failure
    #[arg(short = 'k', long)]
    pub continue_on_failure: bool,

    /// Let steps run after a failed predecessor
    #[arg(long)]
    pub ignore_failed: bool,

    /// Log resolved commands without executing them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Maximum steps running at once (defaults to the CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Attempts per step before giving up
    #[arg(long, value_name = "N")]
    pub retries: Option<u64>,
}

/// Arguments for the `order` command.
#[derive(Debug, Clone, clap::Args)]
pub struct OrderArgs {
    /// Dependency document(s), merged in order
    #[arg(short, long = "dependency", required = true, num_args = 1..)]
    pub dependency: Vec<PathBuf>,

    /// Group steps into waves that can run concurrently
    #[arg(short, long)]
    pub waves: bool,

    /// Print the order as JSON
    #[arg(long)]
    pub json: bool,
}
