use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for the system notification service.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Log filter directive, e.g. `debug` or `sysnotify=trace`.
    #[arg(long)]
    pub log: Option<String>,
    /// Queue capacity of ports created without an explicit one.
    #[arg(long)]
    pub port_capacity: Option<usize>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the line-delimited JSON protocol on stdin/stdout (default).
    Run,
    /// Print the interest flags and opcodes understood by the service.
    Describe,
}
