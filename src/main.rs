//! bufconfig
//!
//! Inspect, validate and migrate buf configuration files.

use anyhow::Result;
use bufconfig::cli::{Cli, Command, check, migrate, version, workspace};
use bufconfig::logging::{LogTarget, init_logging};
use clap::Parser;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;
    debug!(command = ?cli.command, "starting");

    match &cli.command {
        Command::Version(args) => version::run_version(args, cli.format),
        Command::Check(args) => check::run_check(args, cli.format),
        Command::Migrate(args) => migrate::run_migrate(args),
        Command::Workspace(args) => workspace::run_workspace(args, cli.format),
    }
}
