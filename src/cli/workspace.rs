//! `bufconfig workspace`: find the workspace controlling a directory.

use super::OutputFormat;
use crate::config::{TerminateResult, find_controlling_workspace};
use crate::storage::OsBucket;
use anyhow::Result;
use clap::Args;
use serde_json::json;

/// Arguments for the workspace command.
#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    /// Root directory of the search; the climb never goes above it
    pub root: String,

    /// Target directory, relative to the root
    #[arg(default_value = ".")]
    pub target: String,

    /// Accept any workspace found on the way up (for single-file targets)
    #[arg(long)]
    pub relaxed: bool,
}

/// Run the workspace command.
pub fn run_workspace(args: &WorkspaceArgs, format: OutputFormat) -> Result<()> {
    let bucket = OsBucket::new(&args.root);
    let result = find_controlling_workspace(&bucket, &args.target, args.relaxed)?;
    match format {
        OutputFormat::Json => {
            let value = match &result {
                TerminateResult::NotFound => json!({ "kind": "none" }),
                TerminateResult::BufWork { prefix, dir_paths } => json!({
                    "kind": "buf.work.yaml",
                    "prefix": prefix,
                    "directories": dir_paths,
                }),
                TerminateResult::BufYamlV2 { prefix } => json!({
                    "kind": "buf.yaml",
                    "prefix": prefix,
                }),
            };
            println!("{}", value);
        }
        OutputFormat::Text => match &result {
            TerminateResult::NotFound => {
                println!("No workspace controls '{}'.", args.target)
            }
            TerminateResult::BufWork { prefix, dir_paths } => {
                println!("buf.work.yaml at '{}'", prefix);
                for dir in dir_paths {
                    println!("  {}", dir);
                }
            }
            TerminateResult::BufYamlV2 { prefix } => println!("buf.yaml (v2) at '{}'", prefix),
        },
    }
    Ok(())
}
