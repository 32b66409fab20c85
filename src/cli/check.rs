//! `bufconfig check`: decode every configuration file in a directory.

use super::{LoadedFile, OutputFormat, find_files};
use crate::config::FileKind;
use crate::storage::OsBucket;
use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::debug;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory to check
    #[arg(default_value = ".")]
    pub dir: String,
}

/// Outcome for one file.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub path: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decode every configuration file in `dir` of `bucket`.
pub fn check_dir(bucket: &OsBucket, dir: &str) -> Result<Vec<CheckReport>> {
    let mut reports = Vec::new();
    for (kind, found) in find_files(bucket, dir)? {
        debug!(path = %found.path, "checking");
        let report = match LoadedFile::decode(bucket, dir, kind, &found) {
            Ok(file) => CheckReport {
                path: found.path.clone(),
                kind: kind_name(kind),
                version: Some(file.file_version().to_string()),
                error: None,
            },
            Err(err) => CheckReport {
                path: found.path.clone(),
                kind: kind_name(kind),
                version: None,
                error: Some(err.to_string()),
            },
        };
        reports.push(report);
    }
    Ok(reports)
}

fn kind_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::BufYaml => "module",
        FileKind::BufLock => "lock",
        FileKind::BufGenYaml => "generate",
        FileKind::BufWorkYaml => "workspace",
    }
}

/// Run the check command.
pub fn run_check(args: &CheckArgs, format: OutputFormat) -> Result<()> {
    let bucket = OsBucket::new(&args.dir);
    let reports = check_dir(&bucket, ".")?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            if reports.is_empty() {
                println!("No configuration files found in '{}'.", args.dir);
            }
            for report in &reports {
                match (&report.version, &report.error) {
                    (_, Some(error)) => println!("FAIL {}", error),
                    (Some(version), None) => println!("ok   {} ({})", report.path, version),
                    (None, None) => println!("ok   {}", report.path),
                }
            }
        }
    }
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        bail!("{} configuration file(s) failed to decode", failed);
    }
    Ok(())
}
