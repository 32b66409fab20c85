//! CLI command definitions for bufconfig
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod check;
pub mod migrate;
pub mod version;
pub mod workspace;

use crate::config::{
    BufGenYamlFile, BufLockFile, BufWorkYamlFile, BufYamlFile, FileKind, FileVersion, FoundFile,
    OsFileProbe, decode_buf_gen_yaml, decode_buf_lock, decode_buf_work_yaml,
    decode_buf_yaml_with_probe, encode_buf_gen_yaml, encode_buf_lock, encode_buf_work_yaml,
    encode_buf_yaml, find_file,
};
use crate::error::ConfigResult;
use crate::storage::OsBucket;
use check::CheckArgs;
use clap::{Parser, Subcommand, ValueEnum};
use migrate::MigrateArgs;
use version::VersionArgs;
use workspace::WorkspaceArgs;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// One JSON document
    Json,
}

/// Inspect and migrate buf configuration files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved version of a configuration file
    Version(VersionArgs),

    /// Decode every configuration file in a directory and report problems
    Check(CheckArgs),

    /// Rewrite the configuration files in a directory in the latest version
    Migrate(MigrateArgs),

    /// Find the workspace that controls a directory
    Workspace(WorkspaceArgs),
}

/// A decoded configuration file of any kind.
#[derive(Debug)]
pub enum LoadedFile {
    BufYaml(BufYamlFile),
    BufLock(BufLockFile),
    BufGenYaml(BufGenYamlFile),
    BufWorkYaml(BufWorkYamlFile),
}

impl LoadedFile {
    /// Decode `found`, a file of `kind` in bucket directory `dir`.
    pub fn decode(bucket: &OsBucket, dir: &str, kind: FileKind, found: &FoundFile) -> ConfigResult<Self> {
        let decoded = match kind {
            FileKind::BufYaml => {
                let probe = OsFileProbe::new(bucket.root().join(dir));
                decode_buf_yaml_with_probe(found.file_name, &found.data, false, &probe)
                    .map(LoadedFile::BufYaml)
            }
            FileKind::BufLock => decode_buf_lock(&found.data).map(LoadedFile::BufLock),
            FileKind::BufGenYaml => {
                decode_buf_gen_yaml(&found.data, false).map(LoadedFile::BufGenYaml)
            }
            FileKind::BufWorkYaml => {
                decode_buf_work_yaml(found.file_name, &found.data).map(LoadedFile::BufWorkYaml)
            }
        };
        decoded.map_err(|err| err.with_file_name(&found.path))
    }

    pub fn file_version(&self) -> FileVersion {
        match self {
            LoadedFile::BufYaml(file) => file.file_version(),
            LoadedFile::BufLock(file) => file.file_version(),
            LoadedFile::BufGenYaml(file) => file.file_version(),
            LoadedFile::BufWorkYaml(file) => file.file_version(),
        }
    }

    /// Encode in the latest version of the file kind.
    pub fn encode(&self) -> ConfigResult<Vec<u8>> {
        match self {
            LoadedFile::BufYaml(file) => encode_buf_yaml(file),
            LoadedFile::BufLock(file) => encode_buf_lock(file),
            LoadedFile::BufGenYaml(file) => encode_buf_gen_yaml(file),
            LoadedFile::BufWorkYaml(file) => encode_buf_work_yaml(file),
        }
    }
}

/// Every configuration file present in `dir`, in [`FileKind::ALL`] order.
pub fn find_files(bucket: &OsBucket, dir: &str) -> ConfigResult<Vec<(FileKind, FoundFile)>> {
    let mut found = Vec::new();
    for kind in FileKind::ALL {
        if let Some(file) = find_file(bucket, dir, kind)? {
            found.push((kind, file));
        }
    }
    Ok(found)
}
