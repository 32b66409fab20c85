//! `bufconfig version`: print the resolved version of one file.

use super::OutputFormat;
use crate::config::{FileKind, FileVersion, resolve_file_version};
use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Arguments for the version command.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Configuration file, e.g. proto/buf.yaml
    pub file: String,
}

/// Resolve the version of the file at `path`.
pub fn file_version(path: &Path) -> Result<(FileKind, FileVersion)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("'{}' has no file name", path.display()))?;
    let kind = FileKind::from_file_name(file_name)
        .ok_or_else(|| anyhow!("'{}' is not a known configuration file name", file_name))?;
    let data = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    let version = resolve_file_version(kind, file_name, &data, false)
        .map_err(|err| err.with_file_name(&path.display().to_string()))?;
    Ok((kind, version))
}

fn latest_version(path: &Path, kind: FileKind) -> FileVersion {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_else(|| kind.default_file_name());
    kind.latest_version(file_name)
}

/// Run the version command.
pub fn run_version(args: &VersionArgs, format: OutputFormat) -> Result<()> {
    let (kind, version) = file_version(Path::new(&args.file))?;
    match format {
        OutputFormat::Text => println!("{}", version),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "file": args.file,
                "kind": kind.default_file_name(),
                "version": version.as_str(),
                "latest": version == latest_version(Path::new(&args.file), kind),
            })
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_version_defaults_lock_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("buf.lock");
        fs::write(&path, "deps: []\n").unwrap();
        let (kind, version) = file_version(&path).unwrap();
        assert_eq!(kind, FileKind::BufLock);
        assert_eq!(version, FileVersion::V1Beta1);
    }

    #[test]
    fn test_file_version_rejects_unknown_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "version: v2\n").unwrap();
        assert!(file_version(&path).is_err());
    }

    #[test]
    fn test_file_version_requires_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("buf.gen.yaml");
        fs::write(&path, "plugins: []\n").unwrap();
        let err = file_version(&path).unwrap_err();
        assert!(err.to_string().contains("no version set"));
    }
}
