//! Migration command for rewriting configuration files in the latest version.

use super::{LoadedFile, find_files};
use crate::config::{FileKind, FileVersion};
use crate::normalpath;
use crate::storage::{OsBucket, WriteBucket};
use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use tracing::info;

/// Arguments for the migrate command.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Directory holding the configuration files
    #[arg(default_value = ".")]
    pub dir: String,

    /// Perform migration without prompting for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Show what would be migrated without making changes.
    #[arg(long)]
    pub dry_run: bool,
}

/// One file that needs rewriting.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    /// Path the file was read from.
    pub from: String,
    /// Path the file is written to.
    pub to: String,
    pub from_version: FileVersion,
    pub data: Vec<u8>,
}

/// Work out which files in `dir` would change when written in the latest version.
pub fn plan_migration(bucket: &OsBucket, dir: &str) -> Result<Vec<MigrationStep>> {
    let mut steps = Vec::new();
    for (kind, found) in find_files(bucket, dir)? {
        let file = LoadedFile::decode(bucket, dir, kind, &found)?;
        let data = file
            .encode()
            .map_err(|err| err.with_file_name(&found.path))?;
        let to = normalpath::join(dir, kind.default_file_name());
        if to == found.path && data == found.data {
            continue;
        }
        steps.push(MigrationStep {
            from: found.path,
            to,
            from_version: file.file_version(),
            data,
        });
    }
    Ok(steps)
}

/// Write every planned file, removing legacy names (`buf.mod`, `buf.work`)
/// that were replaced.
pub fn apply_migration(bucket: &OsBucket, steps: &[MigrationStep]) -> Result<()> {
    for step in steps {
        bucket.put_atomic(&step.to, &step.data)?;
        if step.from != step.to {
            let legacy = bucket.root().join(&step.from);
            fs::remove_file(&legacy)
                .with_context(|| format!("Failed to remove '{}'", legacy.display()))?;
        }
        info!(from = %step.from, to = %step.to, "migrated");
    }
    Ok(())
}

fn latest_version_label(path: &str) -> FileVersion {
    let file_name = normalpath::base(path);
    FileKind::from_file_name(file_name)
        .map(|kind| kind.latest_version(file_name))
        .unwrap_or(FileVersion::V2)
}

/// Run the migration command.
pub fn run_migrate(args: &MigrateArgs) -> Result<()> {
    let bucket = OsBucket::new(&args.dir);
    let steps = plan_migration(&bucket, ".")?;

    if steps.is_empty() {
        println!("No migration needed: '{}' is already up to date.", args.dir);
        return Ok(());
    }

    // Show what will be migrated
    println!("Migration plan:");
    for step in &steps {
        let latest = latest_version_label(&step.to);
        if step.from == step.to {
            println!("  {} ({} -> {})", step.from, step.from_version, latest);
        } else {
            println!(
                "  {} ({}) -> {} ({})",
                step.from, step.from_version, step.to, latest
            );
        }
    }
    println!();

    if args.dry_run {
        for step in &steps {
            println!("--- {}", step.to);
            print!("{}", String::from_utf8_lossy(&step.data));
        }
        println!();
        println!("Dry run: No changes made.");
        return Ok(());
    }

    // Confirm unless --yes
    if !args.yes {
        print!("Rewrite {} file(s)? [y/N] ", steps.len());
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Migration cancelled.");
            return Ok(());
        }
    }

    println!("Migrating...");
    apply_migration(&bucket, &steps)?;
    println!("Migration complete!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(temp: &TempDir, name: &str, data: &str) {
        fs::write(temp.path().join(name), data).unwrap();
    }

    #[test]
    fn test_migrate_dry_run_no_changes() {
        let temp = TempDir::new().unwrap();
        write(&temp, "buf.yaml", "version: v1\n");

        let args = MigrateArgs {
            dir: temp.path().to_string_lossy().to_string(),
            yes: false,
            dry_run: true,
        };
        run_migrate(&args).unwrap();

        let data = fs::read_to_string(temp.path().join("buf.yaml")).unwrap();
        assert_eq!(data, "version: v1\n");
    }

    #[test]
    fn test_migrate_rewrites_files() {
        let temp = TempDir::new().unwrap();
        write(
            &temp,
            "buf.gen.yaml",
            "version: v1\nplugins:\n- plugin: go\n  out: gen/go\n  path: custom-gen-go\n",
        );
        write(&temp, "buf.work.yaml", "version: v1\ndirectories:\n- proto\n");

        let args = MigrateArgs {
            dir: temp.path().to_string_lossy().to_string(),
            yes: true,
            dry_run: false,
        };
        run_migrate(&args).unwrap();

        let data = fs::read_to_string(temp.path().join("buf.gen.yaml")).unwrap();
        assert_eq!(data, "version: v2\nplugins:\n- local: custom-gen-go\n  out: gen/go\n");
        // Already canonical, left untouched.
        let data = fs::read_to_string(temp.path().join("buf.work.yaml")).unwrap();
        assert_eq!(data, "version: v1\ndirectories:\n- proto\n");
    }

    #[test]
    fn test_migrate_renames_buf_mod() {
        let temp = TempDir::new().unwrap();
        write(&temp, "buf.mod", "version: v1\nname: buf.build/acme/weather\n");

        let bucket = OsBucket::new(temp.path());
        let steps = plan_migration(&bucket, ".").unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].from, "buf.mod");
        assert_eq!(steps[0].to, "buf.yaml");
        apply_migration(&bucket, &steps).unwrap();

        assert!(!temp.path().join("buf.mod").exists());
        let data = fs::read_to_string(temp.path().join("buf.yaml")).unwrap();
        assert!(data.starts_with("version: v2\n"));
        assert!(data.contains("name: buf.build/acme/weather"));
    }

    #[test]
    fn test_migrate_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let args = MigrateArgs {
            dir: temp.path().to_string_lossy().to_string(),
            yes: true,
            dry_run: false,
        };
        run_migrate(&args).unwrap();
    }
}
