//! Finding the workspace that controls a directory.
//!
//! Starting at the target directory and climbing toward the bucket root, each
//! prefix is checked for a workspace file (`buf.work.yaml` or a v2 `buf.yaml`)
//! and for a single-module file (a v1beta1/v1 `buf.yaml` or `buf.mod`). The
//! first workspace that controls the target wins.

use super::buf_work;
use super::encoding;
use super::files;
use super::version::{FileKind, FileVersion, resolve_file_version};
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::ReadBucket;
use serde::Deserialize;
use tracing::debug;

/// The workspace controlling a target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateResult {
    /// No workspace controls the target.
    NotFound,
    /// A `buf.work.yaml` at `prefix`; `dir_paths` are its member directories
    /// joined onto `prefix`.
    BufWork {
        prefix: String,
        dir_paths: Vec<String>,
    },
    /// A v2 `buf.yaml` at `prefix`.
    BufYamlV2 { prefix: String },
}

impl TerminateResult {
    pub fn prefix(&self) -> Option<&str> {
        match self {
            TerminateResult::NotFound => None,
            TerminateResult::BufWork { prefix, .. } | TerminateResult::BufYamlV2 { prefix } => {
                Some(prefix)
            }
        }
    }
}

/// Only the module paths of a v2 `buf.yaml`.
#[derive(Debug, Default, Deserialize)]
struct ModulePathsV2 {
    #[serde(default)]
    modules: Vec<ModulePathV2>,
}

#[derive(Debug, Default, Deserialize)]
struct ModulePathV2 {
    #[serde(default)]
    path: String,
}

fn v2_module_dirs(data: &[u8]) -> ConfigResult<Vec<String>> {
    let external: ModulePathsV2 = encoding::decode(data, false)?;
    if external.modules.is_empty() {
        return Ok(vec![".".to_string()]);
    }
    external
        .modules
        .iter()
        .map(|module| {
            if module.path.is_empty() {
                Ok(".".to_string())
            } else {
                normalpath::normalize_and_validate(&module.path)
            }
        })
        .collect()
}

/// What was found at one prefix.
enum Workspace {
    BufWork(Vec<String>),
    BufYamlV2(Vec<String>),
}

fn inspect_prefix(bucket: &dyn ReadBucket, prefix: &str) -> ConfigResult<Option<Workspace>> {
    let buf_work = files::find_file(bucket, prefix, FileKind::BufWorkYaml)?;
    let buf_yaml = files::find_file(bucket, prefix, FileKind::BufYaml)?;
    let buf_yaml_version = buf_yaml
        .as_ref()
        .map(|found| {
            resolve_file_version(FileKind::BufYaml, found.file_name, &found.data, false)
                .map_err(|err| err.with_file_name(&found.path))
        })
        .transpose()?;

    match (buf_work, buf_yaml, buf_yaml_version) {
        (Some(work), Some(yaml), Some(version)) => Err(ConfigError::invalid(format!(
            "{} and {} (version {}) cannot be in the same directory {:?}",
            work.file_name, yaml.file_name, version, prefix
        ))),
        (Some(work), _, _) => {
            let file = buf_work::decode_buf_work_yaml(work.file_name, &work.data)
                .map_err(|err| err.with_file_name(&work.path))?;
            Ok(Some(Workspace::BufWork(file.dir_paths().to_vec())))
        }
        (None, Some(yaml), Some(FileVersion::V2)) => {
            let dirs = v2_module_dirs(&yaml.data).map_err(|err| err.with_file_name(&yaml.path))?;
            Ok(Some(Workspace::BufYamlV2(dirs)))
        }
        _ => Ok(None),
    }
}

/// Find the workspace that controls `target`.
///
/// A workspace at a prefix controls the target when the prefix is the target,
/// when the target is one of the workspace's directories, or always when
/// `relaxed` is set (used for single-file targets). A workspace that does not
/// control the target is skipped and the climb continues.
pub fn find_controlling_workspace(
    bucket: &dyn ReadBucket,
    target: &str,
    relaxed: bool,
) -> ConfigResult<TerminateResult> {
    let target = normalpath::normalize_and_validate(target)?;
    for prefix in normalpath::ancestors(&target) {
        let Some(workspace) = inspect_prefix(bucket, &prefix)? else {
            continue;
        };
        let relative = normalpath::rel(&prefix, &target).unwrap_or_else(|| ".".to_string());
        let (Workspace::BufWork(dirs) | Workspace::BufYamlV2(dirs)) = &workspace;
        if !(prefix == target || relaxed || dirs.contains(&relative)) {
            debug!(prefix = %prefix, target = %target, "workspace does not list target, continuing");
            continue;
        }
        return Ok(match workspace {
            Workspace::BufWork(dirs) => {
                debug!(prefix = %prefix, target = %target, "buf.work.yaml controls target");
                let dir_paths = dirs.iter().map(|dir| normalpath::join(&prefix, dir)).collect();
                TerminateResult::BufWork { prefix, dir_paths }
            }
            Workspace::BufYamlV2(_) => {
                debug!(prefix = %prefix, target = %target, "v2 buf.yaml controls target");
                TerminateResult::BufYamlV2 { prefix }
            }
        });
    }
    Ok(TerminateResult::NotFound)
}
