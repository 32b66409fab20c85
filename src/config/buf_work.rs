//! The legacy workspace manifest: `buf.work.yaml` (and `buf.work`).

use super::encoding;
use super::files;
use super::version::{FileKind, FileVersion, resolve_file_version};
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::{ReadBucket, WriteBucket};
use serde::{Deserialize, Serialize};

/// A workspace listing the directories of its modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufWorkYamlFile {
    dir_paths: Vec<String>,
}

impl BufWorkYamlFile {
    /// Build a workspace manifest. Directories are normalized, deduplicated and
    /// sorted; they may not be `"."` or contain one another.
    pub fn new(dir_paths: &[String]) -> ConfigResult<Self> {
        if dir_paths.is_empty() {
            return Err(ConfigError::invalid_field(
                "directories",
                "directories is empty, at least one directory is required",
            ));
        }
        let mut normalized = Vec::with_capacity(dir_paths.len());
        for raw in dir_paths {
            let path = normalpath::normalize_and_validate(raw).map_err(|err| {
                ConfigError::invalid_field(
                    "directories",
                    format!("invalid directory {:?}: {}", raw, err),
                )
            })?;
            if path == "." {
                return Err(ConfigError::invalid_field(
                    "directories",
                    format!(
                        "directory {:?} is the workspace root, which cannot be a workspace directory",
                        raw
                    ),
                ));
            }
            normalized.push(path);
        }
        normalized.sort();
        normalized.dedup();
        for outer in &normalized {
            for inner in &normalized {
                if normalpath::contains(outer, inner) {
                    return Err(ConfigError::invalid_field(
                        "directories",
                        format!("directory {:?} contains directory {:?}", outer, inner),
                    ));
                }
            }
        }
        Ok(Self {
            dir_paths: normalized,
        })
    }

    pub fn file_version(&self) -> FileVersion {
        FileVersion::V1
    }

    pub fn dir_paths(&self) -> &[String] {
        &self.dir_paths
    }
}

/// Decode a workspace manifest stored under `file_name`.
pub fn decode_buf_work_yaml(file_name: &str, data: &[u8]) -> ConfigResult<BufWorkYamlFile> {
    let decode = || -> ConfigResult<BufWorkYamlFile> {
        // Only v1 exists; the resolver rejects anything else.
        resolve_file_version(FileKind::BufWorkYaml, file_name, data, false)?;
        let external: ExternalBufWorkYamlFileV1 = encoding::decode(data, false)?;
        BufWorkYamlFile::new(&external.directories)
    };
    decode().map_err(|err| err.with_file_name(file_name))
}

pub fn encode_buf_work_yaml(file: &BufWorkYamlFile) -> ConfigResult<Vec<u8>> {
    let external = ExternalBufWorkYamlFileV1 {
        version: FileVersion::V1.to_string(),
        directories: file.dir_paths.clone(),
    };
    encoding::encode(&[], &external)
        .map_err(|err| err.with_file_name(FileKind::BufWorkYaml.default_file_name()))
}

/// Read the workspace manifest in `dir`, trying `buf.work.yaml` then `buf.work`.
pub fn read_buf_work_yaml(bucket: &dyn ReadBucket, dir: &str) -> ConfigResult<BufWorkYamlFile> {
    let found = files::read_file(bucket, dir, FileKind::BufWorkYaml)?;
    decode_buf_work_yaml(found.file_name, &found.data).map_err(|err| err.with_file_name(&found.path))
}

/// Write `file` as `buf.work.yaml` in `dir`.
pub fn put_buf_work_yaml(
    bucket: &dyn WriteBucket,
    dir: &str,
    file: &BufWorkYamlFile,
) -> ConfigResult<()> {
    let path = normalpath::join(dir, FileKind::BufWorkYaml.default_file_name());
    let data = encode_buf_work_yaml(file).map_err(|err| err.with_file_name(&path))?;
    bucket.put_atomic(&path, &data)
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufWorkYamlFileV1 {
    version: String,
    #[serde(default)]
    directories: Vec<String>,
}
