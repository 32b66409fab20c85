//! File versions, file kinds, and version resolution.

use super::encoding;
use crate::error::{ConfigError, ConfigResult};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Schema generation of a configuration file, ordered by release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileVersion {
    V1Beta1,
    V1,
    V2,
}

impl FileVersion {
    pub const ALL: [FileVersion; 3] = [FileVersion::V1Beta1, FileVersion::V1, FileVersion::V2];

    pub fn as_str(self) -> &'static str {
        match self {
            FileVersion::V1Beta1 => "v1beta1",
            FileVersion::V1 => "v1",
            FileVersion::V2 => "v2",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "v1beta1" => Ok(FileVersion::V1Beta1),
            "v1" => Ok(FileVersion::V1),
            "v2" => Ok(FileVersion::V2),
            other => Err(ConfigError::UnknownVersion(other.to_string())),
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileVersion::parse(s)
    }
}

/// The kinds of configuration file this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Module manifest: `buf.yaml` / `buf.mod`.
    BufYaml,
    /// Dependency lock file: `buf.lock`.
    BufLock,
    /// Code generation manifest: `buf.gen.yaml`.
    BufGenYaml,
    /// Legacy workspace manifest: `buf.work.yaml` / `buf.work`.
    BufWorkYaml,
}

const ALL_VERSIONS: &[FileVersion] = &[FileVersion::V1Beta1, FileVersion::V1, FileVersion::V2];
const PRE_V2_VERSIONS: &[FileVersion] = &[FileVersion::V1Beta1, FileVersion::V1];
const V1_ONLY: &[FileVersion] = &[FileVersion::V1];

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::BufYaml,
        FileKind::BufLock,
        FileKind::BufGenYaml,
        FileKind::BufWorkYaml,
    ];

    /// File names for this kind, in search order.
    pub fn file_names(self) -> &'static [&'static str] {
        match self {
            FileKind::BufYaml => &["buf.yaml", "buf.mod"],
            FileKind::BufLock => &["buf.lock"],
            FileKind::BufGenYaml => &["buf.gen.yaml"],
            FileKind::BufWorkYaml => &["buf.work.yaml", "buf.work"],
        }
    }

    /// The name new files of this kind are written under.
    pub fn default_file_name(self) -> &'static str {
        self.file_names()[0]
    }

    /// Classify a file by its base name.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.file_names().contains(&file_name))
    }

    /// Versions supported by a file of this kind with the given name.
    pub fn supported_versions(self, file_name: &str) -> &'static [FileVersion] {
        match self {
            FileKind::BufYaml if file_name == "buf.mod" => PRE_V2_VERSIONS,
            FileKind::BufYaml | FileKind::BufLock | FileKind::BufGenYaml => ALL_VERSIONS,
            FileKind::BufWorkYaml => V1_ONLY,
        }
    }

    /// The newest version a file with this name can be written as.
    pub fn latest_version(self, file_name: &str) -> FileVersion {
        let supported = self.supported_versions(file_name);
        supported[supported.len() - 1]
    }

    pub fn version_required(self) -> bool {
        !matches!(self, FileKind::BufLock)
    }

    pub fn default_version(self) -> FileVersion {
        match self {
            FileKind::BufYaml | FileKind::BufLock | FileKind::BufGenYaml => FileVersion::V1Beta1,
            FileKind::BufWorkYaml => FileVersion::V1,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_file_name())
    }
}

/// Determine the version of a configuration file from its raw bytes.
///
/// Only the `version` key is inspected; schema errors in other fields are
/// reported later by the decoder for the resolved version.
pub fn resolve_file_version(
    kind: FileKind,
    file_name: &str,
    data: &[u8],
    allow_json: bool,
) -> ConfigResult<FileVersion> {
    let raw = encoding::sniff_version(data, allow_json).map_err(|e| e.with_file_name(file_name))?;
    let version = match raw {
        None if kind.version_required() => {
            return Err(ConfigError::NoVersion {
                file_name: file_name.to_string(),
                suggested: kind.latest_version(file_name),
            });
        }
        None => {
            let version = kind.default_version();
            debug!(file = file_name, %version, "no version set, using default");
            version
        }
        Some(raw) => FileVersion::parse(&raw).map_err(|e| e.with_file_name(file_name))?,
    };
    if !kind.supported_versions(file_name).contains(&version) {
        return Err(ConfigError::UnsupportedVersion {
            file_name: file_name.to_string(),
            version,
        });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_version_ordering() {
        assert!(FileVersion::V1Beta1 < FileVersion::V1);
        assert!(FileVersion::V1 < FileVersion::V2);
        assert_eq!("v1beta1".parse::<FileVersion>().unwrap(), FileVersion::V1Beta1);
        assert!("v3".parse::<FileVersion>().is_err());
    }

    #[test]
    fn test_resolve_present_version() {
        let version =
            resolve_file_version(FileKind::BufYaml, "buf.yaml", b"version: v2\n", false).unwrap();
        assert_eq!(version, FileVersion::V2);
    }

    #[test]
    fn test_resolve_missing_required_version() {
        let err =
            resolve_file_version(FileKind::BufGenYaml, "buf.gen.yaml", b"plugins: []\n", false)
                .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NoVersion {
                suggested: FileVersion::V2,
                ..
            }
        ));
        assert!(err.to_string().contains("version: v2"));
    }

    #[test]
    fn test_resolve_missing_optional_version_defaults() {
        let version =
            resolve_file_version(FileKind::BufLock, "buf.lock", b"deps: []\n", false).unwrap();
        assert_eq!(version, FileVersion::V1Beta1);
    }

    #[test]
    fn test_resolve_unknown_version() {
        let err = resolve_file_version(FileKind::BufYaml, "buf.yaml", b"version: v9\n", false)
            .unwrap_err();
        assert!(err.to_string().contains("v9"));
    }

    #[test]
    fn test_resolve_unsupported_version() {
        let err =
            resolve_file_version(FileKind::BufWorkYaml, "buf.work.yaml", b"version: v2\n", false)
                .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));

        let err =
            resolve_file_version(FileKind::BufYaml, "buf.mod", b"version: v2\n", false).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_resolve_ignores_unrelated_schema_errors() {
        let data = b"version: v1\nlint:\n  use: 42\n  nonsense: true\n";
        let version = resolve_file_version(FileKind::BufYaml, "buf.yaml", data, false).unwrap();
        assert_eq!(version, FileVersion::V1);
    }

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_file_name("buf.mod"), Some(FileKind::BufYaml));
        assert_eq!(FileKind::from_file_name("buf.work"), Some(FileKind::BufWorkYaml));
        assert_eq!(FileKind::from_file_name("other.yaml"), None);
    }
}
