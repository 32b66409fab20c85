//! The dependency lock file: `buf.lock`.
//!
//! Legacy (v1beta1, v1) files pin each dependency by commit. v2 files pin by
//! commit and digest, and may omit the commit. A digest missing from the file
//! is fetched on first use through a [`DigestResolver`].

use super::encoding;
use super::files;
use super::module_name::ModuleFullName;
use super::version::{FileKind, FileVersion, resolve_file_version};
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::{ReadBucket, WriteBucket};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

pub const BUF_LOCK_HEADER: &str = "# Generated by buf. DO NOT EDIT.";

const DIGEST_HEX_LEN: usize = 128;

/// The algorithm a digest was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    /// Legacy module digests, spelled `shake256` on disk.
    B4,
    /// Module digests covering files and dependencies.
    B5,
}

impl DigestKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DigestKind::B4 => "shake256",
            DigestKind::B5 => "b5",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "shake256" | "b4" => Some(DigestKind::B4),
            "b5" => Some(DigestKind::B5),
            _ => None,
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestKind::B4 => "b4",
            DigestKind::B5 => "b5",
        })
    }
}

/// A typed content digest, `<kind>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    kind: DigestKind,
    hex: String,
}

impl Digest {
    pub fn new(kind: DigestKind, hex: &str) -> ConfigResult<Self> {
        if hex.len() != DIGEST_HEX_LEN
            || !hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(ConfigError::invalid(format!(
                "digest value must be {} lowercase hex characters",
                DIGEST_HEX_LEN
            )));
        }
        Ok(Self {
            kind,
            hex: hex.to_string(),
        })
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        let Some((prefix, hex)) = value.split_once(':') else {
            return Err(ConfigError::invalid(format!(
                "invalid digest {:?}: expected <type>:<value>",
                value
            )));
        };
        let kind = DigestKind::from_prefix(prefix).ok_or_else(|| {
            ConfigError::invalid(format!("unknown digest type {:?}", prefix))
        })?;
        Self::new(kind, hex)
            .map_err(|err| ConfigError::invalid(format!("invalid digest {:?}: {}", value, err)))
    }

    pub fn kind(&self) -> DigestKind {
        self.kind
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.hex)
    }
}

/// Fetches the digest of a pinned dependency, typically from a registry.
pub trait DigestResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, full_name: &ModuleFullName, commit_id: &str) -> ConfigResult<Digest>;
}

/// One pinned dependency.
#[derive(Debug)]
pub struct LockDependency {
    full_name: ModuleFullName,
    commit_id: Option<String>,
    digest: OnceLock<Digest>,
    resolver: Option<Arc<dyn DigestResolver>>,
}

impl LockDependency {
    pub fn new(
        full_name: ModuleFullName,
        commit_id: Option<String>,
        digest: Option<Digest>,
        resolver: Option<Arc<dyn DigestResolver>>,
    ) -> Self {
        let cell = OnceLock::new();
        if let Some(digest) = digest {
            let _ = cell.set(digest);
        }
        Self {
            full_name,
            commit_id: commit_id.filter(|commit| !commit.is_empty()),
            digest: cell,
            resolver,
        }
    }

    pub fn full_name(&self) -> &ModuleFullName {
        &self.full_name
    }

    pub fn commit_id(&self) -> Option<&str> {
        self.commit_id.as_deref()
    }

    /// The digest, if it is already known without resolving.
    pub fn known_digest(&self) -> Option<&Digest> {
        self.digest.get()
    }

    /// Whether [`LockDependency::digest`] can produce a value.
    pub fn has_digest(&self) -> bool {
        self.digest.get().is_some() || (self.resolver.is_some() && self.commit_id.is_some())
    }

    /// The digest, resolving and memoizing it on first use.
    pub fn digest(&self) -> ConfigResult<Digest> {
        if let Some(digest) = self.digest.get() {
            return Ok(digest.clone());
        }
        let (Some(resolver), Some(commit_id)) = (&self.resolver, &self.commit_id) else {
            return Err(ConfigError::invalid(format!(
                "no digest available for dependency {}",
                self.full_name
            )));
        };
        let digest = resolver.resolve(&self.full_name, commit_id)?;
        Ok(self.digest.get_or_init(|| digest).clone())
    }
}

impl Clone for LockDependency {
    fn clone(&self) -> Self {
        Self {
            full_name: self.full_name.clone(),
            commit_id: self.commit_id.clone(),
            digest: self.digest.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl PartialEq for LockDependency {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
            && self.commit_id == other.commit_id
            && self.digest.get() == other.digest.get()
    }
}

/// A decoded lock file.
#[derive(Debug, Clone, PartialEq)]
pub struct BufLockFile {
    file_version: FileVersion,
    deps: Vec<LockDependency>,
}

impl BufLockFile {
    /// Build a lock file. Dependencies are sorted by module name, which must be
    /// unique.
    pub fn new(file_version: FileVersion, mut deps: Vec<LockDependency>) -> ConfigResult<Self> {
        let mut seen = BTreeSet::new();
        for dep in &deps {
            if !seen.insert(dep.full_name.to_string()) {
                return Err(ConfigError::invalid_field(
                    "deps",
                    format!("dependency {} is listed more than once", dep.full_name),
                ));
            }
            match file_version {
                FileVersion::V1Beta1 | FileVersion::V1 if dep.commit_id.is_none() => {
                    return Err(ConfigError::invalid_field(
                        "deps.commit",
                        format!("no commit specified for module {}", dep.full_name),
                    ));
                }
                FileVersion::V2 if dep.commit_id.is_none() && dep.digest.get().is_none() => {
                    return Err(ConfigError::invalid_field(
                        "deps",
                        format!(
                            "no commit or digest specified for module {}",
                            dep.full_name
                        ),
                    ));
                }
                _ => {}
            }
        }
        deps.sort_by_key(|dep| dep.full_name.to_string());
        Ok(Self { file_version, deps })
    }

    pub fn file_version(&self) -> FileVersion {
        self.file_version
    }

    pub fn deps(&self) -> &[LockDependency] {
        &self.deps
    }
}

/// Decode a `buf.lock` whose digests are all present in the file.
pub fn decode_buf_lock(data: &[u8]) -> ConfigResult<BufLockFile> {
    decode_buf_lock_with_resolver(data, None)
}

/// Decode a `buf.lock`, resolving missing digests through `resolver`.
pub fn decode_buf_lock_with_resolver(
    data: &[u8],
    resolver: Option<Arc<dyn DigestResolver>>,
) -> ConfigResult<BufLockFile> {
    let file_name = FileKind::BufLock.default_file_name();
    let decode = || -> ConfigResult<BufLockFile> {
        let file_version = resolve_file_version(FileKind::BufLock, file_name, data, false)?;
        let deps = match file_version {
            FileVersion::V1Beta1 => {
                let external: ExternalBufLockFileV1Beta1 = encoding::decode(data, false)?;
                external
                    .deps
                    .into_iter()
                    .map(|dep| {
                        validate_create_time(&dep.create_time)?;
                        legacy_dependency(
                            &dep.remote,
                            &dep.owner,
                            &dep.repository,
                            dep.commit,
                            &dep.digest,
                            resolver.clone(),
                        )
                    })
                    .collect::<ConfigResult<Vec<_>>>()?
            }
            FileVersion::V1 => {
                let external: ExternalBufLockFileV1 = encoding::decode(data, false)?;
                external
                    .deps
                    .into_iter()
                    .map(|dep| {
                        legacy_dependency(
                            &dep.remote,
                            &dep.owner,
                            &dep.repository,
                            dep.commit,
                            &dep.digest,
                            resolver.clone(),
                        )
                    })
                    .collect::<ConfigResult<Vec<_>>>()?
            }
            FileVersion::V2 => {
                let external: ExternalBufLockFileV2 = encoding::decode(data, false)?;
                external
                    .deps
                    .into_iter()
                    .map(|dep| {
                        let full_name = ModuleFullName::parse(&dep.name).map_err(|err| {
                            ConfigError::invalid_field("deps.name", err.to_string())
                        })?;
                        Ok(LockDependency::new(
                            full_name,
                            Some(dep.commit),
                            parse_optional_digest(&dep.digest)?,
                            resolver.clone(),
                        ))
                    })
                    .collect::<ConfigResult<Vec<_>>>()?
            }
        };
        BufLockFile::new(file_version, deps)
    };
    decode().map_err(|err| err.with_file_name(file_name))
}

/// Check a v1beta1 `create_time`. The value is not kept: later versions have
/// no field for it.
fn validate_create_time(raw: &str) -> ConfigResult<()> {
    if raw.is_empty() {
        return Ok(());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|_| ())
        .map_err(|err| {
            ConfigError::invalid_field(
                "deps.create_time",
                format!("invalid create_time {:?}: {}", raw, err),
            )
        })
}

fn parse_optional_digest(value: &str) -> ConfigResult<Option<Digest>> {
    if value.is_empty() {
        return Ok(None);
    }
    Digest::parse(value)
        .map(Some)
        .map_err(|err| ConfigError::invalid_field("deps.digest", err.to_string()))
}

fn legacy_dependency(
    remote: &str,
    owner: &str,
    repository: &str,
    commit: String,
    digest: &str,
    resolver: Option<Arc<dyn DigestResolver>>,
) -> ConfigResult<LockDependency> {
    let full_name = ModuleFullName::new(remote, owner, repository)
        .map_err(|err| ConfigError::invalid_field("deps", err.to_string()))?;
    Ok(LockDependency::new(
        full_name,
        Some(commit),
        parse_optional_digest(digest)?,
        resolver,
    ))
}

/// Encode a lock file as v2, resolving digests where a resolver is available.
pub fn encode_buf_lock(file: &BufLockFile) -> ConfigResult<Vec<u8>> {
    let encode = || -> ConfigResult<Vec<u8>> {
        let mut deps = Vec::with_capacity(file.deps.len());
        for dep in &file.deps {
            let digest = if dep.has_digest() {
                dep.digest()?.to_string()
            } else {
                String::new()
            };
            deps.push(ExternalLockDependencyV2 {
                name: dep.full_name.to_string(),
                commit: dep.commit_id.clone().unwrap_or_default(),
                digest,
            });
        }
        let external = ExternalBufLockFileV2 {
            version: FileVersion::V2.to_string(),
            deps,
        };
        encoding::encode(&[BUF_LOCK_HEADER], &external)
    };
    encode().map_err(|err| err.with_file_name(FileKind::BufLock.default_file_name()))
}

/// Read the `buf.lock` in `dir`.
pub fn read_buf_lock(
    bucket: &dyn ReadBucket,
    dir: &str,
    resolver: Option<Arc<dyn DigestResolver>>,
) -> ConfigResult<BufLockFile> {
    let found = files::read_file(bucket, dir, FileKind::BufLock)?;
    decode_buf_lock_with_resolver(&found.data, resolver).map_err(|err| err.with_file_name(&found.path))
}

/// Write `file` as `buf.lock` in `dir`.
pub fn put_buf_lock(bucket: &dyn WriteBucket, dir: &str, file: &BufLockFile) -> ConfigResult<()> {
    let path = normalpath::join(dir, FileKind::BufLock.default_file_name());
    let data = encode_buf_lock(file).map_err(|err| err.with_file_name(&path))?;
    bucket.put_atomic(&path, &data)
}

/// The digest type of the first dependency in a lock file.
///
/// Reads leniently: unknown fields are ignored. Returns `None` when the file
/// has no dependency carrying a digest.
pub fn buf_lock_digest_kind(data: &[u8]) -> ConfigResult<Option<DigestKind>> {
    let external: LenientBufLockFile = encoding::decode(data, false)?;
    let Some(dep) = external.deps.iter().find(|dep| !dep.digest.is_empty()) else {
        return Ok(None);
    };
    Ok(Some(Digest::parse(&dep.digest)?.kind()))
}

// External shapes

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalLockDependencyV1Beta1 {
    #[serde(default)]
    remote: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    repository: String,
    #[serde(default)]
    #[allow(dead_code)]
    branch: String,
    #[serde(default)]
    commit: String,
    #[serde(default)]
    digest: String,
    #[serde(default)]
    create_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufLockFileV1Beta1 {
    #[serde(default)]
    #[allow(dead_code)]
    version: String,
    #[serde(default)]
    deps: Vec<ExternalLockDependencyV1Beta1>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalLockDependencyV1 {
    #[serde(default)]
    remote: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    repository: String,
    #[serde(default)]
    commit: String,
    #[serde(default)]
    digest: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufLockFileV1 {
    #[allow(dead_code)]
    version: String,
    #[serde(default)]
    deps: Vec<ExternalLockDependencyV1>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalLockDependencyV2 {
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    digest: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufLockFileV2 {
    version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deps: Vec<ExternalLockDependencyV2>,
}

#[derive(Debug, Default, Deserialize)]
struct LenientLockDependency {
    #[serde(default)]
    digest: String,
}

#[derive(Debug, Default, Deserialize)]
struct LenientBufLockFile {
    #[serde(default)]
    deps: Vec<LenientLockDependency>,
}
