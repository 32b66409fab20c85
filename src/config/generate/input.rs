//! Inputs listed in a v2 `buf.gen.yaml`.

use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an input is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Directory,
    Module,
    GitRepo,
    Tarball,
    ZipArchive,
    ProtoFile,
    BinaryImage,
    JsonImage,
    TextImage,
    YamlImage,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Directory => "directory",
            InputKind::Module => "module",
            InputKind::GitRepo => "git_repo",
            InputKind::Tarball => "tarball",
            InputKind::ZipArchive => "zip_archive",
            InputKind::ProtoFile => "proto_file",
            InputKind::BinaryImage => "binary_image",
            InputKind::JsonImage => "json_image",
            InputKind::TextImage => "text_image",
            InputKind::YamlImage => "yaml_image",
        }
    }

    fn is_image(self) -> bool {
        matches!(
            self,
            InputKind::BinaryImage | InputKind::JsonImage | InputKind::TextImage | InputKind::YamlImage
        )
    }

    fn is_archive(self) -> bool {
        matches!(self, InputKind::Tarball | InputKind::ZipArchive)
    }

    fn allows_subdir(self) -> bool {
        self == InputKind::GitRepo || self.is_archive()
    }

    fn allows_compression(self) -> bool {
        self == InputKind::Tarball || self.is_image()
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            other => Err(ConfigError::invalid_field(
                "compression",
                format!("unknown compression {:?}, expected none, gzip or zstd", other),
            )),
        }
    }
}

/// Which commit of a git repository to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOptions {
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub git_ref: Option<String>,
    pub commit: Option<String>,
    pub depth: Option<u32>,
    pub recurse_submodules: bool,
}

impl GitOptions {
    fn is_empty(&self) -> bool {
        *self == GitOptions::default()
    }

    fn validate(&self) -> ConfigResult<()> {
        let selectors = [&self.branch, &self.tag, &self.git_ref, &self.commit]
            .iter()
            .filter(|value| value.is_some())
            .count();
        if selectors > 1 {
            return Err(ConfigError::invalid_field(
                "inputs",
                "only one of branch, tag, ref or commit may be set for a git_repo input",
            ));
        }
        if let Some(depth) = self.depth {
            if depth == 0 {
                return Err(ConfigError::invalid_field(
                    "depth",
                    "depth must be greater than zero",
                ));
            }
            if self.branch.is_some() || self.tag.is_some() || self.commit.is_some() {
                return Err(ConfigError::invalid_field(
                    "depth",
                    "depth may only be combined with ref",
                ));
            }
        }
        Ok(())
    }
}

/// Kind-specific settings, each rejected on kinds it does not apply to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputOptions {
    pub git: GitOptions,
    pub strip_components: Option<u32>,
    pub subdir: Option<String>,
    pub compression: Option<Compression>,
    pub include_package_files: bool,
}

/// Filters applied to any input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFilters {
    pub types: Vec<String>,
    pub exclude_types: Vec<String>,
    pub paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

/// One entry of `inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateInputConfig {
    kind: InputKind,
    location: String,
    options: InputOptions,
    filters: InputFilters,
}

impl GenerateInputConfig {
    pub fn new(
        kind: InputKind,
        location: &str,
        options: InputOptions,
        mut filters: InputFilters,
    ) -> ConfigResult<Self> {
        if location.is_empty() {
            return Err(ConfigError::missing_field(kind.as_str()));
        }
        let reject = |key: &str| {
            Err(ConfigError::invalid_field(
                key,
                format!("{} is not allowed for {} inputs", key, kind),
            ))
        };
        if kind != InputKind::GitRepo && !options.git.is_empty() {
            return reject(first_git_key(&options.git));
        }
        if !kind.is_archive() && options.strip_components.is_some() {
            return reject("strip_components");
        }
        if !kind.allows_subdir() && options.subdir.is_some() {
            return reject("subdir");
        }
        if !kind.allows_compression() && options.compression.is_some() {
            return reject("compression");
        }
        if kind != InputKind::ProtoFile && options.include_package_files {
            return reject("include_package_files");
        }
        options.git.validate()?;
        let subdir = options
            .subdir
            .as_deref()
            .map(|subdir| {
                normalpath::normalize_and_validate(subdir).map_err(|err| {
                    ConfigError::invalid_field("subdir", format!("invalid subdir: {}", err))
                })
            })
            .transpose()?;
        filters.paths = normalize_paths("paths", &filters.paths)?;
        filters.exclude_paths = normalize_paths("exclude_paths", &filters.exclude_paths)?;
        if let Some(empty) = [("types", &filters.types), ("exclude_types", &filters.exclude_types)]
            .into_iter()
            .find(|(_, types)| types.iter().any(String::is_empty))
        {
            return Err(ConfigError::invalid_field(
                empty.0,
                format!("{} cannot contain empty type names", empty.0),
            ));
        }
        Ok(Self {
            kind,
            location: location.to_string(),
            options: InputOptions { subdir, ..options },
            filters,
        })
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn options(&self) -> &InputOptions {
        &self.options
    }

    pub fn types(&self) -> &[String] {
        &self.filters.types
    }

    pub fn exclude_types(&self) -> &[String] {
        &self.filters.exclude_types
    }

    pub fn paths(&self) -> &[String] {
        &self.filters.paths
    }

    pub fn exclude_paths(&self) -> &[String] {
        &self.filters.exclude_paths
    }

    /// A copy of this input with `types` appended.
    pub(crate) fn with_extra_types(&self, types: &[String]) -> Self {
        let mut input = self.clone();
        for type_name in types {
            if !input.filters.types.contains(type_name) {
                input.filters.types.push(type_name.clone());
            }
        }
        input
    }

    pub(crate) fn to_external_v2(&self) -> ExternalInputConfigV2 {
        let git = &self.options.git;
        let mut external = ExternalInputConfigV2 {
            compression: self.options.compression.map(|c| c.as_str().to_string()),
            strip_components: self.options.strip_components,
            subdir: self.options.subdir.clone(),
            branch: git.branch.clone(),
            tag: git.tag.clone(),
            git_ref: git.git_ref.clone(),
            commit: git.commit.clone(),
            depth: git.depth,
            recurse_submodules: git.recurse_submodules,
            include_package_files: self.options.include_package_files,
            types: self.filters.types.clone(),
            exclude_types: self.filters.exclude_types.clone(),
            paths: self.filters.paths.clone(),
            exclude_paths: self.filters.exclude_paths.clone(),
            ..Default::default()
        };
        let location = Some(self.location.clone());
        match self.kind {
            InputKind::Directory => external.directory = location,
            InputKind::Module => external.module = location,
            InputKind::GitRepo => external.git_repo = location,
            InputKind::Tarball => external.tarball = location,
            InputKind::ZipArchive => external.zip_archive = location,
            InputKind::ProtoFile => external.proto_file = location,
            InputKind::BinaryImage => external.binary_image = location,
            InputKind::JsonImage => external.json_image = location,
            InputKind::TextImage => external.text_image = location,
            InputKind::YamlImage => external.yaml_image = location,
        }
        external
    }
}

fn first_git_key(git: &GitOptions) -> &'static str {
    if git.branch.is_some() {
        "branch"
    } else if git.tag.is_some() {
        "tag"
    } else if git.git_ref.is_some() {
        "ref"
    } else if git.commit.is_some() {
        "commit"
    } else if git.depth.is_some() {
        "depth"
    } else {
        "recurse_submodules"
    }
}

fn normalize_paths(field: &str, paths: &[String]) -> ConfigResult<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            normalpath::normalize_and_validate(path).map_err(|err| {
                ConfigError::invalid_field(field, format!("invalid path in {}: {}", field, err))
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalInputConfigV2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_archive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_components: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "crate::config::encoding::is_false")]
    pub recurse_submodules: bool,
    #[serde(default, skip_serializing_if = "crate::config::encoding::is_false")]
    pub include_package_files: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

pub(crate) fn input_config_from_external_v2(
    external: ExternalInputConfigV2,
) -> ConfigResult<GenerateInputConfig> {
    let candidates = [
        (InputKind::Module, external.module),
        (InputKind::Directory, external.directory),
        (InputKind::ProtoFile, external.proto_file),
        (InputKind::Tarball, external.tarball),
        (InputKind::ZipArchive, external.zip_archive),
        (InputKind::BinaryImage, external.binary_image),
        (InputKind::JsonImage, external.json_image),
        (InputKind::TextImage, external.text_image),
        (InputKind::YamlImage, external.yaml_image),
        (InputKind::GitRepo, external.git_repo),
    ];
    let mut set = candidates
        .into_iter()
        .filter_map(|(kind, location)| non_empty(location).map(|location| (kind, location)));
    let Some((kind, location)) = set.next() else {
        return Err(ConfigError::invalid_field(
            "inputs",
            "input must specify one of directory, module, git_repo, tarball, zip_archive, \
             proto_file, binary_image, json_image, text_image or yaml_image",
        ));
    };
    if let Some((other, _)) = set.next() {
        return Err(ConfigError::invalid_field(
            "inputs",
            format!("input may only specify one of {} and {}", kind, other),
        ));
    }
    let compression = non_empty(external.compression)
        .as_deref()
        .map(Compression::parse)
        .transpose()?;
    let options = InputOptions {
        git: GitOptions {
            branch: non_empty(external.branch),
            tag: non_empty(external.tag),
            git_ref: non_empty(external.git_ref),
            commit: non_empty(external.commit),
            depth: external.depth,
            recurse_submodules: external.recurse_submodules,
        },
        strip_components: external.strip_components,
        subdir: non_empty(external.subdir),
        compression,
        include_package_files: external.include_package_files,
    };
    let filters = InputFilters {
        types: external.types,
        exclude_types: external.exclude_types,
        paths: external.paths,
        exclude_paths: external.exclude_paths,
    };
    GenerateInputConfig::new(kind, &location, options, filters)
}
