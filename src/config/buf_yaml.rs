//! The module manifest: `buf.yaml` (and the legacy `buf.mod`).
//!
//! v1beta1 and v1 files describe a single module rooted at the manifest
//! directory. v2 files describe any number of modules plus workspace-wide
//! dependencies, check plugins and policies. Files are always written as v2.

use super::check::{
    self, BreakingConfig, ExternalBreakingConfigV1Beta1V1, ExternalBreakingConfigV2,
    ExternalLintConfigV1Beta1V1, ExternalLintConfigV2, LintConfig, PathScope,
};
use super::encoding;
use super::files;
use super::module::{self, ModuleConfig};
use super::module_name::{ModuleFullName, ModuleRef};
use super::plugin::{ExternalPluginConfigV2, LocalFileProbe, OsFileProbe, PluginConfig};
use super::policy::{ExternalPolicyConfigV2, PolicyConfig};
use super::version::{FileKind, FileVersion, resolve_file_version};
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::{ReadBucket, WriteBucket};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub const BUF_YAML_DOCS_LINK: &str =
    "# For details on buf.yaml configuration, visit https://buf.build/docs/configuration/v2/buf-yaml";

/// A decoded module manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct BufYamlFile {
    file_version: FileVersion,
    module_configs: Vec<ModuleConfig>,
    config_deps: Vec<ModuleRef>,
    plugin_configs: Vec<PluginConfig>,
    policy_configs: Vec<PolicyConfig>,
    include_docs_link: bool,
}

impl BufYamlFile {
    /// Build a manifest.
    ///
    /// Modules are stable-sorted by directory; dependencies are sorted and
    /// deduplicated. v1beta1 and v1 manifests hold exactly one module at `"."`
    /// and no plugins or policies.
    pub fn new(
        file_version: FileVersion,
        mut module_configs: Vec<ModuleConfig>,
        config_deps: Vec<ModuleRef>,
        plugin_configs: Vec<PluginConfig>,
        policy_configs: Vec<PolicyConfig>,
    ) -> ConfigResult<Self> {
        if module_configs.is_empty() {
            return Err(ConfigError::system("a buf.yaml must have at least one module"));
        }
        if file_version < FileVersion::V2 {
            if module_configs.len() != 1 || module_configs[0].dir_path() != "." {
                return Err(ConfigError::system(format!(
                    "a {} buf.yaml must have exactly one module at \".\"",
                    file_version
                )));
            }
            if !plugin_configs.is_empty() || !policy_configs.is_empty() {
                return Err(ConfigError::system(format!(
                    "a {} buf.yaml cannot declare plugins or policies",
                    file_version
                )));
            }
        }
        let mut seen_names = BTreeSet::new();
        for module_config in &module_configs {
            if let Some(name) = module_config.full_name()
                && !seen_names.insert(name.to_string())
            {
                return Err(ConfigError::invalid_field(
                    "modules",
                    format!("module name {} is declared more than once", name),
                ));
            }
        }
        module_configs.sort_by(|a, b| a.dir_path().cmp(b.dir_path()));
        let mut config_deps = config_deps;
        config_deps.sort_by_key(|dep| dep.to_string());
        config_deps.dedup();
        Ok(Self {
            file_version,
            module_configs,
            config_deps,
            plugin_configs,
            policy_configs,
            include_docs_link: false,
        })
    }

    /// Emit the docs-link comment when this file is written.
    pub fn with_docs_link(mut self) -> Self {
        self.include_docs_link = true;
        self
    }

    pub fn file_version(&self) -> FileVersion {
        self.file_version
    }

    pub fn module_configs(&self) -> &[ModuleConfig] {
        &self.module_configs
    }

    pub fn config_deps(&self) -> &[ModuleRef] {
        &self.config_deps
    }

    pub fn plugin_configs(&self) -> &[PluginConfig] {
        &self.plugin_configs
    }

    pub fn policy_configs(&self) -> &[PolicyConfig] {
        &self.policy_configs
    }

    pub fn include_docs_link(&self) -> bool {
        self.include_docs_link
    }
}

// Decoding

/// Decode a `buf.yaml`, probing the current directory to classify plugins.
pub fn decode_buf_yaml(data: &[u8], allow_json: bool) -> ConfigResult<BufYamlFile> {
    decode_buf_yaml_with_probe("buf.yaml", data, allow_json, &OsFileProbe::default())
}

/// Decode a module manifest that was stored under `file_name`.
pub fn decode_buf_yaml_with_probe(
    file_name: &str,
    data: &[u8],
    allow_json: bool,
    probe: &dyn LocalFileProbe,
) -> ConfigResult<BufYamlFile> {
    let decode = || -> ConfigResult<BufYamlFile> {
        let file_version = resolve_file_version(FileKind::BufYaml, file_name, data, allow_json)?;
        let file = match file_version {
            FileVersion::V1Beta1 => {
                let external: ExternalBufYamlFileV1Beta1 = encoding::decode(data, allow_json)?;
                decode_v1beta1_v1(
                    file_version,
                    external.name,
                    external.deps,
                    &external.build.roots,
                    &external.build.excludes,
                    &external.lint,
                    &external.breaking,
                )?
            }
            FileVersion::V1 => {
                let external: ExternalBufYamlFileV1 = encoding::decode(data, allow_json)?;
                decode_v1beta1_v1(
                    file_version,
                    external.name,
                    external.deps,
                    &[],
                    &external.build.excludes,
                    &external.lint,
                    &external.breaking,
                )?
            }
            FileVersion::V2 => {
                let external: ExternalBufYamlFileV2 = encoding::decode(data, allow_json)?;
                decode_v2(external, probe)?
            }
        };
        if encoding::starts_with_comment(data, BUF_YAML_DOCS_LINK) {
            return Ok(file.with_docs_link());
        }
        Ok(file)
    };
    decode().map_err(|err| err.with_file_name(file_name))
}

fn parse_deps(deps: &[String]) -> ConfigResult<Vec<ModuleRef>> {
    deps.iter()
        .map(|dep| {
            ModuleRef::parse(dep).map_err(|err| {
                ConfigError::invalid_field("deps", format!("invalid dependency {:?}: {}", dep, err))
            })
        })
        .collect()
}

fn parse_name(name: &str) -> ConfigResult<Option<ModuleFullName>> {
    if name.is_empty() {
        return Ok(None);
    }
    ModuleFullName::parse(name)
        .map(Some)
        .map_err(|err| ConfigError::invalid_field("name", err.to_string()))
}

fn decode_v1beta1_v1(
    file_version: FileVersion,
    name: String,
    deps: Vec<String>,
    roots: &[String],
    excludes: &[String],
    lint: &ExternalLintConfigV1Beta1V1,
    breaking: &ExternalBreakingConfigV1Beta1V1,
) -> ConfigResult<BufYamlFile> {
    let root_to_excludes = module::resolve_roots_and_excludes(roots, excludes)?;
    // Check paths are relative to the roots, which all live under the module.
    let scope = PathScope {
        module_dir: ".",
        require_paths_contained: true,
    };
    let module_config = ModuleConfig::new(
        ".",
        parse_name(&name)?,
        BTreeMap::new(),
        root_to_excludes,
        check::lint_config_from_external_v1beta1_v1(file_version, lint, scope)?,
        check::breaking_config_from_external_v1beta1_v1(file_version, breaking, scope)?,
    )?;
    BufYamlFile::new(
        file_version,
        vec![module_config],
        parse_deps(&deps)?,
        Vec::new(),
        Vec::new(),
    )
}

fn decode_v2(
    external: ExternalBufYamlFileV2,
    probe: &dyn LocalFileProbe,
) -> ConfigResult<BufYamlFile> {
    let mut external_modules = external.modules;
    if external_modules.is_empty() {
        external_modules.push(ExternalModuleConfigV2 {
            path: ".".to_string(),
            ..Default::default()
        });
    }
    let mut module_configs = Vec::with_capacity(external_modules.len());
    for external_module in external_modules {
        let raw_path = if external_module.path.is_empty() {
            "."
        } else {
            external_module.path.as_str()
        };
        let dir_path = normalpath::normalize_and_validate(raw_path).map_err(|err| {
            ConfigError::invalid_field("modules.path", format!("invalid module path: {}", err))
        })?;
        let (includes, excludes) = module::resolve_includes_and_excludes(
            &dir_path,
            &external_module.includes,
            &external_module.excludes,
        )?;
        let lint = match (&external_module.lint, &external.lint) {
            (Some(own), _) => check::lint_config_from_external_v2(own, scope(&dir_path, true))?,
            (None, Some(inherited)) => {
                check::lint_config_from_external_v2(inherited, scope(&dir_path, false))?
            }
            (None, None) => LintConfig::default_for(FileVersion::V2),
        };
        let breaking = match (&external_module.breaking, &external.breaking) {
            (Some(own), _) => {
                check::breaking_config_from_external_v2(own, scope(&dir_path, true))?
            }
            (None, Some(inherited)) => {
                check::breaking_config_from_external_v2(inherited, scope(&dir_path, false))?
            }
            (None, None) => BreakingConfig::default_for(FileVersion::V2),
        };
        module_configs.push(ModuleConfig::new(
            &dir_path,
            parse_name(&external_module.name)?,
            BTreeMap::from([(".".to_string(), includes)]),
            BTreeMap::from([(".".to_string(), excludes)]),
            lint,
            breaking,
        )?);
    }
    let plugin_configs = external
        .plugins
        .into_iter()
        .map(|plugin| PluginConfig::from_external_v2(plugin, probe))
        .collect::<ConfigResult<Vec<_>>>()?;
    let policy_configs = external
        .policies
        .into_iter()
        .map(PolicyConfig::from_external_v2)
        .collect::<ConfigResult<Vec<_>>>()?;
    BufYamlFile::new(
        FileVersion::V2,
        module_configs,
        parse_deps(&external.deps)?,
        plugin_configs,
        policy_configs,
    )
}

fn scope(module_dir: &str, require_paths_contained: bool) -> PathScope<'_> {
    PathScope {
        module_dir,
        require_paths_contained,
    }
}

// Encoding

/// One v2 module as it will be written, before collapsing.
struct WriteModule {
    path: String,
    name: String,
    includes: Vec<String>,
    excludes: Vec<String>,
    lint: ExternalLintConfigV2,
    breaking: ExternalBreakingConfigV2,
}

/// Flatten every module (and, for legacy files, every root) into v2 modules.
fn write_modules(file: &BufYamlFile) -> Vec<WriteModule> {
    let mut out = Vec::new();
    for module_config in &file.module_configs {
        let roots: Vec<&str> = module_config.roots().collect();
        if roots.len() > 1 && module_config.full_name().is_some() {
            warn!(
                roots = ?roots,
                "multiple roots are written as separate modules, only the first keeps the module name"
            );
        }
        for (i, root) in roots.iter().enumerate() {
            let path = normalpath::join(module_config.dir_path(), root);
            let prefixed = |map: &BTreeMap<String, Vec<String>>| -> Vec<String> {
                let mut paths: Vec<String> = map
                    .get(*root)
                    .map(|paths| paths.iter().map(|p| normalpath::join(&path, p)).collect())
                    .unwrap_or_default();
                paths.sort();
                paths
            };
            let name = match module_config.full_name() {
                Some(name) if i == 0 => name.to_string(),
                _ => String::new(),
            };
            out.push(WriteModule {
                name,
                includes: prefixed(module_config.root_to_includes()),
                excludes: prefixed(module_config.root_to_excludes()),
                lint: module_config.lint().to_external_v2(module_config.dir_path(), root),
                breaking: module_config
                    .breaking()
                    .to_external_v2(module_config.dir_path(), root),
                path,
            });
        }
    }
    out
}

/// The single value shared by every item, if there is at most one distinct value.
fn common<T: PartialEq + Clone>(values: impl Iterator<Item = T>) -> Option<Option<T>> {
    let mut distinct: Vec<T> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    match distinct.len() {
        0 => Some(None),
        1 => Some(distinct.pop()),
        _ => None,
    }
}

fn to_external_v2(file: &BufYamlFile) -> ExternalBufYamlFileV2 {
    let modules = write_modules(file);
    let default_lint = LintConfig::default_for(FileVersion::V2).to_external_v2(".", ".");
    let default_breaking =
        BreakingConfig::default_for(FileVersion::V2).to_external_v2(".", ".");

    let common_lint = common(modules.iter().map(|m| m.lint.clone()));
    let common_breaking = common(modules.iter().map(|m| m.breaking.clone()));
    let top_lint = match &common_lint {
        Some(Some(lint)) if *lint != default_lint => Some(lint.clone()),
        _ => None,
    };
    let top_breaking = match &common_breaking {
        Some(Some(breaking)) if *breaking != default_breaking => Some(breaking.clone()),
        _ => None,
    };

    let single_default_module = modules.len() == 1
        && modules[0].path == "."
        && modules[0].name.is_empty()
        && modules[0].includes.is_empty()
        && modules[0].excludes.is_empty();
    let external_modules = if single_default_module {
        Vec::new()
    } else {
        modules
            .into_iter()
            .map(|m| ExternalModuleConfigV2 {
                path: m.path,
                name: m.name,
                includes: m.includes,
                excludes: m.excludes,
                lint: common_lint.is_none().then_some(m.lint),
                breaking: common_breaking.is_none().then_some(m.breaking),
            })
            .collect()
    };
    ExternalBufYamlFileV2 {
        version: FileVersion::V2.to_string(),
        modules: external_modules,
        deps: file.config_deps.iter().map(|dep| dep.to_string()).collect(),
        lint: top_lint,
        breaking: top_breaking,
        plugins: file
            .plugin_configs
            .iter()
            .map(PluginConfig::to_external_v2)
            .collect(),
        policies: file
            .policy_configs
            .iter()
            .map(PolicyConfig::to_external_v2)
            .collect(),
    }
}

/// Encode a manifest as a v2 `buf.yaml`.
pub fn encode_buf_yaml(file: &BufYamlFile) -> ConfigResult<Vec<u8>> {
    let header: &[&str] = if file.include_docs_link {
        &[BUF_YAML_DOCS_LINK]
    } else {
        &[]
    };
    encoding::encode(header, &to_external_v2(file)).map_err(|err| err.with_file_name("buf.yaml"))
}

/// Read the module manifest in `dir`, trying `buf.yaml` then `buf.mod`.
pub fn read_buf_yaml(bucket: &dyn ReadBucket, dir: &str) -> ConfigResult<BufYamlFile> {
    let found = files::read_file(bucket, dir, FileKind::BufYaml)?;
    decode_buf_yaml_with_probe(found.file_name, &found.data, false, &OsFileProbe::default())
        .map_err(|err| err.with_file_name(&found.path))
}

/// Write `file` as `buf.yaml` in `dir`.
pub fn put_buf_yaml(bucket: &dyn WriteBucket, dir: &str, file: &BufYamlFile) -> ConfigResult<()> {
    let path = normalpath::join(dir, FileKind::BufYaml.default_file_name());
    let data = encode_buf_yaml(file).map_err(|err| err.with_file_name(&path))?;
    bucket.put_atomic(&path, &data)
}

// External shapes

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBuildConfigV1Beta1 {
    #[serde(default)]
    roots: Vec<String>,
    #[serde(default)]
    excludes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBuildConfigV1 {
    #[serde(default)]
    excludes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufYamlFileV1Beta1 {
    #[allow(dead_code)]
    version: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    build: ExternalBuildConfigV1Beta1,
    #[serde(default)]
    lint: ExternalLintConfigV1Beta1V1,
    #[serde(default)]
    breaking: ExternalBreakingConfigV1Beta1V1,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufYamlFileV1 {
    #[allow(dead_code)]
    version: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    build: ExternalBuildConfigV1,
    #[serde(default)]
    lint: ExternalLintConfigV1Beta1V1,
    #[serde(default)]
    breaking: ExternalBreakingConfigV1Beta1V1,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalModuleConfigV2 {
    #[serde(default)]
    path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lint: Option<ExternalLintConfigV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    breaking: Option<ExternalBreakingConfigV2>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufYamlFileV2 {
    version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    modules: Vec<ExternalModuleConfigV2>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lint: Option<ExternalLintConfigV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    breaking: Option<ExternalBreakingConfigV2>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    plugins: Vec<ExternalPluginConfigV2>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    policies: Vec<ExternalPolicyConfigV2>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::plugin::tests::FakeProbe;

    fn decode(data: &str) -> ConfigResult<BufYamlFile> {
        decode_buf_yaml_with_probe("buf.yaml", data.as_bytes(), false, &FakeProbe::default())
    }

    fn roundtrip(data: &str) -> String {
        String::from_utf8(encode_buf_yaml(&decode(data).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn test_v1_single_module() {
        let file = decode(
            "version: v1\nname: buf.build/acme/weather\ndeps: [buf.build/acme/units]\nbuild:\n  excludes: [vendor]\n",
        )
        .unwrap();
        assert_eq!(file.file_version(), FileVersion::V1);
        let module = &file.module_configs()[0];
        assert_eq!(module.dir_path(), ".");
        assert_eq!(module.full_name().unwrap().to_string(), "buf.build/acme/weather");
        assert_eq!(module.root_to_excludes()["."], ["vendor"]);
        assert_eq!(file.config_deps()[0].to_string(), "buf.build/acme/units");
    }

    #[test]
    fn test_v1_rejects_roots() {
        let err = decode("version: v1\nbuild:\n  roots: [proto]\n").unwrap_err();
        assert!(err.to_string().contains("roots"));
    }

    #[test]
    fn test_v1_omits_modules_on_write() {
        let out = roundtrip("version: v1\n");
        assert!(out.starts_with("version: v2\n"));
        assert!(!out.contains("modules"));
        // v1 defaults differ from v2 defaults, so the lint block is kept.
        assert!(out.contains("disallow_comment_ignores: true"));
        assert!(!out.contains("breaking"));
        assert_eq!(roundtrip("version: v2\n"), "version: v2\n");
    }

    #[test]
    fn test_v1beta1_multi_root_upgrade() {
        let out = roundtrip(
            "version: v1beta1\nname: buf.build/acme/weather\nbuild:\n  roots: [proto, vendor]\n  excludes: [proto/internal]\n",
        );
        let file = decode(&out).unwrap();
        let modules = file.module_configs();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].dir_path(), "proto");
        assert_eq!(modules[0].full_name().unwrap().name(), "weather");
        assert_eq!(modules[0].root_to_excludes()["."], ["internal"]);
        assert_eq!(modules[1].dir_path(), "vendor");
        assert!(modules[1].full_name().is_none());
    }

    #[test]
    fn test_v1beta1_check_paths_follow_their_root() {
        let out = roundtrip(
            "version: v1beta1\nbuild:\n  roots: [proto, vendor]\nlint:\n  ignore: [proto/a.proto]\n  ignore_only:\n    FIELD_LOWER_SNAKE_CASE: [vendor/b.proto, proto/c.proto]\nbreaking:\n  ignore: [vendor/d]\n",
        );
        assert!(out.contains("- proto/a.proto"), "{out}");
        assert!(!out.contains("proto/proto"), "{out}");
        assert!(!out.contains("vendor/proto"), "{out}");
        assert!(!out.contains("proto/vendor"), "{out}");

        let file = decode(&out).unwrap();
        let modules = file.module_configs();
        let proto_lint = modules[0].lint().check().enabled().unwrap();
        assert_eq!(proto_lint.ignore_paths(), ["a.proto"]);
        assert_eq!(
            proto_lint.ignore_id_or_category_to_paths()["FIELD_LOWER_SNAKE_CASE"],
            ["c.proto"]
        );
        let vendor_lint = modules[1].lint().check().enabled().unwrap();
        assert!(vendor_lint.ignore_paths().is_empty());
        assert_eq!(
            vendor_lint.ignore_id_or_category_to_paths()["FIELD_LOWER_SNAKE_CASE"],
            ["b.proto"]
        );
        assert!(
            modules[0]
                .breaking()
                .check()
                .enabled()
                .unwrap()
                .ignore_paths()
                .is_empty()
        );
        assert_eq!(
            modules[1].breaking().check().enabled().unwrap().ignore_paths(),
            ["d"]
        );
    }

    #[test]
    fn test_v2_module_specific_lint_must_be_contained() {
        let err = decode(
            "version: v2\nmodules:\n  - path: proto\n    lint:\n      ignore: [other/a.proto]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not contained within module directory"));
    }

    #[test]
    fn test_v2_inherited_lint_drops_outside_paths() {
        let file = decode(
            "version: v2\nmodules:\n  - path: a\n  - path: b\nlint:\n  ignore: [a/x]\n",
        )
        .unwrap();
        let a = file.module_configs()[0].lint().check().enabled().unwrap();
        let b = file.module_configs()[1].lint().check().enabled().unwrap();
        assert_eq!(a.ignore_paths(), ["x"]);
        assert!(b.ignore_paths().is_empty());
    }

    #[test]
    fn test_v2_duplicate_module_names() {
        let err = decode(
            "version: v2\nmodules:\n  - path: a\n    name: buf.build/acme/x\n  - path: b\n    name: buf.build/acme/x\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_v2_repeated_dirs_keep_declaration_order() {
        let file = decode(
            "version: v2\nmodules:\n  - path: z\n  - path: proto\n    includes: [proto/b]\n  - path: proto\n    includes: [proto/a]\n",
        )
        .unwrap();
        let modules = file.module_configs();
        assert_eq!(modules[0].root_to_includes()["."], ["b"]);
        assert_eq!(modules[1].root_to_includes()["."], ["a"]);
        assert_eq!(modules[2].dir_path(), "z");
    }

    #[test]
    fn test_docs_link_preserved() {
        let data = format!("{}\nversion: v2\n", BUF_YAML_DOCS_LINK);
        let file = decode(&data).unwrap();
        assert!(file.include_docs_link());
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_unknown_field_names_file() {
        let err = decode("version: v2\nmodulez: []\n").unwrap_err();
        assert!(err.to_string().starts_with("buf.yaml: "));
    }
}
