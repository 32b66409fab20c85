//! The generation manifest: `buf.gen.yaml`.
//!
//! v1beta1 and v1 files list plugins, optional managed-mode knobs and an
//! optional type filter. v2 files add inputs and the `clean` flag, and express
//! managed mode as explicit disable and override rules. Files are always
//! written as v2.

pub mod file_option;
pub mod input;
pub mod managed;
pub mod plugin;

pub use file_option::{
    FieldOption, FileOption, JsType, ManagedOption, OptimizeMode, OptionValue, OptionValueType,
};
pub use input::{
    Compression, GenerateInputConfig, GitOptions, InputFilters, InputKind, InputOptions,
};
pub use managed::{GenerateManagedConfig, ManagedDisableRule, ManagedOverrideRule};
pub use plugin::{
    GeneratePluginConfig, GeneratePluginType, GenerateStrategy, PluginSettings, is_protoc_builtin,
};

use super::encoding;
use super::files;
use super::version::{FileKind, FileVersion, resolve_file_version};
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::{ReadBucket, WriteBucket};
use input::ExternalInputConfigV2;
use managed::{ExternalManagedConfigV1, ExternalManagedConfigV2, ExternalOptionsV1Beta1};
use plugin::{
    ExternalGeneratePluginConfigV1, ExternalGeneratePluginConfigV1Beta1,
    ExternalGeneratePluginConfigV2,
};
use serde::{Deserialize, Serialize};

pub const BUF_GEN_YAML_DOCS_LINK: &str = "# For details on buf.gen.yaml configuration, visit https://buf.build/docs/configuration/v2/buf-gen-yaml";

/// The fully qualified types to generate for (v1 `types.include`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateTypeConfig {
    include_types: Vec<String>,
}

impl GenerateTypeConfig {
    pub fn new(include_types: Vec<String>) -> ConfigResult<Self> {
        if include_types.iter().any(String::is_empty) {
            return Err(ConfigError::invalid_field(
                "types.include",
                "types.include cannot contain empty type names",
            ));
        }
        Ok(Self { include_types })
    }

    pub fn include_types(&self) -> &[String] {
        &self.include_types
    }
}

/// What to generate and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    plugins: Vec<GeneratePluginConfig>,
    managed: Option<GenerateManagedConfig>,
    type_config: Option<GenerateTypeConfig>,
    inputs: Vec<GenerateInputConfig>,
}

impl GenerateConfig {
    pub fn new(
        plugins: Vec<GeneratePluginConfig>,
        managed: Option<GenerateManagedConfig>,
        type_config: Option<GenerateTypeConfig>,
        inputs: Vec<GenerateInputConfig>,
    ) -> ConfigResult<Self> {
        if plugins.is_empty() {
            return Err(ConfigError::invalid_field(
                "plugins",
                "plugins is empty, at least one plugin is required",
            ));
        }
        Ok(Self {
            plugins,
            managed,
            type_config,
            inputs,
        })
    }

    pub fn plugins(&self) -> &[GeneratePluginConfig] {
        &self.plugins
    }

    pub fn managed(&self) -> Option<&GenerateManagedConfig> {
        self.managed.as_ref()
    }

    pub fn type_config(&self) -> Option<&GenerateTypeConfig> {
        self.type_config.as_ref()
    }

    pub fn inputs(&self) -> &[GenerateInputConfig] {
        &self.inputs
    }
}

/// A decoded generation manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufGenYamlFile {
    file_version: FileVersion,
    generate_config: GenerateConfig,
    clean: bool,
    include_docs_link: bool,
}

impl BufGenYamlFile {
    pub fn new(
        file_version: FileVersion,
        generate_config: GenerateConfig,
        clean: bool,
    ) -> ConfigResult<Self> {
        if file_version != FileVersion::V2 {
            if !generate_config.inputs.is_empty() {
                return Err(ConfigError::system(format!(
                    "inputs are not supported in {} generation manifests",
                    file_version
                )));
            }
            if clean {
                return Err(ConfigError::system(format!(
                    "clean is not supported in {} generation manifests",
                    file_version
                )));
            }
        } else if generate_config.type_config.is_some() {
            return Err(ConfigError::system(
                "a type config is not supported in v2 generation manifests, set types on inputs",
            ));
        }
        Ok(Self {
            file_version,
            generate_config,
            clean,
            include_docs_link: false,
        })
    }

    pub fn with_docs_link(mut self) -> Self {
        self.include_docs_link = true;
        self
    }

    pub fn file_version(&self) -> FileVersion {
        self.file_version
    }

    pub fn generate_config(&self) -> &GenerateConfig {
        &self.generate_config
    }

    pub fn clean(&self) -> bool {
        self.clean
    }

    pub fn include_docs_link(&self) -> bool {
        self.include_docs_link
    }
}

// Decoding

pub fn decode_buf_gen_yaml(data: &[u8], allow_json: bool) -> ConfigResult<BufGenYamlFile> {
    let file_name = FileKind::BufGenYaml.default_file_name();
    let decode = || -> ConfigResult<BufGenYamlFile> {
        let file_version = resolve_file_version(FileKind::BufGenYaml, file_name, data, allow_json)?;
        let file = match file_version {
            FileVersion::V1Beta1 => {
                let external: ExternalBufGenYamlFileV1Beta1 = encoding::decode(data, allow_json)?;
                let plugins = collect_plugins(external.plugins, plugin::plugin_config_from_external_v1beta1)?;
                let managed =
                    managed::managed_config_from_external_v1beta1(external.managed, external.options)?;
                BufGenYamlFile::new(
                    file_version,
                    GenerateConfig::new(plugins, managed, None, Vec::new())?,
                    false,
                )?
            }
            FileVersion::V1 => {
                let external: ExternalBufGenYamlFileV1 = encoding::decode(data, allow_json)?;
                let plugins = collect_plugins(external.plugins, plugin::plugin_config_from_external_v1)?;
                let managed = managed::managed_config_from_external_v1(external.managed)?;
                let type_config = external
                    .types
                    .filter(|types| !types.include.is_empty())
                    .map(|types| GenerateTypeConfig::new(types.include))
                    .transpose()?;
                BufGenYamlFile::new(
                    file_version,
                    GenerateConfig::new(plugins, managed, type_config, Vec::new())?,
                    false,
                )?
            }
            FileVersion::V2 => {
                let external: ExternalBufGenYamlFileV2 = encoding::decode(data, allow_json)?;
                let plugins = collect_plugins(external.plugins, plugin::plugin_config_from_external_v2)?;
                let managed = external
                    .managed
                    .as_ref()
                    .map(managed::managed_config_from_external_v2)
                    .transpose()?;
                let inputs = external
                    .inputs
                    .into_iter()
                    .enumerate()
                    .map(|(index, input)| {
                        input::input_config_from_external_v2(input).map_err(|err| {
                            ConfigError::invalid_field(
                                err.field().unwrap_or("inputs"),
                                format!("inputs[{}]: {}", index, err),
                            )
                        })
                    })
                    .collect::<ConfigResult<Vec<_>>>()?;
                BufGenYamlFile::new(
                    file_version,
                    GenerateConfig::new(plugins, managed, None, inputs)?,
                    external.clean,
                )?
            }
        };
        if encoding::starts_with_comment(data, BUF_GEN_YAML_DOCS_LINK) {
            return Ok(file.with_docs_link());
        }
        Ok(file)
    };
    decode().map_err(|err| err.with_file_name(file_name))
}

fn collect_plugins<E>(
    externals: Vec<E>,
    convert: fn(E) -> ConfigResult<GeneratePluginConfig>,
) -> ConfigResult<Vec<GeneratePluginConfig>> {
    externals
        .into_iter()
        .enumerate()
        .map(|(index, external)| {
            convert(external).map_err(|err| match err {
                ConfigError::Invalid { field, message } => ConfigError::Invalid {
                    field,
                    message: format!("plugins[{}]: {}", index, message),
                },
                other => other,
            })
        })
        .collect()
}

// Encoding

fn to_external_v2(file: &BufGenYamlFile) -> ConfigResult<ExternalBufGenYamlFileV2> {
    let config = &file.generate_config;
    let inputs = match config.type_config.as_ref() {
        Some(types) if !types.include_types.is_empty() => {
            // Pre-v2 files generate from the current directory.
            let inputs = if config.inputs.is_empty() {
                vec![GenerateInputConfig::new(
                    InputKind::Directory,
                    ".",
                    InputOptions::default(),
                    InputFilters::default(),
                )?]
            } else {
                config.inputs.clone()
            };
            inputs
                .iter()
                .map(|input| input.with_extra_types(&types.include_types))
                .collect()
        }
        _ => config.inputs.clone(),
    };
    Ok(ExternalBufGenYamlFileV2 {
        version: FileVersion::V2.to_string(),
        clean: file.clean,
        plugins: config.plugins.iter().map(GeneratePluginConfig::to_external_v2).collect(),
        managed: config.managed.as_ref().map(GenerateManagedConfig::to_external_v2),
        inputs: inputs.iter().map(GenerateInputConfig::to_external_v2).collect(),
    })
}

/// Encode a manifest as a v2 `buf.gen.yaml`.
pub fn encode_buf_gen_yaml(file: &BufGenYamlFile) -> ConfigResult<Vec<u8>> {
    let file_name = FileKind::BufGenYaml.default_file_name();
    let header: &[&str] = if file.include_docs_link {
        &[BUF_GEN_YAML_DOCS_LINK]
    } else {
        &[]
    };
    let external = to_external_v2(file).map_err(|err| err.with_file_name(file_name))?;
    encoding::encode(header, &external).map_err(|err| err.with_file_name(file_name))
}

pub fn read_buf_gen_yaml(bucket: &dyn ReadBucket, dir: &str) -> ConfigResult<BufGenYamlFile> {
    let found = files::read_file(bucket, dir, FileKind::BufGenYaml)?;
    decode_buf_gen_yaml(&found.data, false).map_err(|err| err.with_file_name(&found.path))
}

/// Write `file` as `buf.gen.yaml` in `dir`.
pub fn put_buf_gen_yaml(
    bucket: &dyn WriteBucket,
    dir: &str,
    file: &BufGenYamlFile,
) -> ConfigResult<()> {
    let path = normalpath::join(dir, FileKind::BufGenYaml.default_file_name());
    let data = encode_buf_gen_yaml(file).map_err(|err| err.with_file_name(&path))?;
    bucket.put_atomic(&path, &data)
}

// External shapes

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufGenYamlFileV1Beta1 {
    #[allow(dead_code)]
    #[serde(default)]
    version: String,
    #[serde(default)]
    plugins: Vec<ExternalGeneratePluginConfigV1Beta1>,
    #[serde(default)]
    managed: bool,
    #[serde(default)]
    options: Option<ExternalOptionsV1Beta1>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalTypesConfigV1 {
    #[serde(default)]
    include: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufGenYamlFileV1 {
    #[allow(dead_code)]
    #[serde(default)]
    version: String,
    #[serde(default)]
    plugins: Vec<ExternalGeneratePluginConfigV1>,
    #[serde(default)]
    managed: Option<ExternalManagedConfigV1>,
    #[serde(default)]
    types: Option<ExternalTypesConfigV1>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalBufGenYamlFileV2 {
    version: String,
    #[serde(default, skip_serializing_if = "encoding::is_false")]
    clean: bool,
    #[serde(default)]
    plugins: Vec<ExternalGeneratePluginConfigV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    managed: Option<ExternalManagedConfigV2>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<ExternalInputConfigV2>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &str) -> String {
        let file = decode_buf_gen_yaml(data.as_bytes(), false).unwrap();
        String::from_utf8(encode_buf_gen_yaml(&file).unwrap()).unwrap()
    }

    #[test]
    fn test_v1_plugin_upgrade() {
        let out = roundtrip(
            "version: v1\nplugins:\n  - plugin: go\n    out: gen/go\n    opt: paths=source_relative\n    path: custom-gen-go\n    strategy: directory\n",
        );
        assert_eq!(
            out,
            "version: v2\nplugins:\n- local: custom-gen-go\n  out: gen/go\n  opt: paths=source_relative\n  strategy: directory\n"
        );
    }

    #[test]
    fn test_v2_fixed_point() {
        let data = "version: v2\nclean: true\nplugins:\n- remote: buf.build/protocolbuffers/go\n  out: gen\n  opt:\n  - a=b\n  - c=d\nmanaged:\n  enabled: true\n  disable:\n  - module: buf.build/googleapis/googleapis\n  override:\n  - file_option: go_package_prefix\n    value: example.com/gen\ninputs:\n- directory: proto\n";
        let once = roundtrip(data);
        assert_eq!(once, data);
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn test_empty_plugins_rejected() {
        let err = decode_buf_gen_yaml(b"version: v2\nplugins: []\n", false).unwrap_err();
        assert!(err.to_string().contains("at least one plugin"));
    }

    #[test]
    fn test_plugin_errors_name_index() {
        let err = decode_buf_gen_yaml(
            b"version: v2\nplugins:\n- local: protoc-gen-go\n  out: a\n- local: protoc-gen-go\n",
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("plugins[1]"));
        assert_eq!(err.field(), Some("out"));
    }

    #[test]
    fn test_v1_types_carried_onto_default_input() {
        let v1 = decode_buf_gen_yaml(
            b"version: v1\nplugins:\n- plugin: buf.build/protocolbuffers/go\n  out: gen\ntypes:\n  include: [acme.v1.Foo]\n",
            false,
        )
        .unwrap();
        assert_eq!(
            v1.generate_config().type_config().unwrap().include_types(),
            ["acme.v1.Foo"]
        );
        let out = String::from_utf8(encode_buf_gen_yaml(&v1).unwrap()).unwrap();
        let v2 = decode_buf_gen_yaml(out.as_bytes(), false).unwrap();
        let inputs = v2.generate_config().inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].kind(), InputKind::Directory);
        assert_eq!(inputs[0].location(), ".");
        assert_eq!(inputs[0].types(), ["acme.v1.Foo"]);
        assert_eq!(v2.generate_config().plugins(), v1.generate_config().plugins());
        assert_eq!(roundtrip(&out), out);
    }

    #[test]
    fn test_docs_link() {
        let data = format!(
            "{}\nversion: v2\nplugins:\n- local: protoc-gen-go\n  out: gen\n",
            BUF_GEN_YAML_DOCS_LINK
        );
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_v1beta1_managed_options() {
        let file = decode_buf_gen_yaml(
            b"version: v1beta1\nplugins:\n- name: java\n  out: gen\nmanaged: true\noptions:\n  optimize_for: CODE_SIZE\n",
            false,
        )
        .unwrap();
        let managed = file.generate_config().managed().unwrap();
        assert_eq!(
            managed.override_for(
                "a.proto",
                None,
                ManagedOption::File(FileOption::OptimizeFor),
                None
            ),
            Some(&OptionValue::OptimizeMode(OptimizeMode::CodeSize))
        );
    }
}
