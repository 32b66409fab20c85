//! Plugins invoked by `buf.gen.yaml`.

use crate::config::encoding::StringOrList;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plugin names protoc implements itself.
const PROTOC_BUILTIN_NAMES: &[&str] = &[
    "cpp", "csharp", "java", "js", "kotlin", "objc", "php", "pyi", "python", "ruby",
];

const LOCAL_PLUGIN_PREFIX: &str = "protoc-gen-";

pub fn is_protoc_builtin(name: &str) -> bool {
    PROTOC_BUILTIN_NAMES.contains(&name)
}

/// How files are batched into plugin invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerateStrategy {
    /// One invocation per directory.
    Directory,
    /// One invocation for all files.
    All,
}

impl GenerateStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerateStrategy::Directory => "directory",
            GenerateStrategy::All => "all",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "directory" => Ok(GenerateStrategy::Directory),
            "all" => Ok(GenerateStrategy::All),
            other => Err(ConfigError::invalid_field(
                "strategy",
                format!("unknown strategy {:?}, expected directory or all", other),
            )),
        }
    }
}

impl fmt::Display for GenerateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a plugin comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratePluginType {
    /// A plugin hosted on a registry; revision 0 means latest.
    Remote { remote_host: String, revision: u32 },
    /// A local executable and its arguments.
    Local { path: Vec<String> },
    /// A generator built into protoc, run through `protoc_path` if set.
    ProtocBuiltin { protoc_path: Vec<String> },
    /// A bare name that may be a `protoc-gen-<name>` binary on the PATH or a
    /// protoc builtin.
    ///
    /// The choice is deferred until run time: decoding never looks at the PATH,
    /// and the runner tries the binary first and falls back to the builtin.
    /// Encoding writes the name back as `local`.
    LocalOrProtocBuiltin,
}

/// Settings shared by every plugin type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSettings {
    pub out: String,
    pub opts: Vec<String>,
    pub include_imports: bool,
    pub include_wkt: bool,
    pub strategy: Option<GenerateStrategy>,
    pub postprocess_cmd: Vec<String>,
}

impl PluginSettings {
    pub fn new(out: impl Into<String>) -> Self {
        Self {
            out: out.into(),
            ..Default::default()
        }
    }
}

/// A plugin entry in `buf.gen.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratePluginConfig {
    name: String,
    plugin_type: GeneratePluginType,
    settings: PluginSettings,
}

impl GeneratePluginConfig {
    pub fn new_remote(name: &str, revision: u32, settings: PluginSettings) -> ConfigResult<Self> {
        let remote_host = match name.split_once('/') {
            Some((host, rest)) if !host.is_empty() && !rest.is_empty() => host.to_string(),
            _ => {
                return Err(ConfigError::invalid_field(
                    "remote",
                    format!("invalid remote plugin name {:?}, expected host/owner/plugin", name),
                ));
            }
        };
        if settings.strategy.is_some() {
            return Err(ConfigError::invalid_field(
                "strategy",
                format!("remote plugin {} cannot specify a strategy", name),
            ));
        }
        Self::build(
            name.to_string(),
            GeneratePluginType::Remote {
                remote_host,
                revision,
            },
            settings,
        )
    }

    pub fn new_local(path: Vec<String>, settings: PluginSettings) -> ConfigResult<Self> {
        let name = match path.first() {
            Some(first) if !first.is_empty() => first.clone(),
            _ => return Err(ConfigError::missing_field("local")),
        };
        Self::build(name, GeneratePluginType::Local { path }, settings)
    }

    pub fn new_protoc_builtin(
        name: &str,
        protoc_path: Vec<String>,
        settings: PluginSettings,
    ) -> ConfigResult<Self> {
        if protoc_path.iter().any(String::is_empty) {
            return Err(ConfigError::invalid_field(
                "protoc_path",
                "protoc_path cannot contain empty strings",
            ));
        }
        Self::build(
            name.to_string(),
            GeneratePluginType::ProtocBuiltin { protoc_path },
            settings,
        )
    }

    pub fn new_local_or_protoc_builtin(name: &str, settings: PluginSettings) -> ConfigResult<Self> {
        Self::build(
            name.to_string(),
            GeneratePluginType::LocalOrProtocBuiltin,
            settings,
        )
    }

    fn build(
        name: String,
        plugin_type: GeneratePluginType,
        settings: PluginSettings,
    ) -> ConfigResult<Self> {
        if name.is_empty() {
            return Err(ConfigError::invalid("plugin name cannot be empty"));
        }
        if settings.out.is_empty() {
            return Err(ConfigError::missing_field("out"));
        }
        if settings.include_wkt && !settings.include_imports {
            return Err(ConfigError::invalid_field(
                "include_wkt",
                format!("plugin {}: include_wkt requires include_imports", name),
            ));
        }
        Ok(Self {
            name,
            plugin_type,
            settings,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin_type(&self) -> &GeneratePluginType {
        &self.plugin_type
    }

    pub fn out(&self) -> &str {
        &self.settings.out
    }

    pub fn opts(&self) -> &[String] {
        &self.settings.opts
    }

    /// The options joined the way protoc receives them.
    pub fn opt_string(&self) -> String {
        self.settings.opts.join(",")
    }

    pub fn include_imports(&self) -> bool {
        self.settings.include_imports
    }

    pub fn include_wkt(&self) -> bool {
        self.settings.include_wkt
    }

    /// Remote plugins always run with [`GenerateStrategy::All`]; everything
    /// else defaults to [`GenerateStrategy::Directory`].
    pub fn strategy(&self) -> GenerateStrategy {
        match self.plugin_type {
            GeneratePluginType::Remote { .. } => GenerateStrategy::All,
            _ => self.settings.strategy.unwrap_or(GenerateStrategy::Directory),
        }
    }

    pub fn postprocess_cmd(&self) -> &[String] {
        &self.settings.postprocess_cmd
    }

    pub(crate) fn to_external_v2(&self) -> ExternalGeneratePluginConfigV2 {
        let mut external = ExternalGeneratePluginConfigV2 {
            out: self.settings.out.clone(),
            opt: StringOrList::from_slice(&self.settings.opts),
            include_imports: self.settings.include_imports,
            include_wkt: self.settings.include_wkt,
            strategy: self.settings.strategy.map(|s| s.to_string()),
            postprocess_cmd: self.settings.postprocess_cmd.clone(),
            ..Default::default()
        };
        match &self.plugin_type {
            GeneratePluginType::Remote { revision, .. } => {
                external.remote = Some(self.name.clone());
                external.revision = (*revision != 0).then_some(i64::from(*revision));
            }
            GeneratePluginType::Local { path } => {
                external.local = StringOrList::from_slice(path);
            }
            GeneratePluginType::ProtocBuiltin { protoc_path } => {
                external.protoc_builtin = Some(self.name.clone());
                external.protoc_path = StringOrList::from_slice(protoc_path);
            }
            GeneratePluginType::LocalOrProtocBuiltin => {
                external.local = Some(StringOrList::Scalar(self.name.clone()));
            }
        }
        external
    }
}

fn parse_strategy(raw: Option<&str>) -> ConfigResult<Option<GenerateStrategy>> {
    raw.filter(|s| !s.is_empty())
        .map(GenerateStrategy::parse)
        .transpose()
}

fn opts(raw: Option<StringOrList>) -> Vec<String> {
    raw.map(StringOrList::into_vec).unwrap_or_default()
}

/// A name given without a path is either a builtin or `protoc-gen-<name>`.
fn plugin_from_bare_name(name: &str, settings: PluginSettings) -> ConfigResult<GeneratePluginConfig> {
    if is_protoc_builtin(name) {
        GeneratePluginConfig::new_local_or_protoc_builtin(name, settings)
    } else {
        GeneratePluginConfig::new_local(vec![format!("{}{}", LOCAL_PLUGIN_PREFIX, name)], settings)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalGeneratePluginConfigV1Beta1 {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub out: String,
    #[serde(default)]
    pub opt: Option<StringOrList>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
}

pub(crate) fn plugin_config_from_external_v1beta1(
    external: ExternalGeneratePluginConfigV1Beta1,
) -> ConfigResult<GeneratePluginConfig> {
    if external.name.is_empty() {
        return Err(ConfigError::missing_field("name"));
    }
    let settings = PluginSettings {
        out: external.out,
        opts: opts(external.opt),
        strategy: parse_strategy(external.strategy.as_deref())?,
        ..Default::default()
    };
    match external.path.filter(|path| !path.is_empty()) {
        Some(path) => GeneratePluginConfig::new_local(vec![path], settings),
        None => plugin_from_bare_name(&external.name, settings),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalGeneratePluginConfigV1 {
    #[serde(default)]
    pub plugin: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub out: String,
    #[serde(default)]
    pub opt: Option<StringOrList>,
    #[serde(default)]
    pub path: Option<StringOrList>,
    #[serde(default)]
    pub protoc_path: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub revision: Option<i64>,
}

pub(crate) fn plugin_config_from_external_v1(
    external: ExternalGeneratePluginConfigV1,
) -> ConfigResult<GeneratePluginConfig> {
    let set = [&external.plugin, &external.name, &external.remote]
        .iter()
        .filter(|value| !value.is_empty())
        .count();
    if set == 0 {
        return Err(ConfigError::invalid_field(
            "plugin",
            "plugin must specify one of plugin or name",
        ));
    }
    if set > 1 {
        return Err(ConfigError::invalid_field(
            "plugin",
            "only one of plugin, name or remote may be set",
        ));
    }
    if !external.remote.is_empty() {
        return Err(ConfigError::invalid_field(
            "remote",
            format!(
                "plugin {}: the remote key is deprecated, use plugin instead",
                external.remote
            ),
        ));
    }
    let name = if external.plugin.is_empty() {
        external.name
    } else {
        external.plugin
    };
    let path = external.path.map(StringOrList::into_vec).unwrap_or_default();
    let protoc_path = external.protoc_path.filter(|p| !p.is_empty());
    let settings = PluginSettings {
        out: external.out,
        opts: opts(external.opt),
        strategy: parse_strategy(external.strategy.as_deref())?,
        ..Default::default()
    };

    if name.contains('/') {
        if !path.is_empty() {
            return Err(ConfigError::invalid_field(
                "path",
                format!("remote plugin {} cannot specify a path", name),
            ));
        }
        if protoc_path.is_some() {
            return Err(ConfigError::invalid_field(
                "protoc_path",
                format!("remote plugin {} cannot specify a protoc_path", name),
            ));
        }
        let revision = parse_revision(external.revision)?;
        return GeneratePluginConfig::new_remote(&name, revision, settings);
    }
    if external.revision.is_some() {
        return Err(ConfigError::invalid_field(
            "revision",
            format!("local plugin {} cannot specify a revision", name),
        ));
    }
    match (path.is_empty(), protoc_path) {
        (false, Some(_)) => Err(ConfigError::invalid_field(
            "protoc_path",
            format!("plugin {}: only one of path and protoc_path may be set", name),
        )),
        (false, None) => GeneratePluginConfig::new_local(path, settings),
        (true, Some(protoc_path)) => {
            GeneratePluginConfig::new_protoc_builtin(&name, vec![protoc_path], settings)
        }
        (true, None) => plugin_from_bare_name(&name, settings),
    }
}

fn parse_revision(raw: Option<i64>) -> ConfigResult<u32> {
    match raw {
        None => Ok(0),
        Some(value) => u32::try_from(value).map_err(|_| {
            ConfigError::invalid_field(
                "revision",
                format!("revision {} is out of range, expected 0 to {}", value, u32::MAX),
            )
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalGeneratePluginConfigV2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protoc_builtin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protoc_path: Option<StringOrList>,
    #[serde(default)]
    pub out: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "crate::config::encoding::is_false")]
    pub include_imports: bool,
    #[serde(default, skip_serializing_if = "crate::config::encoding::is_false")]
    pub include_wkt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postprocess_cmd: Vec<String>,
}

pub(crate) fn plugin_config_from_external_v2(
    external: ExternalGeneratePluginConfigV2,
) -> ConfigResult<GeneratePluginConfig> {
    let local = external
        .local
        .map(StringOrList::into_vec)
        .filter(|local| !local.is_empty());
    let remote = external.remote.filter(|r| !r.is_empty());
    let protoc_builtin = external.protoc_builtin.filter(|p| !p.is_empty());
    let set = usize::from(remote.is_some())
        + usize::from(local.is_some())
        + usize::from(protoc_builtin.is_some());
    if set == 0 {
        return Err(ConfigError::invalid_field(
            "plugins",
            "must specify one of remote, local or protoc_builtin",
        ));
    }
    if set > 1 {
        return Err(ConfigError::invalid_field(
            "plugins",
            "only one of remote, local or protoc_builtin",
        ));
    }
    if remote.is_none() && external.revision.is_some() {
        return Err(ConfigError::invalid_field(
            "revision",
            "revision may only be specified for remote plugins",
        ));
    }
    let protoc_path = external
        .protoc_path
        .map(StringOrList::into_vec)
        .unwrap_or_default();
    if protoc_builtin.is_none() && !protoc_path.is_empty() {
        return Err(ConfigError::invalid_field(
            "protoc_path",
            "protoc_path may only be specified for protoc_builtin plugins",
        ));
    }
    let settings = PluginSettings {
        out: external.out,
        opts: opts(external.opt),
        include_imports: external.include_imports,
        include_wkt: external.include_wkt,
        strategy: parse_strategy(external.strategy.as_deref())?,
        postprocess_cmd: external.postprocess_cmd,
    };
    if let Some(remote) = remote {
        let revision = parse_revision(external.revision)?;
        return GeneratePluginConfig::new_remote(&remote, revision, settings);
    }
    if let Some(name) = protoc_builtin {
        return GeneratePluginConfig::new_protoc_builtin(&name, protoc_path, settings);
    }
    match local {
        Some(path) if path.len() == 1 && is_protoc_builtin(&path[0]) => {
            GeneratePluginConfig::new_local_or_protoc_builtin(&path[0], settings)
        }
        Some(path) => GeneratePluginConfig::new_local(path, settings),
        None => Err(ConfigError::system("plugin discriminant vanished")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2(yaml: &str) -> ConfigResult<GeneratePluginConfig> {
        let external: ExternalGeneratePluginConfigV2 = serde_yaml::from_str(yaml).unwrap();
        plugin_config_from_external_v2(external)
    }

    fn v1(yaml: &str) -> ConfigResult<GeneratePluginConfig> {
        let external: ExternalGeneratePluginConfigV1 = serde_yaml::from_str(yaml).unwrap();
        plugin_config_from_external_v1(external)
    }

    #[test]
    fn test_v2_discriminants() {
        let err = v2("remote: buf.build/protocolbuffers/go\nlocal: protoc-gen-go\nout: gen\n")
            .unwrap_err();
        assert!(err.to_string().contains("only one of remote, local or protoc_builtin"));

        let err = v2("out: gen\n").unwrap_err();
        assert!(err.to_string().contains("must specify one of remote, local or protoc_builtin"));
    }

    #[test]
    fn test_v2_remote() {
        let plugin = v2("remote: buf.build/protocolbuffers/go:v1.31.0\nrevision: 2\nout: gen\n")
            .unwrap();
        assert_eq!(
            plugin.plugin_type(),
            &GeneratePluginType::Remote {
                remote_host: "buf.build".to_string(),
                revision: 2
            }
        );
        assert_eq!(plugin.strategy(), GenerateStrategy::All);

        let err = v2("remote: buf.build/protocolbuffers/go\nstrategy: all\nout: gen\n").unwrap_err();
        assert_eq!(err.field(), Some("strategy"));

        assert!(v2("remote: buf.build/acme/go\nrevision: -1\nout: gen\n").is_err());
        assert!(v2("remote: buf.build/acme/go\nrevision: 4294967296\nout: gen\n").is_err());
        assert!(v2("remote: buf.build/acme/go\nrevision: 4294967295\nout: gen\n").is_ok());
    }

    #[test]
    fn test_v2_type_specific_fields() {
        let err = v2("local: protoc-gen-go\nrevision: 1\nout: gen\n").unwrap_err();
        assert_eq!(err.field(), Some("revision"));
        let err = v2("local: protoc-gen-go\nprotoc_path: protoc\nout: gen\n").unwrap_err();
        assert_eq!(err.field(), Some("protoc_path"));
        let plugin = v2("protoc_builtin: java\nprotoc_path: [bin/protoc, --x]\nout: gen\n").unwrap();
        assert_eq!(
            plugin.plugin_type(),
            &GeneratePluginType::ProtocBuiltin {
                protoc_path: vec!["bin/protoc".to_string(), "--x".to_string()]
            }
        );
    }

    #[test]
    fn test_v2_local_builtin_name_is_deferred() {
        let plugin = v2("local: java\nout: gen\n").unwrap();
        assert_eq!(plugin.plugin_type(), &GeneratePluginType::LocalOrProtocBuiltin);
        assert_eq!(plugin.name(), "java");
        // Written back unresolved.
        let external = plugin.to_external_v2();
        assert_eq!(external.local, Some(StringOrList::Scalar("java".to_string())));
        assert!(external.protoc_builtin.is_none());
        assert!(external.protoc_path.is_none());
        let plugin = v2("local: [protoc-gen-go, --debug]\nout: gen\n").unwrap();
        assert_eq!(plugin.name(), "protoc-gen-go");
    }

    #[test]
    fn test_out_and_wkt_invariants() {
        let err = v2("local: protoc-gen-go\n").unwrap_err();
        assert_eq!(err.field(), Some("out"));
        let err = v2("local: protoc-gen-go\nout: gen\ninclude_wkt: true\n").unwrap_err();
        assert!(err.to_string().contains("include_wkt requires include_imports"));
    }

    #[test]
    fn test_v1_path_makes_local_plugin() {
        let plugin = v1(
            "plugin: go\nout: gen/go\nopt: paths=source_relative\npath: custom-gen-go\nstrategy: directory\n",
        )
        .unwrap();
        assert_eq!(plugin.name(), "custom-gen-go");
        assert_eq!(
            plugin.plugin_type(),
            &GeneratePluginType::Local {
                path: vec!["custom-gen-go".to_string()]
            }
        );
        let external = plugin.to_external_v2();
        assert_eq!(
            serde_yaml::to_string(&external).unwrap(),
            "local: custom-gen-go\nout: gen/go\nopt: paths=source_relative\nstrategy: directory\n"
        );
    }

    #[test]
    fn test_v1_classification() {
        let plugin = v1("plugin: buf.build/protocolbuffers/go\nout: gen\nrevision: 3\n").unwrap();
        assert!(matches!(plugin.plugin_type(), GeneratePluginType::Remote { revision: 3, .. }));
        let plugin = v1("name: python\nout: gen\n").unwrap();
        assert_eq!(plugin.plugin_type(), &GeneratePluginType::LocalOrProtocBuiltin);
        let plugin = v1("plugin: go\nout: gen\n").unwrap();
        assert_eq!(plugin.name(), "protoc-gen-go");
        let plugin = v1("plugin: java\nout: gen\nprotoc_path: /usr/bin/protoc\n").unwrap();
        assert!(matches!(plugin.plugin_type(), GeneratePluginType::ProtocBuiltin { .. }));

        assert!(v1("plugin: go\nname: go\nout: gen\n").is_err());
        let err = v1("remote: buf.build/acme/go\nout: gen\n").unwrap_err();
        assert!(err.to_string().contains("deprecated"));
        assert!(v1("plugin: go\nout: gen\nrevision: 1\n").is_err());
    }

    #[test]
    fn test_opts_scalar_and_list() {
        let plugin = v2("local: protoc-gen-go\nout: gen\nopt: [a=b, c=d]\n").unwrap();
        assert_eq!(plugin.opt_string(), "a=b,c=d");
        assert_eq!(
            plugin.to_external_v2().opt,
            Some(StringOrList::List(vec!["a=b".to_string(), "c=d".to_string()]))
        );
    }
}
