//! Check plugins declared in the `plugins` section of a v2 `buf.yaml`.

use super::encoding::StringOrList;
use super::module_name::ModuleRef;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

const WASM_SUFFIX: &str = ".wasm";

/// How a check plugin is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginConfigType {
    /// A local executable found on `$PATH` or by path.
    Local,
    /// A local WebAssembly module.
    LocalWasm,
    /// A WebAssembly plugin stored on a remote registry.
    RemoteWasm,
}

impl fmt::Display for PluginConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginConfigType::Local => "local",
            PluginConfigType::LocalWasm => "local_wasm",
            PluginConfigType::RemoteWasm => "remote_wasm",
        })
    }
}

/// Answers whether a path exists on the local filesystem.
///
/// Used to disambiguate plugin references: if the first segment of a
/// reference-like value exists locally, the value is treated as a local path.
pub trait LocalFileProbe: Send + Sync + fmt::Debug {
    fn exists(&self, path: &str) -> bool;
}

/// Probes the real filesystem, relative to `root`.
#[derive(Debug, Clone, Default)]
pub struct OsFileProbe {
    root: PathBuf,
}

impl OsFileProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LocalFileProbe for OsFileProbe {
    fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }
}

/// A check plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    plugin_type: PluginConfigType,
    name: String,
    options: BTreeMap<String, serde_yaml::Value>,
    args: Vec<String>,
    reference: Option<ModuleRef>,
}

impl PluginConfig {
    /// Classify and build a plugin from its invocation (`path` followed by args).
    pub fn new(
        invocation: Vec<String>,
        options: BTreeMap<String, serde_yaml::Value>,
        probe: &dyn LocalFileProbe,
    ) -> ConfigResult<Self> {
        let mut parts = invocation.into_iter();
        let Some(name) = parts.next().filter(|name| !name.is_empty()) else {
            return Err(ConfigError::missing_field("plugin"));
        };
        let args: Vec<String> = parts.collect();
        if normalpath::ext(&name) == WASM_SUFFIX {
            return Ok(Self {
                plugin_type: PluginConfigType::LocalWasm,
                name,
                options,
                args,
                reference: None,
            });
        }
        if let Ok(reference) = ModuleRef::parse(&name) {
            let first_segment = name.split('/').next().unwrap_or_default();
            if !probe.exists(first_segment) {
                return Ok(Self {
                    plugin_type: PluginConfigType::RemoteWasm,
                    name,
                    options,
                    args,
                    reference: Some(reference),
                });
            }
        }
        Ok(Self {
            plugin_type: PluginConfigType::Local,
            name,
            options,
            args,
            reference: None,
        })
    }

    pub fn plugin_type(&self) -> PluginConfigType {
        self.plugin_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.options
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn reference(&self) -> Option<&ModuleRef> {
        self.reference.as_ref()
    }

    pub(crate) fn from_external_v2(
        external: ExternalPluginConfigV2,
        probe: &dyn LocalFileProbe,
    ) -> ConfigResult<Self> {
        let invocation = external.plugin.map(StringOrList::into_vec).unwrap_or_default();
        Self::new(invocation, external.options, probe)
    }

    pub(crate) fn to_external_v2(&self) -> ExternalPluginConfigV2 {
        let mut invocation = Vec::with_capacity(self.args.len() + 1);
        invocation.push(self.name.clone());
        invocation.extend(self.args.iter().cloned());
        ExternalPluginConfigV2 {
            plugin: StringOrList::from_slice(&invocation),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalPluginConfigV2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_yaml::Value>,
}
