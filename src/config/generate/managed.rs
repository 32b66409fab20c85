//! Managed mode: rules that set file and field options during generation.
//!
//! All versions map to one ordered list of disable rules and one ordered list
//! of override rules. For a given file (and field), a matching disable rule
//! wins over every override; among matching overrides the most specific wins,
//! and a later rule wins a tie.

use super::file_option::{FieldOption, FileOption, ManagedOption, OptionValue};
use crate::config::module_name::ModuleFullName;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::warn;

fn parse_path(path: Option<&str>) -> ConfigResult<Option<String>> {
    path.filter(|path| !path.is_empty())
        .map(|path| {
            normalpath::normalize_and_validate(path).map_err(|err| {
                ConfigError::invalid_field("path", format!("invalid path: {}", err))
            })
        })
        .transpose()
}

fn parse_module(module: Option<&str>) -> ConfigResult<Option<ModuleFullName>> {
    module
        .filter(|module| !module.is_empty())
        .map(|module| {
            ModuleFullName::parse(module)
                .map_err(|err| ConfigError::invalid_field("module", err.to_string()))
        })
        .transpose()
}

/// The scope a rule applies to. Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleScope {
    path: Option<String>,
    module: Option<ModuleFullName>,
    field_name: Option<String>,
}

impl RuleScope {
    fn matches(&self, file_path: &str, module: Option<&ModuleFullName>, field_name: Option<&str>) -> bool {
        let path_matches = self
            .path
            .as_deref()
            .is_none_or(|path| normalpath::equals_or_contains(path, file_path));
        let module_matches = self
            .module
            .as_ref()
            .is_none_or(|rule_module| module == Some(rule_module));
        let field_matches = self
            .field_name
            .as_deref()
            .is_none_or(|rule_field| field_name == Some(rule_field));
        path_matches && module_matches && field_matches
    }

    fn specificity(&self) -> usize {
        usize::from(self.path.is_some())
            + usize::from(self.module.is_some())
            + usize::from(self.field_name.is_some())
    }
}

/// Turns managed mode off for the options and files it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDisableRule {
    scope: RuleScope,
    file_option: Option<FileOption>,
    field_option: Option<FieldOption>,
}

impl ManagedDisableRule {
    pub fn new(
        path: Option<&str>,
        module: Option<&str>,
        field_name: Option<&str>,
        file_option: Option<FileOption>,
        field_option: Option<FieldOption>,
    ) -> ConfigResult<Self> {
        let field_name = field_name.filter(|name| !name.is_empty());
        let path = parse_path(path)?;
        let module = parse_module(module)?;
        if path.is_none()
            && module.is_none()
            && field_name.is_none()
            && file_option.is_none()
            && field_option.is_none()
        {
            return Err(ConfigError::invalid(
                "must set at least one of file_option, field_option, field, module or path for a disable rule",
            ));
        }
        if field_name.is_some() && file_option.is_some() {
            return Err(ConfigError::invalid(
                "cannot set both field and file_option for a disable rule",
            ));
        }
        if file_option.is_some() && field_option.is_some() {
            return Err(ConfigError::invalid(
                "cannot set both file_option and field_option for a disable rule",
            ));
        }
        Ok(Self {
            scope: RuleScope {
                path,
                module,
                field_name: field_name.map(str::to_string),
            },
            file_option,
            field_option,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.scope.path.as_deref()
    }

    pub fn module_full_name(&self) -> Option<&ModuleFullName> {
        self.scope.module.as_ref()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.scope.field_name.as_deref()
    }

    pub fn file_option(&self) -> Option<FileOption> {
        self.file_option
    }

    pub fn field_option(&self) -> Option<FieldOption> {
        self.field_option
    }

    fn matches(
        &self,
        file_path: &str,
        module: Option<&ModuleFullName>,
        option: ManagedOption,
        field_name: Option<&str>,
    ) -> bool {
        let option_matches = match option {
            ManagedOption::File(file_option) => {
                self.field_option.is_none()
                    && self.scope.field_name.is_none()
                    && self.file_option.is_none_or(|rule| rule == file_option)
            }
            ManagedOption::Field(field_option) => {
                self.file_option.is_none() && self.field_option.is_none_or(|rule| rule == field_option)
            }
        };
        option_matches && self.scope.matches(file_path, module, field_name)
    }
}

/// Sets one option to a value for the files (or fields) it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedOverrideRule {
    scope: RuleScope,
    option: ManagedOption,
    value: OptionValue,
}

impl ManagedOverrideRule {
    /// Build an override. Exactly one of `file_option` and `field_option` must
    /// be set, and `value` must type-check against it.
    pub fn new(
        path: Option<&str>,
        module: Option<&str>,
        field_name: Option<&str>,
        file_option: Option<FileOption>,
        field_option: Option<FieldOption>,
        value: Option<&Value>,
    ) -> ConfigResult<Self> {
        let field_name = field_name.filter(|name| !name.is_empty());
        let option = match (file_option, field_option) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "cannot set both file_option and field_option for an override rule",
                ));
            }
            (None, None) => {
                return Err(ConfigError::invalid(
                    "must set one of file_option and field_option for an override rule",
                ));
            }
            (Some(option), None) => ManagedOption::File(option),
            (None, Some(option)) => ManagedOption::Field(option),
        };
        if field_name.is_some() && file_option.is_some() {
            return Err(ConfigError::invalid(
                "cannot set both field and file_option for an override rule",
            ));
        }
        let Some(value) = value.filter(|value| !value.is_null()) else {
            return Err(ConfigError::missing_field("value"));
        };
        let value = option.parse_value(value)?;
        Ok(Self {
            scope: RuleScope {
                path: parse_path(path)?,
                module: parse_module(module)?,
                field_name: field_name.map(str::to_string),
            },
            option,
            value,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.scope.path.as_deref()
    }

    pub fn module_full_name(&self) -> Option<&ModuleFullName> {
        self.scope.module.as_ref()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.scope.field_name.as_deref()
    }

    pub fn option(&self) -> ManagedOption {
        self.option
    }

    pub fn value(&self) -> &OptionValue {
        &self.value
    }
}

/// Managed mode configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateManagedConfig {
    enabled: bool,
    disables: Vec<ManagedDisableRule>,
    overrides: Vec<ManagedOverrideRule>,
}

impl GenerateManagedConfig {
    pub fn new(
        enabled: bool,
        disables: Vec<ManagedDisableRule>,
        overrides: Vec<ManagedOverrideRule>,
    ) -> Self {
        Self {
            enabled,
            disables,
            overrides,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn disables(&self) -> &[ManagedDisableRule] {
        &self.disables
    }

    pub fn overrides(&self) -> &[ManagedOverrideRule] {
        &self.overrides
    }

    /// Whether managed mode leaves `option` untouched for this file (or field).
    pub fn is_disabled(
        &self,
        file_path: &str,
        module: Option<&ModuleFullName>,
        option: ManagedOption,
        field_name: Option<&str>,
    ) -> bool {
        !self.enabled
            || self
                .disables
                .iter()
                .any(|rule| rule.matches(file_path, module, option, field_name))
    }

    /// The value managed mode sets `option` to for this file (or field), if any.
    pub fn override_for(
        &self,
        file_path: &str,
        module: Option<&ModuleFullName>,
        option: ManagedOption,
        field_name: Option<&str>,
    ) -> Option<&OptionValue> {
        if self.is_disabled(file_path, module, option, field_name) {
            return None;
        }
        self.overrides
            .iter()
            .filter(|rule| rule.option == option && rule.scope.matches(file_path, module, field_name))
            // max_by_key keeps the last of equally specific rules.
            .max_by_key(|rule| rule.scope.specificity())
            .map(|rule| &rule.value)
    }

    pub(crate) fn to_external_v2(&self) -> ExternalManagedConfigV2 {
        ExternalManagedConfigV2 {
            enabled: self.enabled,
            disable: self
                .disables
                .iter()
                .map(|rule| ExternalManagedDisableConfigV2 {
                    file_option: rule.file_option.map(|o| o.to_string()).unwrap_or_default(),
                    field_option: rule.field_option.map(|o| o.to_string()).unwrap_or_default(),
                    module: rule.scope.module.as_ref().map(|m| m.to_string()).unwrap_or_default(),
                    path: rule.scope.path.clone().unwrap_or_default(),
                    field: rule.scope.field_name.clone().unwrap_or_default(),
                })
                .collect(),
            overrides: self
                .overrides
                .iter()
                .map(|rule| {
                    let (file_option, field_option) = match rule.option {
                        ManagedOption::File(option) => (option.to_string(), String::new()),
                        ManagedOption::Field(option) => (String::new(), option.to_string()),
                    };
                    ExternalManagedOverrideConfigV2 {
                        file_option,
                        field_option,
                        module: rule.scope.module.as_ref().map(|m| m.to_string()).unwrap_or_default(),
                        path: rule.scope.path.clone().unwrap_or_default(),
                        field: rule.scope.field_name.clone().unwrap_or_default(),
                        value: Some(rule.value.to_yaml()),
                    }
                })
                .collect(),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

pub(crate) fn managed_config_from_external_v2(
    external: &ExternalManagedConfigV2,
) -> ConfigResult<GenerateManagedConfig> {
    let mut disables = Vec::with_capacity(external.disable.len());
    for rule in &external.disable {
        disables.push(
            ManagedDisableRule::new(
                non_empty(&rule.path),
                non_empty(&rule.module),
                non_empty(&rule.field),
                non_empty(&rule.file_option).map(FileOption::parse).transpose()?,
                non_empty(&rule.field_option).map(FieldOption::parse).transpose()?,
            )
            .map_err(|err| prefix_error("managed.disable", err))?,
        );
    }
    let mut overrides = Vec::with_capacity(external.overrides.len());
    for rule in &external.overrides {
        overrides.push(
            ManagedOverrideRule::new(
                non_empty(&rule.path),
                non_empty(&rule.module),
                non_empty(&rule.field),
                non_empty(&rule.file_option).map(FileOption::parse).transpose()?,
                non_empty(&rule.field_option).map(FieldOption::parse).transpose()?,
                rule.value.as_ref(),
            )
            .map_err(|err| prefix_error("managed.override", err))?,
        );
    }
    Ok(GenerateManagedConfig::new(external.enabled, disables, overrides))
}

fn prefix_error(section: &str, err: ConfigError) -> ConfigError {
    let field = match err.field() {
        Some(field) => format!("{}.{}", section, field),
        None => section.to_string(),
    };
    ConfigError::invalid_field(&field, format!("{}: {}", section, err))
}

/// A v1 knob that is either a bare default or `{default, except, override}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ExternalManagedKnobV1 {
    Bool(bool),
    String(String),
    Detailed(ExternalManagedKnobDetailsV1),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalManagedKnobDetailsV1 {
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub except: Vec<String>,
    #[serde(default, rename = "override")]
    pub overrides: BTreeMap<String, Value>,
}

impl ExternalManagedKnobV1 {
    fn into_details(self) -> ExternalManagedKnobDetailsV1 {
        match self {
            ExternalManagedKnobV1::Bool(value) => ExternalManagedKnobDetailsV1 {
                default: Some(Value::Bool(value)),
                ..Default::default()
            },
            ExternalManagedKnobV1::String(value) => ExternalManagedKnobDetailsV1 {
                default: Some(Value::String(value)),
                ..Default::default()
            },
            ExternalManagedKnobV1::Detailed(details) => details,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalManagedConfigV1 {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cc_enable_arenas: Option<bool>,
    #[serde(default)]
    pub java_multiple_files: Option<bool>,
    #[serde(default)]
    pub java_string_check_utf8: Option<bool>,
    #[serde(default)]
    pub java_package_prefix: Option<ExternalManagedKnobV1>,
    #[serde(default)]
    pub csharp_namespace: Option<ExternalManagedKnobV1>,
    #[serde(default)]
    pub optimize_for: Option<ExternalManagedKnobV1>,
    #[serde(default)]
    pub go_package_prefix: Option<ExternalManagedKnobV1>,
    #[serde(default)]
    pub objc_class_prefix: Option<ExternalManagedKnobV1>,
    #[serde(default)]
    pub ruby_package: Option<ExternalManagedKnobV1>,
    /// `{FILE_OPTION: {path: value}}`
    #[serde(default, rename = "override")]
    pub overrides: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExternalManagedConfigV1 {
    fn has_knobs(&self) -> bool {
        self.cc_enable_arenas.is_some()
            || self.java_multiple_files.is_some()
            || self.java_string_check_utf8.is_some()
            || self.java_package_prefix.is_some()
            || self.csharp_namespace.is_some()
            || self.optimize_for.is_some()
            || self.go_package_prefix.is_some()
            || self.objc_class_prefix.is_some()
            || self.ruby_package.is_some()
            || !self.overrides.is_empty()
    }
}

/// Which options a v1 knob drives.
struct KnobSpec {
    name: &'static str,
    /// Option set by `default` and `override`.
    option: FileOption,
    /// Option disabled by `except`.
    except_option: FileOption,
    allow_default: bool,
    require_default: bool,
}

const fn knob(
    name: &'static str,
    option: FileOption,
    except_option: FileOption,
    allow_default: bool,
    require_default: bool,
) -> KnobSpec {
    KnobSpec {
        name,
        option,
        except_option,
        allow_default,
        require_default,
    }
}

#[derive(Default)]
struct RuleBuilder {
    disables: Vec<ManagedDisableRule>,
    overrides: Vec<ManagedOverrideRule>,
}

impl RuleBuilder {
    fn push_default(&mut self, option: FileOption, value: &Value) -> ConfigResult<()> {
        self.overrides.push(ManagedOverrideRule::new(
            None,
            None,
            None,
            Some(option),
            None,
            Some(value),
        )?);
        Ok(())
    }

    fn push_knob(&mut self, spec: &KnobSpec, knob: ExternalManagedKnobV1) -> ConfigResult<()> {
        let details = knob.into_details();
        let wrap = |err: ConfigError| {
            ConfigError::invalid_field(
                &format!("managed.{}", spec.name),
                format!("managed.{}: {}", spec.name, err),
            )
        };
        match &details.default {
            Some(value) if spec.allow_default => self.push_default(spec.option, value).map_err(wrap)?,
            Some(_) => {
                return Err(ConfigError::invalid_field(
                    &format!("managed.{}", spec.name),
                    format!("managed.{} does not accept a default value", spec.name),
                ));
            }
            None if spec.require_default => {
                return Err(ConfigError::invalid_field(
                    &format!("managed.{}.default", spec.name),
                    format!("managed.{} requires a default value", spec.name),
                ));
            }
            None => {}
        }
        for module in &details.except {
            self.disables.push(
                ManagedDisableRule::new(None, Some(module), None, Some(spec.except_option), None)
                    .map_err(wrap)?,
            );
        }
        for (module, value) in &details.overrides {
            if details.except.contains(module) {
                return Err(ConfigError::invalid_field(
                    &format!("managed.{}", spec.name),
                    format!(
                        "managed.{}: module {} is listed in both except and override",
                        spec.name, module
                    ),
                ));
            }
            self.overrides.push(
                ManagedOverrideRule::new(None, Some(module), None, Some(spec.option), None, Some(value))
                    .map_err(wrap)?,
            );
        }
        Ok(())
    }

    fn push_legacy_overrides(
        &mut self,
        overrides: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> ConfigResult<()> {
        let mut flattened = Vec::new();
        for (key, path_to_value) in overrides {
            let option = FileOption::parse_legacy_key(key)?;
            for (path, value) in path_to_value {
                flattened.push((option, path, value));
            }
        }
        flattened.sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));
        for (option, path, value) in flattened {
            self.overrides.push(
                ManagedOverrideRule::new(
                    Some(path),
                    None,
                    None,
                    Some(option),
                    None,
                    Some(&Value::String(value.clone())),
                )
                .map_err(|err| {
                    ConfigError::invalid_field(
                        "managed.override",
                        format!("managed.override.{}: {}", option_key(option), err),
                    )
                })?,
            );
        }
        Ok(())
    }

    fn build(self, enabled: bool) -> GenerateManagedConfig {
        GenerateManagedConfig::new(enabled, self.disables, self.overrides)
    }
}

fn option_key(option: FileOption) -> String {
    option.as_str().to_uppercase()
}

/// Map the v1 managed block to rules. Returns `None` when managed mode is off.
pub(crate) fn managed_config_from_external_v1(
    external: Option<ExternalManagedConfigV1>,
) -> ConfigResult<Option<GenerateManagedConfig>> {
    let Some(external) = external else {
        return Ok(None);
    };
    if !external.enabled {
        if external.has_knobs() {
            warn!("managed mode options are set but managed.enabled is false, ignoring them");
        }
        return Ok(None);
    }
    let mut builder = RuleBuilder::default();
    let bool_knobs = [
        (FileOption::CcEnableArenas, external.cc_enable_arenas),
        (FileOption::JavaMultipleFiles, external.java_multiple_files),
        (FileOption::JavaStringCheckUtf8, external.java_string_check_utf8),
    ];
    for (option, value) in bool_knobs {
        if let Some(value) = value {
            builder.push_default(option, &Value::Bool(value))?;
        }
    }
    let knobs = [
        (
            knob("java_package_prefix", FileOption::JavaPackagePrefix, FileOption::JavaPackage, true, false),
            external.java_package_prefix,
        ),
        (
            knob("csharp_namespace", FileOption::CsharpNamespace, FileOption::CsharpNamespace, false, false),
            external.csharp_namespace,
        ),
        (
            knob("optimize_for", FileOption::OptimizeFor, FileOption::OptimizeFor, true, false),
            external.optimize_for,
        ),
        (
            knob("go_package_prefix", FileOption::GoPackagePrefix, FileOption::GoPackage, true, true),
            external.go_package_prefix,
        ),
        (
            knob("objc_class_prefix", FileOption::ObjcClassPrefix, FileOption::ObjcClassPrefix, true, false),
            external.objc_class_prefix,
        ),
        (
            knob("ruby_package", FileOption::RubyPackage, FileOption::RubyPackage, false, false),
            external.ruby_package,
        ),
    ];
    for (spec, value) in knobs {
        if let Some(value) = value {
            builder.push_knob(&spec, value)?;
        }
    }
    builder.push_legacy_overrides(&external.overrides)?;
    Ok(Some(builder.build(true)))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalOptionsV1Beta1 {
    #[serde(default)]
    pub cc_enable_arenas: Option<bool>,
    #[serde(default)]
    pub java_multiple_files: Option<bool>,
    #[serde(default)]
    pub optimize_for: Option<String>,
}

/// Map the v1beta1 `managed` flag and `options` block to rules.
pub(crate) fn managed_config_from_external_v1beta1(
    managed: bool,
    options: Option<ExternalOptionsV1Beta1>,
) -> ConfigResult<Option<GenerateManagedConfig>> {
    let options = options.unwrap_or_default();
    let has_options = options.cc_enable_arenas.is_some()
        || options.java_multiple_files.is_some()
        || options.optimize_for.is_some();
    if !managed {
        if has_options {
            warn!("options are set but managed mode is off, ignoring them");
        }
        return Ok(None);
    }
    let mut builder = RuleBuilder::default();
    if let Some(value) = options.cc_enable_arenas {
        builder.push_default(FileOption::CcEnableArenas, &Value::Bool(value))?;
    }
    if let Some(value) = options.java_multiple_files {
        builder.push_default(FileOption::JavaMultipleFiles, &Value::Bool(value))?;
    }
    if let Some(value) = options.optimize_for {
        builder.push_default(FileOption::OptimizeFor, &Value::String(value))?;
    }
    Ok(Some(builder.build(true)))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalManagedDisableConfigV2 {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_option: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_option: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalManagedOverrideConfigV2 {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_option: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_option: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalManagedConfigV2 {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disable: Vec<ExternalManagedDisableConfigV2>,
    #[serde(default, rename = "override", skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ExternalManagedOverrideConfigV2>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate::file_option::OptimizeMode;

    fn string(value: &str) -> Value {
        Value::String(value.to_string())
    }

    fn module(name: &str) -> ModuleFullName {
        ModuleFullName::parse(name).unwrap()
    }

    #[test]
    fn test_disable_rule_invariants() {
        assert!(ManagedDisableRule::new(None, None, None, None, None).is_err());
        assert!(
            ManagedDisableRule::new(
                None,
                None,
                None,
                Some(FileOption::JavaPackage),
                Some(FieldOption::Jstype)
            )
            .is_err()
        );
        assert!(
            ManagedDisableRule::new(None, None, Some("foo.Bar.baz"), Some(FileOption::JavaPackage), None)
                .is_err()
        );
        assert!(ManagedDisableRule::new(Some("a/b"), None, None, None, None).is_ok());
    }

    #[test]
    fn test_override_rule_invariants() {
        let value = string("com.acme");
        assert!(
            ManagedOverrideRule::new(
                None,
                None,
                None,
                Some(FileOption::JavaPackage),
                Some(FieldOption::Jstype),
                Some(&value)
            )
            .is_err()
        );
        assert!(ManagedOverrideRule::new(None, None, None, None, None, Some(&value)).is_err());
        let err = ManagedOverrideRule::new(None, None, None, Some(FileOption::JavaPackage), None, None)
            .unwrap_err();
        assert_eq!(err.field(), Some("value"));
        assert!(
            ManagedOverrideRule::new(
                None,
                None,
                None,
                Some(FileOption::JavaPackage),
                None,
                Some(&Value::Null)
            )
            .is_err()
        );
    }

    #[test]
    fn test_most_specific_override_wins() {
        let config = GenerateManagedConfig::new(
            true,
            Vec::new(),
            vec![
                ManagedOverrideRule::new(
                    Some("acme"),
                    Some("buf.build/acme/weather"),
                    None,
                    Some(FileOption::JavaPackagePrefix),
                    None,
                    Some(&string("specific")),
                )
                .unwrap(),
                ManagedOverrideRule::new(
                    None,
                    None,
                    None,
                    Some(FileOption::JavaPackagePrefix),
                    None,
                    Some(&string("default")),
                )
                .unwrap(),
                ManagedOverrideRule::new(
                    Some("acme"),
                    None,
                    None,
                    Some(FileOption::JavaPackagePrefix),
                    None,
                    Some(&string("path")),
                )
                .unwrap(),
            ],
        );
        let option = ManagedOption::File(FileOption::JavaPackagePrefix);
        let weather = module("buf.build/acme/weather");
        assert_eq!(
            config.override_for("acme/v1/a.proto", Some(&weather), option, None),
            Some(&OptionValue::String("specific".to_string()))
        );
        assert_eq!(
            config.override_for("acme/v1/a.proto", None, option, None),
            Some(&OptionValue::String("path".to_string()))
        );
        assert_eq!(
            config.override_for("other/a.proto", Some(&weather), option, None),
            Some(&OptionValue::String("default".to_string()))
        );
    }

    #[test]
    fn test_later_rule_wins_ties_and_disable_beats_override() {
        let config = GenerateManagedConfig::new(
            true,
            vec![
                ManagedDisableRule::new(
                    None,
                    Some("buf.build/acme/vendored"),
                    None,
                    Some(FileOption::OptimizeFor),
                    None,
                )
                .unwrap(),
            ],
            vec![
                ManagedOverrideRule::new(
                    None,
                    None,
                    None,
                    Some(FileOption::OptimizeFor),
                    None,
                    Some(&string("SPEED")),
                )
                .unwrap(),
                ManagedOverrideRule::new(
                    None,
                    None,
                    None,
                    Some(FileOption::OptimizeFor),
                    None,
                    Some(&string("CODE_SIZE")),
                )
                .unwrap(),
            ],
        );
        let option = ManagedOption::File(FileOption::OptimizeFor);
        assert_eq!(
            config.override_for("a.proto", None, option, None),
            Some(&OptionValue::OptimizeMode(OptimizeMode::CodeSize))
        );
        let vendored = module("buf.build/acme/vendored");
        assert!(config.is_disabled("a.proto", Some(&vendored), option, None));
        assert_eq!(config.override_for("a.proto", Some(&vendored), option, None), None);
    }

    #[test]
    fn test_field_option_rules() {
        let config = GenerateManagedConfig::new(
            true,
            vec![ManagedDisableRule::new(None, None, Some("acme.Foo.id"), None, None).unwrap()],
            vec![
                ManagedOverrideRule::new(
                    None,
                    None,
                    None,
                    None,
                    Some(FieldOption::Jstype),
                    Some(&string("JS_STRING")),
                )
                .unwrap(),
            ],
        );
        let option = ManagedOption::Field(FieldOption::Jstype);
        assert!(config.override_for("a.proto", None, option, Some("acme.Foo.name")).is_some());
        assert!(config.override_for("a.proto", None, option, Some("acme.Foo.id")).is_none());
        // A field-scoped disable does not touch file options.
        assert!(!config.is_disabled(
            "a.proto",
            None,
            ManagedOption::File(FileOption::JavaPackage),
            None
        ));
    }

    #[test]
    fn test_v1_knob_order() {
        let external: ExternalManagedConfigV1 = serde_yaml::from_str(
            r#"
enabled: true
cc_enable_arenas: true
java_package_prefix:
  default: com
  except: [buf.build/acme/x]
  override:
    buf.build/acme/z: org
    buf.build/acme/y: net
optimize_for: SPEED
override:
  JAVA_PACKAGE:
    b.proto: com.b
    a.proto: com.a
"#,
        )
        .unwrap();
        let config = managed_config_from_external_v1(Some(external)).unwrap().unwrap();
        let overrides: Vec<(Option<&str>, Option<String>, ManagedOption)> = config
            .overrides()
            .iter()
            .map(|rule| {
                (
                    rule.path(),
                    rule.module_full_name().map(|m| m.to_string()),
                    rule.option(),
                )
            })
            .collect();
        let prefix = ManagedOption::File(FileOption::JavaPackagePrefix);
        assert_eq!(
            overrides,
            vec![
                (None, None, ManagedOption::File(FileOption::CcEnableArenas)),
                (None, None, prefix),
                (None, Some("buf.build/acme/y".to_string()), prefix),
                (None, Some("buf.build/acme/z".to_string()), prefix),
                (None, None, ManagedOption::File(FileOption::OptimizeFor)),
                (Some("a.proto"), None, ManagedOption::File(FileOption::JavaPackage)),
                (Some("b.proto"), None, ManagedOption::File(FileOption::JavaPackage)),
            ]
        );
        assert_eq!(config.disables().len(), 1);
        assert_eq!(config.disables()[0].file_option(), Some(FileOption::JavaPackage));
    }

    #[test]
    fn test_v1_except_and_override_conflict() {
        let external: ExternalManagedConfigV1 = serde_yaml::from_str(
            "enabled: true\nruby_package:\n  except: [buf.build/acme/x]\n  override:\n    buf.build/acme/x: Acme\n",
        )
        .unwrap();
        let err = managed_config_from_external_v1(Some(external)).unwrap_err();
        assert!(err.to_string().contains("both except and override"));
    }

    #[test]
    fn test_v1_go_package_prefix_requires_default() {
        let external: ExternalManagedConfigV1 = serde_yaml::from_str(
            "enabled: true\ngo_package_prefix:\n  except: [buf.build/acme/x]\n",
        )
        .unwrap();
        let err = managed_config_from_external_v1(Some(external)).unwrap_err();
        assert!(err.to_string().contains("requires a default"));
    }

    #[test]
    fn test_v1_disabled_drops_knobs() {
        let external: ExternalManagedConfigV1 =
            serde_yaml::from_str("enabled: false\ncc_enable_arenas: true\n").unwrap();
        assert!(managed_config_from_external_v1(Some(external)).unwrap().is_none());
    }

    #[test]
    fn test_v1_legacy_override_invalid_value() {
        let external: ExternalManagedConfigV1 = serde_yaml::from_str(
            "enabled: true\noverride:\n  JAVA_MULTIPLE_FILES:\n    a.proto: maybe\n",
        )
        .unwrap();
        let err = managed_config_from_external_v1(Some(external)).unwrap_err();
        assert!(err.to_string().contains("JAVA_MULTIPLE_FILES"));
        assert!(err.to_string().contains("\"maybe\""));
    }
}
