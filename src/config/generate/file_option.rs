//! File and field options that managed mode can set.

use crate::error::{ConfigError, ConfigResult};
use heck::ToSnakeCase;
use serde_yaml::Value;
use std::fmt;

/// The type of value an option takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValueType {
    Bool,
    String,
    OptimizeMode,
    JsType,
}

/// A file option managed mode can override or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileOption {
    JavaPackage,
    JavaPackagePrefix,
    JavaPackageSuffix,
    JavaOuterClassname,
    JavaMultipleFiles,
    JavaStringCheckUtf8,
    OptimizeFor,
    GoPackage,
    GoPackagePrefix,
    CcEnableArenas,
    ObjcClassPrefix,
    CsharpNamespace,
    CsharpNamespacePrefix,
    PhpNamespace,
    PhpMetadataNamespace,
    PhpMetadataNamespaceSuffix,
    RubyPackage,
    RubyPackageSuffix,
    SwiftPrefix,
}

impl FileOption {
    pub const ALL: [FileOption; 19] = [
        FileOption::JavaPackage,
        FileOption::JavaPackagePrefix,
        FileOption::JavaPackageSuffix,
        FileOption::JavaOuterClassname,
        FileOption::JavaMultipleFiles,
        FileOption::JavaStringCheckUtf8,
        FileOption::OptimizeFor,
        FileOption::GoPackage,
        FileOption::GoPackagePrefix,
        FileOption::CcEnableArenas,
        FileOption::ObjcClassPrefix,
        FileOption::CsharpNamespace,
        FileOption::CsharpNamespacePrefix,
        FileOption::PhpNamespace,
        FileOption::PhpMetadataNamespace,
        FileOption::PhpMetadataNamespaceSuffix,
        FileOption::RubyPackage,
        FileOption::RubyPackageSuffix,
        FileOption::SwiftPrefix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileOption::JavaPackage => "java_package",
            FileOption::JavaPackagePrefix => "java_package_prefix",
            FileOption::JavaPackageSuffix => "java_package_suffix",
            FileOption::JavaOuterClassname => "java_outer_classname",
            FileOption::JavaMultipleFiles => "java_multiple_files",
            FileOption::JavaStringCheckUtf8 => "java_string_check_utf8",
            FileOption::OptimizeFor => "optimize_for",
            FileOption::GoPackage => "go_package",
            FileOption::GoPackagePrefix => "go_package_prefix",
            FileOption::CcEnableArenas => "cc_enable_arenas",
            FileOption::ObjcClassPrefix => "objc_class_prefix",
            FileOption::CsharpNamespace => "csharp_namespace",
            FileOption::CsharpNamespacePrefix => "csharp_namespace_prefix",
            FileOption::PhpNamespace => "php_namespace",
            FileOption::PhpMetadataNamespace => "php_metadata_namespace",
            FileOption::PhpMetadataNamespaceSuffix => "php_metadata_namespace_suffix",
            FileOption::RubyPackage => "ruby_package",
            FileOption::RubyPackageSuffix => "ruby_package_suffix",
            FileOption::SwiftPrefix => "swift_prefix",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        FileOption::ALL
            .into_iter()
            .find(|option| option.as_str() == value)
            .ok_or_else(|| {
                ConfigError::invalid_field("file_option", format!("unknown file option {:?}", value))
            })
    }

    /// Parse the upper-case spelling used by v1 override maps, e.g. `JAVA_PACKAGE`.
    pub fn parse_legacy_key(value: &str) -> ConfigResult<Self> {
        if value != value.to_uppercase() {
            return Err(ConfigError::invalid_field(
                "override",
                format!("{:?} is not a valid file option key, expected upper case", value),
            ));
        }
        Self::parse(&value.to_snake_case()).map_err(|_| {
            ConfigError::invalid_field("override", format!("unknown file option {:?}", value))
        })
    }

    pub fn value_type(self) -> OptionValueType {
        match self {
            FileOption::JavaMultipleFiles
            | FileOption::JavaStringCheckUtf8
            | FileOption::CcEnableArenas => OptionValueType::Bool,
            FileOption::OptimizeFor => OptionValueType::OptimizeMode,
            _ => OptionValueType::String,
        }
    }
}

impl fmt::Display for FileOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field option managed mode can override or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldOption {
    Jstype,
}

impl FieldOption {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldOption::Jstype => "jstype",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "jstype" => Ok(FieldOption::Jstype),
            other => Err(ConfigError::invalid_field(
                "field_option",
                format!("unknown field option {:?}", other),
            )),
        }
    }

    pub fn value_type(self) -> OptionValueType {
        match self {
            FieldOption::Jstype => OptionValueType::JsType,
        }
    }
}

impl fmt::Display for FieldOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either kind of managed option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedOption {
    File(FileOption),
    Field(FieldOption),
}

impl ManagedOption {
    pub fn value_type(self) -> OptionValueType {
        match self {
            ManagedOption::File(option) => option.value_type(),
            ManagedOption::Field(option) => option.value_type(),
        }
    }

    /// Type-check a raw value for this option.
    pub fn parse_value(self, raw: &Value) -> ConfigResult<OptionValue> {
        let invalid = |reason: &str| {
            ConfigError::invalid_field(
                "value",
                format!(
                    "invalid value {} for {}: {}",
                    display_raw(raw),
                    self,
                    reason
                ),
            )
        };
        match (self.value_type(), raw) {
            (OptionValueType::Bool, Value::Bool(value)) => Ok(OptionValue::Bool(*value)),
            (OptionValueType::Bool, Value::String(value)) => match value.as_str() {
                "true" => Ok(OptionValue::Bool(true)),
                "false" => Ok(OptionValue::Bool(false)),
                _ => Err(invalid("expected a boolean")),
            },
            (OptionValueType::Bool, _) => Err(invalid("expected a boolean")),
            (OptionValueType::String, Value::String(value)) if !value.is_empty() => {
                Ok(OptionValue::String(value.clone()))
            }
            (OptionValueType::String, _) => Err(invalid("expected a non-empty string")),
            (OptionValueType::OptimizeMode, Value::String(value)) => OptimizeMode::parse(value)
                .map(OptionValue::OptimizeMode)
                .ok_or_else(|| invalid("expected one of SPEED, CODE_SIZE or LITE_RUNTIME")),
            (OptionValueType::OptimizeMode, _) => {
                Err(invalid("expected one of SPEED, CODE_SIZE or LITE_RUNTIME"))
            }
            (OptionValueType::JsType, Value::String(value)) => JsType::parse(value)
                .map(OptionValue::JsType)
                .ok_or_else(|| invalid("expected one of JS_NORMAL, JS_STRING or JS_NUMBER")),
            (OptionValueType::JsType, _) => {
                Err(invalid("expected one of JS_NORMAL, JS_STRING or JS_NUMBER"))
            }
        }
    }
}

impl fmt::Display for ManagedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagedOption::File(option) => write!(f, "file option {}", option),
            ManagedOption::Field(option) => write!(f, "field option {}", option),
        }
    }
}

fn display_raw(raw: &Value) -> String {
    match raw {
        Value::String(value) => format!("{:?}", value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizeMode {
    Speed,
    CodeSize,
    LiteRuntime,
}

impl OptimizeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizeMode::Speed => "SPEED",
            OptimizeMode::CodeSize => "CODE_SIZE",
            OptimizeMode::LiteRuntime => "LITE_RUNTIME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SPEED" => Some(OptimizeMode::Speed),
            "CODE_SIZE" => Some(OptimizeMode::CodeSize),
            "LITE_RUNTIME" => Some(OptimizeMode::LiteRuntime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsType {
    JsNormal,
    JsString,
    JsNumber,
}

impl JsType {
    pub fn as_str(self) -> &'static str {
        match self {
            JsType::JsNormal => "JS_NORMAL",
            JsType::JsString => "JS_STRING",
            JsType::JsNumber => "JS_NUMBER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "JS_NORMAL" => Some(JsType::JsNormal),
            "JS_STRING" => Some(JsType::JsString),
            "JS_NUMBER" => Some(JsType::JsNumber),
            _ => None,
        }
    }
}

/// A type-checked option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Bool(bool),
    String(String),
    OptimizeMode(OptimizeMode),
    JsType(JsType),
}

impl OptionValue {
    pub(crate) fn to_yaml(&self) -> Value {
        match self {
            OptionValue::Bool(value) => Value::Bool(*value),
            OptionValue::String(value) => Value::String(value.clone()),
            OptionValue::OptimizeMode(mode) => Value::String(mode.as_str().to_string()),
            OptionValue::JsType(js_type) => Value::String(js_type.as_str().to_string()),
        }
    }
}
