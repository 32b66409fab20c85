//! Lint and breaking-change check configuration.
//!
//! Both categories share a common base, [`CheckConfig`], which is either
//! disabled outright or carries rule selection and ignore paths. Paths held
//! by a `CheckConfig` are always relative to the owning module's directory.

use super::encoding::is_false;
use super::version::FileVersion;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

pub const DEFAULT_ENUM_ZERO_VALUE_SUFFIX: &str = "_UNSPECIFIED";
pub const DEFAULT_SERVICE_SUFFIX: &str = "Service";

/// Which check category a configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Lint,
    Breaking,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Lint => "lint",
            CheckKind::Breaking => "breaking",
        }
    }

    /// Rule IDs and categories used when `use` is empty.
    pub fn default_use_ids(self, file_version: FileVersion) -> &'static [&'static str] {
        match (self, file_version) {
            (CheckKind::Lint, FileVersion::V1Beta1 | FileVersion::V1) => &["DEFAULT"],
            (CheckKind::Lint, FileVersion::V2) => &["STANDARD"],
            (CheckKind::Breaking, _) => &["FILE"],
        }
    }
}

/// Rename a rule ID or category written for `from` into its `to` spelling.
pub fn upgrade_rule_id(kind: CheckKind, from: FileVersion, to: FileVersion, id: &str) -> String {
    match (kind, id) {
        (CheckKind::Lint, "DEFAULT") if from < FileVersion::V2 && to == FileVersion::V2 => {
            "STANDARD".to_string()
        }
        _ => id.to_string(),
    }
}

fn rule_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9_]+$").expect("rule id regex is valid"))
}

pub(crate) fn is_valid_rule_id(id: &str) -> bool {
    rule_id_regex().is_match(id)
}

fn validate_rule_ids(kind: CheckKind, field: &str, ids: &[String]) -> ConfigResult<()> {
    for id in ids {
        if !is_valid_rule_id(id) {
            return Err(ConfigError::invalid_field(
                &format!("{}.{}", kind.as_str(), field),
                format!(
                    "{}.{}: {:?} is not a valid rule ID or category",
                    kind.as_str(),
                    field,
                    id
                ),
            ));
        }
    }
    Ok(())
}

fn sorted_unique(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// Rule selection and ignores for an enabled check category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledCheckConfig {
    file_version: FileVersion,
    use_ids: Vec<String>,
    except_ids: Vec<String>,
    ignore_paths: Vec<String>,
    ignore_id_or_category_to_paths: BTreeMap<String, Vec<String>>,
    disable_builtin: bool,
}

impl EnabledCheckConfig {
    /// Build an enabled configuration. Lists are sorted and deduplicated; paths
    /// must be normalized relative paths (relative to the module directory).
    pub fn new(
        kind: CheckKind,
        file_version: FileVersion,
        use_ids: Vec<String>,
        except_ids: Vec<String>,
        ignore_paths: Vec<String>,
        ignore_id_or_category_to_paths: BTreeMap<String, Vec<String>>,
        disable_builtin: bool,
    ) -> ConfigResult<Self> {
        validate_rule_ids(kind, "use", &use_ids)?;
        validate_rule_ids(kind, "except", &except_ids)?;
        for path in &ignore_paths {
            normalpath::normalize_and_validate(path)?;
        }
        let mut ignore_only = BTreeMap::new();
        for (id, paths) in ignore_id_or_category_to_paths {
            validate_rule_ids(kind, "ignore_only", std::slice::from_ref(&id))?;
            for path in &paths {
                normalpath::normalize_and_validate(path)?;
            }
            if !paths.is_empty() {
                ignore_only.insert(id, sorted_unique(paths));
            }
        }
        Ok(Self {
            file_version,
            use_ids: sorted_unique(use_ids),
            except_ids: sorted_unique(except_ids),
            ignore_paths: sorted_unique(ignore_paths),
            ignore_id_or_category_to_paths: ignore_only,
            disable_builtin,
        })
    }

    pub fn file_version(&self) -> FileVersion {
        self.file_version
    }

    pub fn use_ids(&self) -> &[String] {
        &self.use_ids
    }

    pub fn except_ids(&self) -> &[String] {
        &self.except_ids
    }

    pub fn ignore_paths(&self) -> &[String] {
        &self.ignore_paths
    }

    pub fn ignore_id_or_category_to_paths(&self) -> &BTreeMap<String, Vec<String>> {
        &self.ignore_id_or_category_to_paths
    }

    pub fn disable_builtin(&self) -> bool {
        self.disable_builtin
    }
}

/// Shared base of lint and breaking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckConfig {
    /// The whole category is turned off for the module.
    Disabled { file_version: FileVersion },
    Enabled(EnabledCheckConfig),
}

impl CheckConfig {
    /// The category's default configuration for a file version.
    pub fn default_for(kind: CheckKind, file_version: FileVersion) -> Self {
        CheckConfig::Enabled(EnabledCheckConfig {
            file_version,
            use_ids: kind
                .default_use_ids(file_version)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            except_ids: Vec::new(),
            ignore_paths: Vec::new(),
            ignore_id_or_category_to_paths: BTreeMap::new(),
            disable_builtin: false,
        })
    }

    pub fn file_version(&self) -> FileVersion {
        match self {
            CheckConfig::Disabled { file_version } => *file_version,
            CheckConfig::Enabled(enabled) => enabled.file_version,
        }
    }

    pub fn disabled(&self) -> bool {
        matches!(self, CheckConfig::Disabled { .. })
    }

    pub fn enabled(&self) -> Option<&EnabledCheckConfig> {
        match self {
            CheckConfig::Disabled { .. } => None,
            CheckConfig::Enabled(enabled) => Some(enabled),
        }
    }
}

/// Where raw check paths are anchored and what to do with outsiders.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathScope<'a> {
    /// The module directory, expressed in the same base as the raw paths.
    pub module_dir: &'a str,
    /// Reject (true) or silently drop (false) paths outside `module_dir`.
    pub require_paths_contained: bool,
}

/// Raw check fields common to every external shape.
pub(crate) struct RawCheck<'a> {
    pub use_ids: &'a [String],
    pub except_ids: &'a [String],
    pub ignore: &'a [String],
    pub ignore_only: &'a BTreeMap<String, Vec<String>>,
    pub disable_builtin: bool,
}

fn resolve_check_path(
    kind: CheckKind,
    field: &str,
    raw: &str,
    scope: PathScope<'_>,
) -> ConfigResult<Option<String>> {
    let normalized = normalpath::normalize_and_validate(raw).map_err(|err| {
        ConfigError::invalid_field(
            &format!("{}.{}", kind.as_str(), field),
            format!("invalid {}.{} path: {}", kind.as_str(), field, err),
        )
    })?;
    match normalpath::rel(scope.module_dir, &normalized) {
        Some(relative) => Ok(Some(relative)),
        None if scope.require_paths_contained => Err(ConfigError::invalid_field(
            &format!("{}.{}", kind.as_str(), field),
            format!(
                "{}.{} path {:?} is not contained within module directory {:?}",
                kind.as_str(),
                field,
                raw,
                scope.module_dir
            ),
        )),
        None => {
            debug!(
                path = raw,
                module = scope.module_dir,
                "dropping {}.{} path outside of module",
                kind.as_str(),
                field
            );
            Ok(None)
        }
    }
}

pub(crate) fn check_config_from_raw(
    kind: CheckKind,
    file_version: FileVersion,
    raw: RawCheck<'_>,
    scope: PathScope<'_>,
) -> ConfigResult<CheckConfig> {
    // Ignoring the module directory itself turns the category off entirely.
    if raw
        .ignore
        .iter()
        .any(|path| normalpath::normalize(path) == scope.module_dir)
    {
        return Ok(CheckConfig::Disabled { file_version });
    }
    let use_ids = if raw.use_ids.is_empty() {
        kind.default_use_ids(file_version)
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        raw.use_ids.to_vec()
    };
    let mut ignore_paths = Vec::new();
    for path in raw.ignore {
        if let Some(relative) = resolve_check_path(kind, "ignore", path, scope)? {
            ignore_paths.push(relative);
        }
    }
    let mut ignore_only = BTreeMap::new();
    for (id, paths) in raw.ignore_only {
        let mut resolved = Vec::new();
        for path in paths {
            if let Some(relative) = resolve_check_path(kind, "ignore_only", path, scope)? {
                resolved.push(relative);
            }
        }
        if !resolved.is_empty() {
            ignore_only.insert(id.clone(), resolved);
        }
    }
    Ok(CheckConfig::Enabled(EnabledCheckConfig::new(
        kind,
        file_version,
        use_ids,
        raw.except_ids.to_vec(),
        ignore_paths,
        ignore_only,
        raw.disable_builtin,
    )?))
}

/// Scalar lint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOptions {
    pub enum_zero_value_suffix: String,
    pub rpc_allow_same_request_response: bool,
    pub rpc_allow_google_protobuf_empty_requests: bool,
    pub rpc_allow_google_protobuf_empty_responses: bool,
    pub service_suffix: String,
    pub allow_comment_ignores: bool,
}

impl LintOptions {
    pub fn default_for(file_version: FileVersion) -> Self {
        Self {
            enum_zero_value_suffix: DEFAULT_ENUM_ZERO_VALUE_SUFFIX.to_string(),
            rpc_allow_same_request_response: false,
            rpc_allow_google_protobuf_empty_requests: false,
            rpc_allow_google_protobuf_empty_responses: false,
            service_suffix: DEFAULT_SERVICE_SUFFIX.to_string(),
            // Comment ignores became opt-out in v2.
            allow_comment_ignores: file_version == FileVersion::V2,
        }
    }
}

/// Lint configuration for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintConfig {
    check: CheckConfig,
    options: LintOptions,
}

impl LintConfig {
    pub fn new(check: CheckConfig, options: LintOptions) -> Self {
        // Settings of a disabled category are meaningless; keep them canonical.
        let options = if check.disabled() {
            LintOptions::default_for(check.file_version())
        } else {
            options
        };
        Self { check, options }
    }

    pub fn default_for(file_version: FileVersion) -> Self {
        Self::new(
            CheckConfig::default_for(CheckKind::Lint, file_version),
            LintOptions::default_for(file_version),
        )
    }

    pub fn check(&self) -> &CheckConfig {
        &self.check
    }

    pub fn disabled(&self) -> bool {
        self.check.disabled()
    }

    pub fn options(&self) -> &LintOptions {
        &self.options
    }

    pub fn enum_zero_value_suffix(&self) -> &str {
        &self.options.enum_zero_value_suffix
    }

    pub fn rpc_allow_same_request_response(&self) -> bool {
        self.options.rpc_allow_same_request_response
    }

    pub fn rpc_allow_google_protobuf_empty_requests(&self) -> bool {
        self.options.rpc_allow_google_protobuf_empty_requests
    }

    pub fn rpc_allow_google_protobuf_empty_responses(&self) -> bool {
        self.options.rpc_allow_google_protobuf_empty_responses
    }

    pub fn service_suffix(&self) -> &str {
        &self.options.service_suffix
    }

    pub fn allow_comment_ignores(&self) -> bool {
        self.options.allow_comment_ignores
    }

    /// The v2 block for the part of this module under `root`.
    ///
    /// Paths stay anchored at `module_dir`; paths outside `root` are dropped.
    pub(crate) fn to_external_v2(&self, module_dir: &str, root: &str) -> ExternalLintConfigV2 {
        let Some(enabled) = self.check.enabled() else {
            return ExternalLintConfigV2 {
                ignore: vec![normalpath::join(module_dir, root)],
                ..Default::default()
            };
        };
        let base = ExternalCheckV2::from_enabled(CheckKind::Lint, enabled, module_dir, root);
        let options = &self.options;
        ExternalLintConfigV2 {
            use_ids: base.use_ids,
            except: base.except,
            ignore: base.ignore,
            ignore_only: base.ignore_only,
            enum_zero_value_suffix: non_default(
                &options.enum_zero_value_suffix,
                DEFAULT_ENUM_ZERO_VALUE_SUFFIX,
            ),
            rpc_allow_same_request_response: options.rpc_allow_same_request_response,
            rpc_allow_google_protobuf_empty_requests: options
                .rpc_allow_google_protobuf_empty_requests,
            rpc_allow_google_protobuf_empty_responses: options
                .rpc_allow_google_protobuf_empty_responses,
            service_suffix: non_default(&options.service_suffix, DEFAULT_SERVICE_SUFFIX),
            disallow_comment_ignores: !options.allow_comment_ignores,
            disable_builtin: enabled.disable_builtin,
        }
    }
}

/// Breaking change configuration for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakingConfig {
    check: CheckConfig,
    ignore_unstable_packages: bool,
}

impl BreakingConfig {
    pub fn new(check: CheckConfig, ignore_unstable_packages: bool) -> Self {
        let ignore_unstable_packages = !check.disabled() && ignore_unstable_packages;
        Self {
            check,
            ignore_unstable_packages,
        }
    }

    pub fn default_for(file_version: FileVersion) -> Self {
        Self::new(
            CheckConfig::default_for(CheckKind::Breaking, file_version),
            false,
        )
    }

    pub fn check(&self) -> &CheckConfig {
        &self.check
    }

    pub fn disabled(&self) -> bool {
        self.check.disabled()
    }

    pub fn ignore_unstable_packages(&self) -> bool {
        self.ignore_unstable_packages
    }

    pub(crate) fn to_external_v2(
        &self,
        module_dir: &str,
        root: &str,
    ) -> ExternalBreakingConfigV2 {
        let Some(enabled) = self.check.enabled() else {
            return ExternalBreakingConfigV2 {
                ignore: vec![normalpath::join(module_dir, root)],
                ..Default::default()
            };
        };
        let base =
            ExternalCheckV2::from_enabled(CheckKind::Breaking, enabled, module_dir, root);
        ExternalBreakingConfigV2 {
            use_ids: base.use_ids,
            except: base.except,
            ignore: base.ignore,
            ignore_only: base.ignore_only,
            ignore_unstable_packages: self.ignore_unstable_packages,
            disable_builtin: enabled.disable_builtin,
        }
    }
}

fn non_default(value: &str, default: &str) -> String {
    if value == default {
        String::new()
    } else {
        value.to_string()
    }
}

/// The part of a v2 external check block shared by lint and breaking.
struct ExternalCheckV2 {
    use_ids: Vec<String>,
    except: Vec<String>,
    ignore: Vec<String>,
    ignore_only: BTreeMap<String, Vec<String>>,
}

impl ExternalCheckV2 {
    fn from_enabled(
        kind: CheckKind,
        enabled: &EnabledCheckConfig,
        module_dir: &str,
        root: &str,
    ) -> Self {
        let from = enabled.file_version;
        let upgrade = |ids: &[String]| {
            sorted_unique(
                ids.iter()
                    .map(|id| upgrade_rule_id(kind, from, FileVersion::V2, id))
                    .collect(),
            )
        };
        let to_v2_paths = |paths: &[String]| -> Vec<String> {
            paths
                .iter()
                .filter(|path| {
                    let under_root = normalpath::equals_or_contains(root, path);
                    if !under_root {
                        debug!(path = %path, root, "dropping check path outside root");
                    }
                    under_root
                })
                .map(|path| normalpath::join(module_dir, path))
                .collect()
        };
        let mut ignore_only: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, paths) in &enabled.ignore_id_or_category_to_paths {
            let paths = to_v2_paths(paths);
            if paths.is_empty() {
                continue;
            }
            ignore_only
                .entry(upgrade_rule_id(kind, from, FileVersion::V2, id))
                .or_default()
                .extend(paths);
        }
        for paths in ignore_only.values_mut() {
            paths.sort();
            paths.dedup();
        }
        Self {
            use_ids: upgrade(&enabled.use_ids),
            except: upgrade(&enabled.except_ids),
            ignore: sorted_unique(to_v2_paths(&enabled.ignore_paths)),
            ignore_only,
        }
    }
}

// External shapes

/// `lint` block of v1beta1 and v1 module manifests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalLintConfigV1Beta1V1 {
    #[serde(default, rename = "use")]
    pub use_ids: Vec<String>,
    #[serde(default)]
    pub except: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub ignore_only: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub enum_zero_value_suffix: String,
    #[serde(default)]
    pub rpc_allow_same_request_response: bool,
    #[serde(default)]
    pub rpc_allow_google_protobuf_empty_requests: bool,
    #[serde(default)]
    pub rpc_allow_google_protobuf_empty_responses: bool,
    #[serde(default)]
    pub service_suffix: String,
    #[serde(default)]
    pub allow_comment_ignores: bool,
}

/// `breaking` block of v1beta1 and v1 module manifests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalBreakingConfigV1Beta1V1 {
    #[serde(default, rename = "use")]
    pub use_ids: Vec<String>,
    #[serde(default)]
    pub except: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub ignore_only: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ignore_unstable_packages: bool,
}

/// `lint` block of v2 module manifests.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalLintConfigV2 {
    #[serde(default, rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ignore_only: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enum_zero_value_suffix: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rpc_allow_same_request_response: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rpc_allow_google_protobuf_empty_requests: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rpc_allow_google_protobuf_empty_responses: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_suffix: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disallow_comment_ignores: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_builtin: bool,
}

/// `breaking` block of v2 module manifests.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalBreakingConfigV2 {
    #[serde(default, rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ignore_only: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_unstable_packages: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_builtin: bool,
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

pub(crate) fn lint_config_from_external_v1beta1_v1(
    file_version: FileVersion,
    external: &ExternalLintConfigV1Beta1V1,
    scope: PathScope<'_>,
) -> ConfigResult<LintConfig> {
    let check = check_config_from_raw(
        CheckKind::Lint,
        file_version,
        RawCheck {
            use_ids: &external.use_ids,
            except_ids: &external.except,
            ignore: &external.ignore,
            ignore_only: &external.ignore_only,
            disable_builtin: false,
        },
        scope,
    )?;
    Ok(LintConfig::new(
        check,
        LintOptions {
            enum_zero_value_suffix: or_default(
                &external.enum_zero_value_suffix,
                DEFAULT_ENUM_ZERO_VALUE_SUFFIX,
            ),
            rpc_allow_same_request_response: external.rpc_allow_same_request_response,
            rpc_allow_google_protobuf_empty_requests: external
                .rpc_allow_google_protobuf_empty_requests,
            rpc_allow_google_protobuf_empty_responses: external
                .rpc_allow_google_protobuf_empty_responses,
            service_suffix: or_default(&external.service_suffix, DEFAULT_SERVICE_SUFFIX),
            allow_comment_ignores: external.allow_comment_ignores,
        },
    ))
}

pub(crate) fn breaking_config_from_external_v1beta1_v1(
    file_version: FileVersion,
    external: &ExternalBreakingConfigV1Beta1V1,
    scope: PathScope<'_>,
) -> ConfigResult<BreakingConfig> {
    let check = check_config_from_raw(
        CheckKind::Breaking,
        file_version,
        RawCheck {
            use_ids: &external.use_ids,
            except_ids: &external.except,
            ignore: &external.ignore,
            ignore_only: &external.ignore_only,
            disable_builtin: false,
        },
        scope,
    )?;
    Ok(BreakingConfig::new(check, external.ignore_unstable_packages))
}

pub(crate) fn lint_config_from_external_v2(
    external: &ExternalLintConfigV2,
    scope: PathScope<'_>,
) -> ConfigResult<LintConfig> {
    let check = check_config_from_raw(
        CheckKind::Lint,
        FileVersion::V2,
        RawCheck {
            use_ids: &external.use_ids,
            except_ids: &external.except,
            ignore: &external.ignore,
            ignore_only: &external.ignore_only,
            disable_builtin: external.disable_builtin,
        },
        scope,
    )?;
    Ok(LintConfig::new(
        check,
        LintOptions {
            enum_zero_value_suffix: or_default(
                &external.enum_zero_value_suffix,
                DEFAULT_ENUM_ZERO_VALUE_SUFFIX,
            ),
            rpc_allow_same_request_response: external.rpc_allow_same_request_response,
            rpc_allow_google_protobuf_empty_requests: external
                .rpc_allow_google_protobuf_empty_requests,
            rpc_allow_google_protobuf_empty_responses: external
                .rpc_allow_google_protobuf_empty_responses,
            service_suffix: or_default(&external.service_suffix, DEFAULT_SERVICE_SUFFIX),
            allow_comment_ignores: !external.disallow_comment_ignores,
        },
    ))
}

pub(crate) fn breaking_config_from_external_v2(
    external: &ExternalBreakingConfigV2,
    scope: PathScope<'_>,
) -> ConfigResult<BreakingConfig> {
    let check = check_config_from_raw(
        CheckKind::Breaking,
        FileVersion::V2,
        RawCheck {
            use_ids: &external.use_ids,
            except_ids: &external.except,
            ignore: &external.ignore,
            ignore_only: &external.ignore_only,
            disable_builtin: external.disable_builtin,
        },
        scope,
    )?;
    Ok(BreakingConfig::new(check, external.ignore_unstable_packages))
}
