//! Per-module build configuration and root/include/exclude resolution.

use super::check::{BreakingConfig, LintConfig};
use super::module_name::ModuleFullName;
use super::version::FileVersion;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use std::collections::{BTreeMap, BTreeSet};

/// One module's build configuration.
///
/// `root_to_includes` and `root_to_excludes` always carry the same keys (the
/// module's roots); their values are sorted, unique and relative to the root.
/// Since v2 a module has exactly one root, `"."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    dir_path: String,
    full_name: Option<ModuleFullName>,
    root_to_includes: BTreeMap<String, Vec<String>>,
    root_to_excludes: BTreeMap<String, Vec<String>>,
    lint: LintConfig,
    breaking: BreakingConfig,
}

impl ModuleConfig {
    /// Build a module configuration.
    ///
    /// Empty root maps mean the single root `"."`. Path lists must already be
    /// normalized, sorted and unique; violating that is a bug in the caller and
    /// is reported as a system error.
    pub fn new(
        dir_path: &str,
        full_name: Option<ModuleFullName>,
        root_to_includes: BTreeMap<String, Vec<String>>,
        root_to_excludes: BTreeMap<String, Vec<String>>,
        lint: LintConfig,
        breaking: BreakingConfig,
    ) -> ConfigResult<Self> {
        let dir_path = normalpath::normalize_and_validate(dir_path)?;
        let mut roots: BTreeSet<String> = root_to_excludes
            .keys()
            .chain(root_to_includes.keys())
            .cloned()
            .collect();
        if roots.is_empty() {
            roots.insert(".".to_string());
        }
        let canonical = |map: &BTreeMap<String, Vec<String>>| -> ConfigResult<_> {
            let mut out = BTreeMap::new();
            for root in &roots {
                let paths = map.get(root).cloned().unwrap_or_default();
                ensure_sorted_unique_normalized(root, &paths)?;
                out.insert(root.clone(), paths);
            }
            Ok(out)
        };
        let root_to_includes = canonical(&root_to_includes)?;
        let root_to_excludes = canonical(&root_to_excludes)?;
        for root in &roots {
            if normalpath::normalize(root) != *root {
                return Err(ConfigError::system(format!(
                    "root {:?} is not normalized",
                    root
                )));
            }
        }
        Ok(Self {
            dir_path,
            full_name,
            root_to_includes,
            root_to_excludes,
            lint,
            breaking,
        })
    }

    /// A module at `dir_path` with a single root and default checks.
    pub fn default_for(dir_path: &str, file_version: FileVersion) -> ConfigResult<Self> {
        Self::new(
            dir_path,
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            LintConfig::default_for(file_version),
            BreakingConfig::default_for(file_version),
        )
    }

    pub fn dir_path(&self) -> &str {
        &self.dir_path
    }

    pub fn full_name(&self) -> Option<&ModuleFullName> {
        self.full_name.as_ref()
    }

    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.root_to_excludes.keys().map(String::as_str)
    }

    pub fn root_to_includes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.root_to_includes
    }

    pub fn root_to_excludes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.root_to_excludes
    }

    pub fn lint(&self) -> &LintConfig {
        &self.lint
    }

    pub fn breaking(&self) -> &BreakingConfig {
        &self.breaking
    }
}

fn ensure_sorted_unique_normalized(root: &str, paths: &[String]) -> ConfigResult<()> {
    for window in paths.windows(2) {
        if window[0] >= window[1] {
            return Err(ConfigError::system(format!(
                "paths for root {:?} must be sorted and unique, got {:?}",
                root, paths
            )));
        }
    }
    for path in paths {
        if normalpath::normalize_and_validate(path).ok().as_deref() != Some(path.as_str()) {
            return Err(ConfigError::system(format!(
                "path {:?} for root {:?} is not normalized",
                path, root
            )));
        }
    }
    Ok(())
}

fn normalize_unique(field: &str, paths: &[String]) -> ConfigResult<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(paths.len());
    for raw in paths {
        let path = normalpath::normalize_and_validate(raw).map_err(|err| {
            ConfigError::invalid_field(field, format!("invalid {} path: {}", field, err))
        })?;
        if !seen.insert(path.clone()) {
            return Err(ConfigError::invalid_field(
                field,
                format!("{} path {:?} is specified more than once", field, path),
            ));
        }
        out.push(path);
    }
    Ok(out)
}

fn reject_proto_file(field: &str, path: &str) -> ConfigResult<()> {
    if normalpath::ext(path) == ".proto" {
        return Err(ConfigError::invalid_field(
            field,
            format!(
                "{} path {:?} is a .proto file, only directories are allowed",
                field, path
            ),
        ));
    }
    Ok(())
}

/// Resolve `build.roots` and `build.excludes` of a v1beta1 or v1 manifest.
///
/// Returns a map from each root to its excludes, relative to that root.
pub(crate) fn resolve_roots_and_excludes(
    roots: &[String],
    excludes: &[String],
) -> ConfigResult<BTreeMap<String, Vec<String>>> {
    let roots = if roots.is_empty() {
        vec![".".to_string()]
    } else {
        normalize_unique("build.roots", roots)?
    };
    for (i, a) in roots.iter().enumerate() {
        for b in &roots[i + 1..] {
            if normalpath::equals_or_contains(a, b) || normalpath::equals_or_contains(b, a) {
                return Err(ConfigError::invalid_field(
                    "build.roots",
                    format!("roots {:?} and {:?} overlap", a, b),
                ));
            }
        }
    }
    let mut root_to_excludes: BTreeMap<String, Vec<String>> =
        roots.iter().map(|root| (root.clone(), Vec::new())).collect();
    for exclude in normalize_unique("build.excludes", excludes)? {
        reject_proto_file("build.excludes", &exclude)?;
        if roots.contains(&exclude) {
            return Err(ConfigError::invalid_field(
                "build.excludes",
                format!(
                    "{:?} is both a root and an exclude, which would exclude the entire root",
                    exclude
                ),
            ));
        }
        let containing: Vec<&String> = roots
            .iter()
            .filter(|root| normalpath::contains(root, &exclude))
            .collect();
        let root = match containing.as_slice() {
            [] => {
                return Err(ConfigError::invalid_field(
                    "build.excludes",
                    format!("exclude {:?} is not contained in any root", exclude),
                ));
            }
            [root] => (*root).clone(),
            many => {
                return Err(ConfigError::system(format!(
                    "exclude {:?} is contained in multiple roots {:?}",
                    exclude, many
                )));
            }
        };
        if let Some(relative) = normalpath::rel(&root, &exclude) {
            root_to_excludes.entry(root).or_default().push(relative);
        }
    }
    for excludes in root_to_excludes.values_mut() {
        excludes.sort();
    }
    Ok(root_to_excludes)
}

/// Resolve the `includes` and `excludes` of a v2 module.
///
/// Raw paths are relative to the manifest directory and must lie strictly
/// inside `module_dir`. Returns `(includes, excludes)` relative to `module_dir`.
pub(crate) fn resolve_includes_and_excludes(
    module_dir: &str,
    includes: &[String],
    excludes: &[String],
) -> ConfigResult<(Vec<String>, Vec<String>)> {
    let includes = normalize_unique("includes", includes)?;
    let excludes = normalize_unique("excludes", excludes)?;
    for (field, paths) in [("includes", &includes), ("excludes", &excludes)] {
        for path in paths {
            reject_proto_file(field, path)?;
            if !normalpath::contains(module_dir, path) {
                return Err(ConfigError::invalid_field(
                    field,
                    format!(
                        "{} path {:?} is not contained within module directory {:?}",
                        field, path, module_dir
                    ),
                ));
            }
        }
    }
    check_nested("includes", "include", &includes)?;
    check_nested("excludes", "exclude", &excludes)?;
    for exclude in &excludes {
        for include in &includes {
            if exclude == include {
                return Err(ConfigError::invalid_field(
                    "excludes",
                    format!("{:?} is both an include path and an exclude path", exclude),
                ));
            }
            if normalpath::contains(exclude, include) {
                return Err(ConfigError::invalid_field(
                    "excludes",
                    format!(
                        "exclude path {:?} contains include path {:?}, so the include is redundant",
                        exclude, include
                    ),
                ));
            }
        }
        if !includes.is_empty()
            && !includes
                .iter()
                .any(|include| normalpath::contains(include, exclude))
        {
            return Err(ConfigError::invalid_field(
                "excludes",
                format!(
                    "exclude path {:?} is not contained in any include path, so it is redundant",
                    exclude
                ),
            ));
        }
    }
    let to_relative = |paths: Vec<String>| -> Vec<String> {
        let mut out: Vec<String> = paths
            .iter()
            .filter_map(|path| normalpath::rel(module_dir, path))
            .collect();
        out.sort();
        out
    };
    Ok((to_relative(includes), to_relative(excludes)))
}

fn check_nested(field: &str, label: &str, paths: &[String]) -> ConfigResult<()> {
    for outer in paths {
        for inner in paths {
            if normalpath::contains(outer, inner) {
                return Err(ConfigError::invalid_field(
                    field,
                    format!(
                        "{} path {:?} is contained in {} path {:?}",
                        label, inner, label, outer
                    ),
                ));
            }
        }
    }
    Ok(())
}
