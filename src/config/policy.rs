//! Policies declared in the `policies` section of a v2 `buf.yaml`.

use super::check::is_valid_rule_id;
use super::module_name::ModuleRef;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A policy applied to every module of the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    name: String,
    ignore_paths: Vec<String>,
    ignore_id_or_category_to_paths: BTreeMap<String, Vec<String>>,
    reference: Option<ModuleRef>,
}

impl PolicyConfig {
    pub fn new(
        name: &str,
        ignore_paths: Vec<String>,
        ignore_id_or_category_to_paths: BTreeMap<String, Vec<String>>,
    ) -> ConfigResult<Self> {
        if name.is_empty() {
            return Err(ConfigError::missing_field("policy"));
        }
        let ignore_paths = normalize_sorted("ignore", &ignore_paths)?;
        let mut ignore_only = BTreeMap::new();
        for (id, paths) in ignore_id_or_category_to_paths {
            if !is_valid_rule_id(&id) {
                return Err(ConfigError::invalid_field(
                    "ignore_only",
                    format!("{:?} is not a valid rule ID or category", id),
                ));
            }
            ignore_only.insert(id, normalize_sorted("ignore_only", &paths)?);
        }
        Ok(Self {
            name: name.to_string(),
            ignore_paths,
            ignore_id_or_category_to_paths: ignore_only,
            reference: ModuleRef::parse(name).ok(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ignore_paths(&self) -> &[String] {
        &self.ignore_paths
    }

    pub fn ignore_id_or_category_to_paths(&self) -> &BTreeMap<String, Vec<String>> {
        &self.ignore_id_or_category_to_paths
    }

    /// Set when the policy name is a remote reference rather than a local file.
    pub fn reference(&self) -> Option<&ModuleRef> {
        self.reference.as_ref()
    }

    pub(crate) fn from_external_v2(external: ExternalPolicyConfigV2) -> ConfigResult<Self> {
        Self::new(&external.policy, external.ignore, external.ignore_only)
    }

    pub(crate) fn to_external_v2(&self) -> ExternalPolicyConfigV2 {
        ExternalPolicyConfigV2 {
            policy: self.name.clone(),
            ignore: self.ignore_paths.clone(),
            ignore_only: self.ignore_id_or_category_to_paths.clone(),
        }
    }
}

fn normalize_sorted(field: &str, paths: &[String]) -> ConfigResult<Vec<String>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        out.push(normalpath::normalize_and_validate(path).map_err(|err| {
            ConfigError::invalid_field(field, format!("invalid {} path: {}", field, err))
        })?);
    }
    out.sort();
    out.dedup();
    Ok(out)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExternalPolicyConfigV2 {
    #[serde(default)]
    pub policy: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ignore_only: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_and_local_policies() {
        let remote = PolicyConfig::new("buf.build/acme/policy", Vec::new(), BTreeMap::new())
            .unwrap();
        assert_eq!(
            remote.reference().map(|r| r.to_string()).as_deref(),
            Some("buf.build/acme/policy")
        );
        let local =
            PolicyConfig::new("policies/strict.yaml", Vec::new(), BTreeMap::new()).unwrap();
        assert!(local.reference().is_none());
    }

    #[test]
    fn test_paths_sorted_unique() {
        let policy = PolicyConfig::new(
            "policy.yaml",
            vec!["b".to_string(), "a/".to_string(), "b".to_string()],
            BTreeMap::from([("FIELD_LOWER_SNAKE_CASE".to_string(), vec!["z".to_string()])]),
        )
        .unwrap();
        assert_eq!(policy.ignore_paths(), ["a", "b"]);
    }

    #[test]
    fn test_invalid_policy() {
        assert!(PolicyConfig::new("", Vec::new(), BTreeMap::new()).is_err());
        assert!(
            PolicyConfig::new("p.yaml", vec!["../x".to_string()], BTreeMap::new()).is_err()
        );
        assert!(
            PolicyConfig::new(
                "p.yaml",
                Vec::new(),
                BTreeMap::from([("lower".to_string(), Vec::new())])
            )
            .is_err()
        );
    }
}
