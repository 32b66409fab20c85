//! Module identities: `remote/owner/name` and `remote/owner/name:ref`.

use crate::error::{ConfigError, ConfigResult};
use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;

fn remote_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)*(:[0-9]+)?$")
            .expect("remote regex is valid")
    })
}

fn component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("component regex is valid"))
}

/// Fully-qualified module name, e.g. `buf.build/acme/weather`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleFullName {
    remote: String,
    owner: String,
    name: String,
}

impl ModuleFullName {
    pub fn new(remote: &str, owner: &str, name: &str) -> ConfigResult<Self> {
        if !remote_regex().is_match(remote) {
            return Err(ConfigError::invalid(format!(
                "invalid module remote {:?}",
                remote
            )));
        }
        for (label, value) in [("owner", owner), ("name", name)] {
            if !component_regex().is_match(value) {
                return Err(ConfigError::invalid(format!(
                    "invalid module {} {:?}",
                    label, value
                )));
            }
        }
        Ok(Self {
            remote: remote.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [remote, owner, name] => Self::new(remote, owner, name).map_err(|err| {
                ConfigError::invalid(format!("invalid module name {:?}: {}", value, err))
            }),
            _ => Err(ConfigError::invalid(format!(
                "invalid module name {:?}: must be in the form remote/owner/name",
                value
            ))),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ModuleFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.remote, self.owner, self.name)
    }
}

/// A module name with an optional reference (label, commit, or version).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleRef {
    full_name: ModuleFullName,
    reference: Option<String>,
}

impl ModuleRef {
    pub fn parse(value: &str) -> ConfigResult<Self> {
        // The remote may carry a port, so only a colon after the last slash
        // introduces a reference.
        let last_slash = value.rfind('/').unwrap_or(0);
        let (name_part, reference) = match value[last_slash..].find(':') {
            Some(offset) => {
                let split = last_slash + offset;
                let reference = &value[split + 1..];
                if reference.is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "invalid reference {:?}: reference after ':' is empty",
                        value
                    )));
                }
                (&value[..split], Some(reference.to_string()))
            }
            None => (value, None),
        };
        let full_name = ModuleFullName::parse(name_part)?;
        Ok(Self {
            full_name,
            reference,
        })
    }

    pub fn full_name(&self) -> &ModuleFullName {
        &self.full_name
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}:{}", self.full_name, reference),
            None => write!(f, "{}", self.full_name),
        }
    }
}
