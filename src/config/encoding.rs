//! YAML/JSON decoding and YAML encoding shared by every file kind.

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A field that accepts either a bare string or a list of strings.
///
/// Resolved once at the decode boundary with [`StringOrList::into_vec`]; the
/// internal model only ever sees `Vec<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Scalar(String),
    List(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::Scalar(value) => vec![value],
            StringOrList::List(values) => values,
        }
    }

    /// Emit a bare scalar for one element and a list for more.
    pub fn from_slice(values: &[String]) -> Option<Self> {
        match values {
            [] => None,
            [single] => Some(StringOrList::Scalar(single.clone())),
            many => Some(StringOrList::List(many.to_vec())),
        }
    }
}

/// Only the `version` key; everything else is ignored.
#[derive(Debug, Deserialize)]
struct ExternalFileVersion {
    #[serde(default)]
    version: Option<serde_yaml::Value>,
}

fn looks_like_json(data: &[u8]) -> bool {
    data.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

/// Strictly decode `data` as YAML, or as JSON when allowed and the data is a
/// JSON object.
pub(crate) fn decode<T: DeserializeOwned>(data: &[u8], allow_json: bool) -> ConfigResult<T> {
    if allow_json && looks_like_json(data) {
        return serde_json::from_slice(data).map_err(ConfigError::json);
    }
    let text = std::str::from_utf8(data)
        .map_err(|err| ConfigError::invalid(format!("file is not valid UTF-8: {}", err)))?;
    if text.trim().is_empty() {
        return serde_yaml::from_str("{}").map_err(ConfigError::yaml);
    }
    serde_yaml::from_str(text).map_err(ConfigError::yaml)
}

/// Read the `version` key without validating any other field.
///
/// Returns `None` when the key is absent or null.
pub(crate) fn sniff_version(data: &[u8], allow_json: bool) -> ConfigResult<Option<String>> {
    let external: ExternalFileVersion = decode(data, allow_json)?;
    match external.version {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(version)) => Ok(Some(version)),
        Some(other) => {
            let raw = serde_yaml::to_string(&other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            Err(ConfigError::UnknownVersion(raw))
        }
    }
}

/// Encode `value` as YAML, prefixed with `header` comment lines.
pub(crate) fn encode<T: Serialize>(header: &[&str], value: &T) -> ConfigResult<Vec<u8>> {
    let body = serde_yaml::to_string(value)
        .map_err(|err| ConfigError::system(format!("could not marshal as YAML: {}", err)))?;
    let mut out = String::new();
    for line in header {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&body);
    Ok(out.into_bytes())
}

/// Whether data begins with the given comment line.
pub(crate) fn starts_with_comment(data: &[u8], comment: &str) -> bool {
    std::str::from_utf8(data)
        .map(|text| text.trim_start().starts_with(comment))
        .unwrap_or(false)
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Strict {
        #[serde(default)]
        version: String,
        #[serde(default)]
        opt: Option<StringOrList>,
    }

    #[test]
    fn test_string_or_list() {
        let scalar: Strict = decode(b"opt: a=b\n", false).unwrap();
        assert_eq!(scalar.opt.unwrap().into_vec(), vec!["a=b"]);

        let list: Strict = decode(b"opt: [a, b]\n", false).unwrap();
        assert_eq!(list.opt.unwrap().into_vec(), vec!["a", "b"]);

        assert_eq!(StringOrList::from_slice(&[]), None);
        assert_eq!(
            StringOrList::from_slice(&["x".to_string()]),
            Some(StringOrList::Scalar("x".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_fields() {
        let err = decode::<Strict>(b"version: v1\nunknown: 1\n", false).unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_decode_json_only_when_allowed() {
        let parsed: Strict = decode(br#"{"version": "v2"}"#, true).unwrap();
        assert_eq!(parsed.version, "v2");
        // YAML is a superset of JSON flow syntax, so this still parses as YAML.
        let parsed: Strict = decode(br#"{"version": "v2"}"#, false).unwrap();
        assert_eq!(parsed.version, "v2");
        let err = decode::<Strict>(br#"{"version": "v2", "x": 1}"#, true).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_decode_empty_document() {
        let parsed: Strict = decode(b"  \n", false).unwrap();
        assert_eq!(parsed.version, "");
    }

    #[test]
    fn test_sniff_version_ignores_other_fields() {
        let data = b"version: v1\nplugins: 12\nbogus: [\n";
        // Broken YAML still fails, but unrelated schema errors do not.
        assert!(sniff_version(data, false).is_err());
        let data = b"version: v1\nplugins: 12\nbogus: true\n";
        assert_eq!(sniff_version(data, false).unwrap().as_deref(), Some("v1"));
        assert_eq!(sniff_version(b"deps: []\n", false).unwrap(), None);
        assert!(sniff_version(b"version: 2\n", false).is_err());
    }

    #[test]
    fn test_encode_with_header() {
        #[derive(Serialize)]
        struct Out {
            version: &'static str,
        }
        let bytes = encode(&["# header"], &Out { version: "v2" }).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "# header\nversion: v2\n");
    }
}
