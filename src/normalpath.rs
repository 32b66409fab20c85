//! Slash-separated relative path handling.
//!
//! All configuration paths are stored in a canonical form:
//! - forward slashes only
//! - no `.` or empty components
//! - `..` resolved
//! - `"."` for the root itself
//!
//! This is pure string manipulation (no filesystem I/O).

use crate::error::{ConfigError, ConfigResult};

/// Normalize a path, resolving `.`, `..` and repeated separators.
///
/// Never fails. Leading `..` components that cannot be resolved are kept, so
/// callers that need a contained path must use [`normalize_and_validate`].
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Normalize a path and require that it is relative and does not escape
/// its context directory.
pub fn normalize_and_validate(path: &str) -> ConfigResult<String> {
    if path.is_empty() {
        return Err(ConfigError::invalid("path is empty"));
    }
    let normalized = normalize(path);
    if normalized.starts_with('/') {
        return Err(ConfigError::invalid(format!(
            "{}: expected to be relative",
            path
        )));
    }
    if normalized == ".." || normalized.starts_with("../") {
        return Err(ConfigError::invalid(format!(
            "{}: is outside the context directory",
            path
        )));
    }
    Ok(normalized)
}

/// Join two normalized relative paths.
pub fn join(base: &str, path: &str) -> String {
    match (base, path) {
        (".", _) => normalize(path),
        (_, ".") => normalize(base),
        _ => normalize(&format!("{}/{}", base, path)),
    }
}

/// Whether `path` is `parent` itself or lies under it.
///
/// Both arguments must be normalized.
pub fn equals_or_contains(parent: &str, path: &str) -> bool {
    if parent == "." {
        return true;
    }
    if path == parent {
        return true;
    }
    // Ensure we're not just matching a prefix of a directory name:
    // "foo" must not contain "foobar".
    path.len() > parent.len()
        && path.starts_with(parent)
        && path.as_bytes()[parent.len()] == b'/'
}

/// Whether `path` lies strictly under `parent`.
pub fn contains(parent: &str, path: &str) -> bool {
    parent != path && equals_or_contains(parent, path)
}

/// Express `path` relative to `parent`, if it is contained in it.
pub fn rel(parent: &str, path: &str) -> Option<String> {
    if !equals_or_contains(parent, path) {
        return None;
    }
    if parent == path {
        return Some(".".to_string());
    }
    if parent == "." {
        return Some(path.to_string());
    }
    Some(path[parent.len() + 1..].to_string())
}

/// The extension of the last component, including the dot, or `""`.
pub fn ext(path: &str) -> &str {
    let base = base(path);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(i) => &base[i..],
    }
}

/// The last component of the path.
pub fn base(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The parent directory of a normalized relative path, `"."` for top-level entries.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// `path` and all of its ancestors, nearest first, ending with `"."`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = normalize(path);
    loop {
        result.push(current.clone());
        if current == "." {
            return result;
        }
        current = dir(&current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("./a//b/"), "a/b");
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("."), ".");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(normalize("/a/../../b"), "/b");
    }

    #[test]
    fn test_normalize_and_validate() {
        assert_eq!(normalize_and_validate("proto/").unwrap(), "proto");
        assert!(normalize_and_validate("").is_err());
        assert!(normalize_and_validate("/abs").is_err());
        assert!(normalize_and_validate("../up").is_err());
        assert!(normalize_and_validate("a/../../up").is_err());
    }

    #[test]
    fn test_contains_respects_component_boundaries() {
        assert!(equals_or_contains("foo", "foo"));
        assert!(equals_or_contains("foo", "foo/bar"));
        assert!(!equals_or_contains("foo", "foobar"));
        assert!(equals_or_contains(".", "anything"));
        assert!(contains("foo", "foo/bar"));
        assert!(!contains("foo", "foo"));
    }

    #[test]
    fn test_rel() {
        assert_eq!(rel("proto", "proto/a/b.proto").as_deref(), Some("a/b.proto"));
        assert_eq!(rel("proto", "proto").as_deref(), Some("."));
        assert_eq!(rel(".", "a").as_deref(), Some("a"));
        assert_eq!(rel("proto", "other/a"), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("a", "."), "a");
        assert_eq!(join("a", "b/c"), "a/b/c");
    }

    #[test]
    fn test_ext_and_dir() {
        assert_eq!(ext("a/b.proto"), ".proto");
        assert_eq!(ext("a/.hidden"), "");
        assert_eq!(ext("a/b"), "");
        assert_eq!(dir("a/b/c"), "a/b");
        assert_eq!(dir("a"), ".");
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b"), vec!["a/b", "a", "."]);
        assert_eq!(ancestors("."), vec!["."]);
    }
}
