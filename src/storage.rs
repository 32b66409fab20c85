//! Bucket abstraction for reading and writing configuration files.
//!
//! Production code uses `OsBucket`, rooted at a directory on disk. Tests use
//! `MemoryBucket`, a fully in-memory map of paths to bytes.
//!
//! All bucket paths are normalized, slash-separated and relative to the bucket
//! root.

use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read access to a tree of files.
pub trait ReadBucket: Send + Sync + std::fmt::Debug {
    /// Read the full contents of the file at `path`.
    ///
    /// Returns a `NotFound` error if no file exists at `path`.
    fn get(&self, path: &str) -> ConfigResult<Vec<u8>>;

    /// Check whether a file exists at `path`.
    fn exists(&self, path: &str) -> ConfigResult<bool> {
        match self.get(path) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Write access to a tree of files.
pub trait WriteBucket: ReadBucket {
    /// Replace the file at `path` with `data`.
    ///
    /// Readers observe either the previous contents or `data`, never a mix.
    fn put_atomic(&self, path: &str, data: &[u8]) -> ConfigResult<()>;
}

/// In-memory bucket.
#[derive(Debug, Default)]
pub struct MemoryBucket {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bucket pre-populated with the given files.
    pub fn with_files<P, D>(files: impl IntoIterator<Item = (P, D)>) -> Self
    where
        P: AsRef<str>,
        D: AsRef<[u8]>,
    {
        let map = files
            .into_iter()
            .map(|(path, data)| {
                (
                    normalpath::normalize(path.as_ref()),
                    data.as_ref().to_vec(),
                )
            })
            .collect();
        Self {
            files: RwLock::new(map),
        }
    }

    /// All paths currently stored, sorted.
    pub fn paths(&self) -> Vec<String> {
        match self.files.read() {
            Ok(files) => files.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }
}

impl ReadBucket for MemoryBucket {
    fn get(&self, path: &str) -> ConfigResult<Vec<u8>> {
        let path = normalpath::normalize(path);
        let files = self
            .files
            .read()
            .map_err(|_| ConfigError::system("memory bucket lock poisoned"))?;
        files
            .get(&path)
            .cloned()
            .ok_or_else(|| ConfigError::not_found(path))
    }
}

impl WriteBucket for MemoryBucket {
    fn put_atomic(&self, path: &str, data: &[u8]) -> ConfigResult<()> {
        let path = normalpath::normalize_and_validate(path)?;
        let mut files = self
            .files
            .write()
            .map_err(|_| ConfigError::system("memory bucket lock poisoned"))?;
        files.insert(path, data.to_vec());
        Ok(())
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bucket backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct OsBucket {
    root: PathBuf,
}

impl OsBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> ConfigResult<PathBuf> {
        let path = normalpath::normalize_and_validate(path)?;
        if path == "." {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(path))
    }
}

impl ReadBucket for OsBucket {
    fn get(&self, path: &str) -> ConfigResult<Vec<u8>> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(ConfigError::not_found(path));
        }
        std::fs::read(&full).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ConfigError::not_found(path)
            } else {
                ConfigError::io(full.display().to_string(), err)
            }
        })
    }
}

impl WriteBucket for OsBucket {
    fn put_atomic(&self, path: &str, data: &[u8]) -> ConfigResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| ConfigError::io(parent.display().to_string(), err))?;
        }
        let tmp = temp_path_next_to(&full);
        std::fs::write(&tmp, data)
            .map_err(|err| ConfigError::io(tmp.display().to_string(), err))?;
        if let Err(err) = std::fs::rename(&tmp, &full) {
            let _ = std::fs::remove_file(&tmp);
            return Err(ConfigError::io(full.display().to_string(), err));
        }
        Ok(())
    }
}

fn temp_path_next_to(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let pid = std::process::id();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{pid}.{n}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_bucket_get_and_put() {
        let bucket = MemoryBucket::with_files([("a/buf.yaml", "version: v2\n")]);
        assert_eq!(bucket.get("a/buf.yaml").unwrap(), b"version: v2\n");
        assert_eq!(bucket.get("./a//buf.yaml").unwrap(), b"version: v2\n");

        bucket.put_atomic("b/buf.lock", b"version: v2\n").unwrap();
        assert!(bucket.exists("b/buf.lock").unwrap());
        assert_eq!(bucket.paths(), vec!["a/buf.yaml", "b/buf.lock"]);
    }

    #[test]
    fn test_memory_bucket_not_found() {
        let bucket = MemoryBucket::new();
        let err = bucket.get("buf.yaml").unwrap_err();
        assert!(err.is_not_found());
        assert!(!bucket.exists("buf.yaml").unwrap());
    }

    #[test]
    fn test_memory_bucket_rejects_escaping_writes() {
        let bucket = MemoryBucket::new();
        assert!(bucket.put_atomic("../buf.yaml", b"").is_err());
    }

    #[test]
    fn test_os_bucket_roundtrip() {
        let temp = TempDir::new().unwrap();
        let bucket = OsBucket::new(temp.path());

        bucket.put_atomic("proto/buf.yaml", b"version: v1\n").unwrap();
        assert_eq!(bucket.get("proto/buf.yaml").unwrap(), b"version: v1\n");

        bucket.put_atomic("proto/buf.yaml", b"version: v2\n").unwrap();
        assert_eq!(bucket.get("proto/buf.yaml").unwrap(), b"version: v2\n");

        // No temp files left behind.
        let entries: Vec<_> = std::fs::read_dir(temp.path().join("proto"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["buf.yaml"]);
    }

    #[test]
    fn test_os_bucket_missing_file_and_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("dir")).unwrap();
        let bucket = OsBucket::new(temp.path());
        assert!(bucket.get("missing.yaml").unwrap_err().is_not_found());
        assert!(bucket.get("dir").unwrap_err().is_not_found());
    }
}
