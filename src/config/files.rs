//! Locating configuration files in a bucket directory.
//!
//! Each file kind has one or more accepted names; the first name present in
//! the directory wins.

use super::version::FileKind;
use crate::error::{ConfigError, ConfigResult};
use crate::normalpath;
use crate::storage::ReadBucket;

/// A configuration file found in a bucket.
#[derive(Debug, Clone)]
pub struct FoundFile {
    /// The base name the file was found under, e.g. `buf.mod`.
    pub file_name: &'static str,
    /// Bucket path of the file.
    pub path: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

/// Find the file of `kind` in `dir`, searching its names in order.
///
/// Returns `None` if no name is present.
pub fn find_file(
    bucket: &dyn ReadBucket,
    dir: &str,
    kind: FileKind,
) -> ConfigResult<Option<FoundFile>> {
    for file_name in kind.file_names() {
        let path = normalpath::join(dir, file_name);
        match bucket.get(&path) {
            Ok(data) => {
                return Ok(Some(FoundFile {
                    file_name,
                    path,
                    data,
                }));
            }
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Like [`find_file`], but a missing file is a `NotFound` error.
pub fn read_file(bucket: &dyn ReadBucket, dir: &str, kind: FileKind) -> ConfigResult<FoundFile> {
    find_file(bucket, dir, kind)?
        .ok_or_else(|| ConfigError::not_found(normalpath::join(dir, kind.default_file_name())))
}

/// Whether any file of `kind` exists in `dir`.
pub fn file_exists(bucket: &dyn ReadBucket, dir: &str, kind: FileKind) -> ConfigResult<bool> {
    for file_name in kind.file_names() {
        if bucket.exists(&normalpath::join(dir, file_name))? {
            return Ok(true);
        }
    }
    Ok(false)
}
