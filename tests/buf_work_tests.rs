//! Integration tests for workspace manifests (`buf.work.yaml` / `buf.work`).

use bufconfig::config::{
    BufWorkYamlFile, FileVersion, decode_buf_work_yaml, encode_buf_work_yaml, put_buf_work_yaml,
    read_buf_work_yaml,
};
use bufconfig::error::ErrorKind;
use bufconfig::storage::OsBucket;
use std::fs;
use tempfile::TempDir;

fn dirs(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_nested_directories_rejected() {
    let err = BufWorkYamlFile::new(&dirs(&["foo", "foo/bar"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.field(), Some("directories"));
    assert!(err.to_string().contains("contains directory"), "{err}");

    let err = decode_buf_work_yaml(
        "buf.work.yaml",
        b"version: v1\ndirectories:\n  - foo/bar\n  - foo\n",
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("buf.work.yaml: "), "{err}");
}

#[test]
fn test_root_directory_rejected() {
    let err = BufWorkYamlFile::new(&dirs(&["."])).unwrap_err();
    assert!(err.to_string().contains("workspace root"), "{err}");

    let err = BufWorkYamlFile::new(&dirs(&["proto/.."])).unwrap_err();
    assert_eq!(err.field(), Some("directories"));
}

#[test]
fn test_directories_required() {
    let err = decode_buf_work_yaml("buf.work.yaml", b"version: v1\n").unwrap_err();
    assert_eq!(err.field(), Some("directories"));
}

#[test]
fn test_version_rules() {
    let err = decode_buf_work_yaml("buf.work.yaml", b"directories: [proto]\n").unwrap_err();
    assert!(err.to_string().contains("has no version set"), "{err}");

    let err = decode_buf_work_yaml("buf.work.yaml", b"version: v1beta1\ndirectories: [proto]\n")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}

#[test]
fn test_encode_is_canonical() {
    let file = BufWorkYamlFile::new(&dirs(&["vendor", "./proto/", "proto"])).unwrap();
    assert_eq!(file.file_version(), FileVersion::V1);
    assert_eq!(file.dir_paths(), ["proto", "vendor"]);
    let data = encode_buf_work_yaml(&file).unwrap();
    assert_eq!(
        String::from_utf8(data.clone()).unwrap(),
        "version: v1\ndirectories:\n- proto\n- vendor\n"
    );
    assert_eq!(decode_buf_work_yaml("buf.work.yaml", &data).unwrap(), file);
}

#[test]
fn test_read_legacy_name_and_put() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("buf.work"),
        "version: v1\ndirectories: [proto]\n",
    )
    .unwrap();

    let bucket = OsBucket::new(temp.path());
    let file = read_buf_work_yaml(&bucket, ".").unwrap();
    assert_eq!(file.dir_paths(), ["proto"]);

    put_buf_work_yaml(&bucket, ".", &file).unwrap();
    let written = fs::read_to_string(temp.path().join("buf.work.yaml")).unwrap();
    assert_eq!(written, "version: v1\ndirectories:\n- proto\n");
}
