//! Integration tests for module manifests (`buf.yaml` / `buf.mod`).
//!
//! These go through the public API only: decode, encode, and the bucket
//! read/write helpers on top of a temporary directory.

use bufconfig::config::{
    BufYamlFile, CheckKind, FileVersion, LocalFileProbe, decode_buf_yaml_with_probe,
    encode_buf_yaml, put_buf_yaml, read_buf_yaml, upgrade_rule_id,
};
use bufconfig::error::ErrorKind;
use bufconfig::normalpath;
use bufconfig::storage::OsBucket;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

/// A probe for which no local file exists.
#[derive(Debug, Default)]
struct NoLocalFiles;

impl LocalFileProbe for NoLocalFiles {
    fn exists(&self, _path: &str) -> bool {
        false
    }
}

fn decode(data: &str) -> BufYamlFile {
    decode_buf_yaml_with_probe("buf.yaml", data.as_bytes(), false, &NoLocalFiles)
        .unwrap_or_else(|err| panic!("decode failed: {err}\n{data}"))
}

fn try_decode(data: &str) -> bufconfig::error::ConfigResult<BufYamlFile> {
    decode_buf_yaml_with_probe("buf.yaml", data.as_bytes(), false, &NoLocalFiles)
}

fn encode(file: &BufYamlFile) -> String {
    String::from_utf8(encode_buf_yaml(file).unwrap()).unwrap()
}

#[test]
fn test_encode_is_a_fixed_point() {
    let inputs = [
        "version: v1beta1\nname: buf.build/acme/weather\nbuild:\n  roots: [proto]\n  excludes: [proto/internal]\nlint:\n  use: [BASIC]\n",
        "version: v1beta1\nbuild:\n  roots: [proto, vendor]\nlint:\n  ignore: [proto/a.proto]\nbreaking:\n  ignore: [vendor]\n",
        "version: v1\nname: buf.build/acme/weather\ndeps: [buf.build/acme/units]\nbreaking:\n  use: [WIRE]\n",
        "version: v2\nmodules:\n  - path: proto\n    name: buf.build/acme/weather\n    excludes: [proto/vendor]\n  - path: extra\nlint:\n  use: [MINIMAL]\n  except: [PACKAGE_DIRECTORY_MATCH]\nbreaking:\n  use: [WIRE_JSON]\n  ignore_unstable_packages: true\n",
    ];
    for input in inputs {
        let first = encode(&decode(input));
        let second = encode(&decode(&first));
        assert_eq!(first, second, "not a fixed point for:\n{input}");
        assert!(first.starts_with("version: v2\n"));
    }
}

#[test]
fn test_upgrade_preserves_semantics() {
    let v1 = decode(
        "version: v1\n\
         name: buf.build/acme/weather\n\
         build:\n  excludes: [vendor]\n\
         lint:\n  use: [DEFAULT]\n  except: [FILE_LOWER_SNAKE_CASE]\n  ignore: [legacy]\n  ignore_only:\n    ENUM_ZERO_VALUE_SUFFIX: [api/enums.proto]\n  enum_zero_value_suffix: _NONE\n\
         breaking:\n  use: [PACKAGE]\n  ignore_unstable_packages: true\n",
    );
    let v2 = decode(&encode(&v1));
    assert_eq!(v2.file_version(), FileVersion::V2);

    let before = &v1.module_configs()[0];
    let after = &v2.module_configs()[0];
    assert_eq!(after.dir_path(), before.dir_path());
    assert_eq!(after.full_name(), before.full_name());
    assert_eq!(after.root_to_excludes(), before.root_to_excludes());

    let upgraded = |kind, ids: &[String]| -> Vec<String> {
        ids.iter()
            .map(|id| upgrade_rule_id(kind, FileVersion::V1, FileVersion::V2, id))
            .collect()
    };
    let lint_before = before.lint().check().enabled().unwrap();
    let lint_after = after.lint().check().enabled().unwrap();
    assert_eq!(lint_after.use_ids(), ["STANDARD"]);
    assert_eq!(
        lint_after.use_ids(),
        upgraded(CheckKind::Lint, lint_before.use_ids())
    );
    assert_eq!(
        lint_after.except_ids(),
        upgraded(CheckKind::Lint, lint_before.except_ids())
    );
    assert_eq!(lint_after.ignore_paths(), lint_before.ignore_paths());
    assert_eq!(
        lint_after.ignore_id_or_category_to_paths(),
        lint_before.ignore_id_or_category_to_paths()
    );
    assert_eq!(after.lint().enum_zero_value_suffix(), "_NONE");
    assert_eq!(
        after.lint().allow_comment_ignores(),
        before.lint().allow_comment_ignores()
    );

    let breaking_before = before.breaking().check().enabled().unwrap();
    let breaking_after = after.breaking().check().enabled().unwrap();
    assert_eq!(breaking_after.use_ids(), breaking_before.use_ids());
    assert!(after.breaking().ignore_unstable_packages());
}

#[test]
fn test_v1beta1_roots_become_modules() {
    let v1beta1 = decode(
        "version: v1beta1\nname: buf.build/acme/weather\nbuild:\n  roots: [proto, third_party]\n  excludes: [third_party/google]\nlint:\n  ignore: [proto/legacy]\n",
    );
    let v2 = decode(&encode(&v1beta1));
    let modules = v2.module_configs();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].dir_path(), "proto");
    assert_eq!(
        modules[0].full_name().map(ToString::to_string).as_deref(),
        Some("buf.build/acme/weather")
    );
    assert_eq!(
        modules[0].lint().check().enabled().unwrap().ignore_paths(),
        ["legacy"]
    );
    assert_eq!(modules[1].dir_path(), "third_party");
    assert_eq!(modules[1].root_to_excludes()["."], ["google"]);
}

/// The paths of `paths` under `root`, relative to it.
fn under_root(root: &str, paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| normalpath::rel(root, path))
        .collect()
}

#[test]
fn test_multi_root_upgrade_keeps_check_paths_per_root() {
    let v1beta1 = decode(
        "version: v1beta1\n\
         build:\n  roots: [proto, vendor]\n\
         lint:\n  ignore: [proto/a.proto, vendor/legacy]\n  ignore_only:\n    ENUM_ZERO_VALUE_SUFFIX: [proto/enums.proto]\n    FIELD_LOWER_SNAKE_CASE: [vendor/b.proto]\n\
         breaking:\n  ignore: [proto/v1alpha]\n  ignore_only:\n    FIELD_SAME_TYPE: [vendor/c.proto]\n",
    );
    let out = encode(&v1beta1);
    assert!(!out.contains("proto/proto"), "{out}");
    assert!(!out.contains("vendor/proto"), "{out}");
    assert!(!out.contains("proto/vendor"), "{out}");

    let v2 = decode(&out);
    let before = &v1beta1.module_configs()[0];
    let lint_before = before.lint().check().enabled().unwrap();
    let breaking_before = before.breaking().check().enabled().unwrap();
    let modules = v2.module_configs();
    assert_eq!(modules.len(), 2);
    for (module, root) in modules.iter().zip(["proto", "vendor"]) {
        assert_eq!(module.dir_path(), root);
        let per_root = |map: &BTreeMap<String, Vec<String>>| -> BTreeMap<String, Vec<String>> {
            map.iter()
                .map(|(id, paths)| (id.clone(), under_root(root, paths)))
                .filter(|(_, paths)| !paths.is_empty())
                .collect()
        };

        let lint_after = module.lint().check().enabled().unwrap();
        assert_eq!(
            lint_after.ignore_paths(),
            under_root(root, lint_before.ignore_paths()),
            "lint ignore for {root}"
        );
        assert_eq!(
            lint_after.ignore_id_or_category_to_paths(),
            &per_root(lint_before.ignore_id_or_category_to_paths()),
            "lint ignore_only for {root}"
        );

        let breaking_after = module.breaking().check().enabled().unwrap();
        assert_eq!(
            breaking_after.ignore_paths(),
            under_root(root, breaking_before.ignore_paths()),
            "breaking ignore for {root}"
        );
        assert_eq!(
            breaking_after.ignore_id_or_category_to_paths(),
            &per_root(breaking_before.ignore_id_or_category_to_paths()),
            "breaking ignore_only for {root}"
        );
    }
    assert_eq!(
        modules[0].lint().check().enabled().unwrap().ignore_paths(),
        ["a.proto"]
    );
    assert_eq!(
        modules[1].lint().check().enabled().unwrap().ignore_paths(),
        ["legacy"]
    );
}

#[test]
fn test_excludes_must_be_contained() {
    let err = try_decode(
        "version: v2\nmodules:\n  - path: proto\n    excludes: [other/vendor]\n",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.field(), Some("excludes"));
    assert!(err.to_string().contains("not contained within module directory"));

    let err = try_decode("version: v1\nbuild:\n  excludes: [../vendor]\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}

#[test]
fn test_self_ignore_disables_category() {
    let file = decode(
        "version: v2\nmodules:\n  - path: proto\n    lint:\n      ignore: [proto]\n  - path: extra\n",
    );
    let modules = file.module_configs();
    let extra = &modules[0];
    let proto = &modules[1];
    assert_eq!(proto.dir_path(), "proto");
    assert!(proto.lint().disabled());
    assert!(!extra.lint().disabled());
    assert!(!proto.breaking().disabled());

    // Written back as an ignore of the module directory, which decodes the same.
    let out = encode(&file);
    assert!(out.contains("- proto\n"));
    let again = decode(&out);
    assert!(again.module_configs()[1].lint().disabled());
    assert!(!again.module_configs()[0].lint().disabled());
}

#[test]
fn test_identical_module_configs_collapse() {
    let file = decode(
        "version: v2\nmodules:\n  - path: a\n    lint:\n      use: [MINIMAL]\n  - path: b\n    lint:\n      use: [MINIMAL]\n  - path: c\n    lint:\n      use: [MINIMAL]\n",
    );
    let out = encode(&file);
    assert!(out.contains("\nlint:\n  use:\n  - MINIMAL\n"), "{out}");
    assert_eq!(out.matches("MINIMAL").count(), 1, "{out}");

    let again = decode(&out);
    assert_eq!(again.module_configs().len(), 3);
    for module in again.module_configs() {
        assert_eq!(
            module.lint().check().enabled().unwrap().use_ids(),
            ["MINIMAL"]
        );
    }
}

#[test]
fn test_differing_module_configs_stay_per_module() {
    let file = decode(
        "version: v2\nmodules:\n  - path: a\n    lint:\n      use: [MINIMAL]\n  - path: b\n    lint:\n      use: [BASIC]\n",
    );
    let out = encode(&file);
    assert!(!out.contains("\nlint:"), "{out}");
    assert_eq!(out.matches("  lint:\n").count(), 2, "{out}");

    let again = decode(&out);
    let a = &again.module_configs()[0];
    let b = &again.module_configs()[1];
    assert_eq!(a.lint().check().enabled().unwrap().use_ids(), ["MINIMAL"]);
    assert_eq!(b.lint().check().enabled().unwrap().use_ids(), ["BASIC"]);
}

#[test]
fn test_read_falls_back_to_buf_mod() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("proto")).unwrap();
    fs::write(
        temp.path().join("proto/buf.mod"),
        "version: v1\nname: buf.build/acme/weather\n",
    )
    .unwrap();

    let bucket = OsBucket::new(temp.path());
    let file = read_buf_yaml(&bucket, "proto").unwrap();
    assert_eq!(file.file_version(), FileVersion::V1);

    put_buf_yaml(&bucket, "proto", &file).unwrap();
    let written = fs::read_to_string(temp.path().join("proto/buf.yaml")).unwrap();
    assert!(written.starts_with("version: v2\n"));
    // buf.yaml now wins over the legacy name.
    let file = read_buf_yaml(&bucket, "proto").unwrap();
    assert_eq!(file.file_version(), FileVersion::V2);
}

#[test]
fn test_missing_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let bucket = OsBucket::new(temp.path());
    let err = read_buf_yaml(&bucket, ".").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_missing_version_is_rejected() {
    let err = try_decode("name: buf.build/acme/weather\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(err.to_string().contains("has no version set"));

    let err = try_decode("version: v3\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}
