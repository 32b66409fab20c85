//! Configuration file model.
//!
//! Every supported version of each file kind decodes into one internal model,
//! and every file is written back in the latest version:
//! - **Module manifest** - `buf.yaml` / `buf.mod` ([`BufYamlFile`])
//! - **Lock file** - `buf.lock` ([`BufLockFile`])
//! - **Generation manifest** - `buf.gen.yaml` ([`BufGenYamlFile`])
//! - **Workspace manifest** - `buf.work.yaml` / `buf.work` ([`BufWorkYamlFile`])
//!
//! ## Reading and writing
//! - `decode_*` / `encode_*` work on raw bytes
//! - `read_*` / `put_*` work on a [`crate::storage`] bucket directory
//!
//! [`terminate::find_controlling_workspace`] finds the workspace that controls
//! a directory.

mod buf_lock;
mod buf_work;
mod buf_yaml;
mod check;
pub(crate) mod encoding;
mod files;
pub mod generate;
mod module;
mod module_name;
mod plugin;
mod policy;
pub mod terminate;
mod version;

pub use buf_lock::{
    BUF_LOCK_HEADER, BufLockFile, Digest, DigestKind, DigestResolver, LockDependency,
    buf_lock_digest_kind, decode_buf_lock, decode_buf_lock_with_resolver, encode_buf_lock,
    put_buf_lock, read_buf_lock,
};
pub use buf_work::{
    BufWorkYamlFile, decode_buf_work_yaml, encode_buf_work_yaml, put_buf_work_yaml,
    read_buf_work_yaml,
};
pub use buf_yaml::{
    BUF_YAML_DOCS_LINK, BufYamlFile, decode_buf_yaml, decode_buf_yaml_with_probe,
    encode_buf_yaml, put_buf_yaml, read_buf_yaml,
};
pub use check::{
    BreakingConfig, CheckConfig, CheckKind, DEFAULT_ENUM_ZERO_VALUE_SUFFIX,
    DEFAULT_SERVICE_SUFFIX, EnabledCheckConfig, LintConfig, LintOptions, upgrade_rule_id,
};
pub use encoding::StringOrList;
pub use files::{FoundFile, file_exists, find_file, read_file};
pub use generate::{
    BUF_GEN_YAML_DOCS_LINK, BufGenYamlFile, GenerateConfig, GenerateTypeConfig,
    decode_buf_gen_yaml, encode_buf_gen_yaml, put_buf_gen_yaml, read_buf_gen_yaml,
};
pub use module::ModuleConfig;
pub use module_name::{ModuleFullName, ModuleRef};
pub use plugin::{LocalFileProbe, OsFileProbe, PluginConfig, PluginConfigType};
pub use policy::PolicyConfig;
pub use terminate::{TerminateResult, find_controlling_workspace};
pub use version::{FileKind, FileVersion, resolve_file_version};
