//! Structured error types for configuration decoding and encoding.

use crate::config::FileVersion;
use std::io;
use thiserror::Error;

/// Error kinds for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration supplied by the user is invalid. Fix the file.
    User,
    /// An internal invariant did not hold. This is a bug in this crate.
    System,
    /// The requested file does not exist.
    NotFound,
    /// The storage layer failed while reading or writing.
    Io,
}

/// Error returned by every decoder, encoder and bucket operation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed YAML or JSON, including unknown fields.
    #[error("could not unmarshal as {format}: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    /// A field (or a combination of fields) violates a constraint.
    #[error("{message}")]
    Invalid {
        field: Option<String>,
        message: String,
    },

    /// A file kind requiring a version has none.
    #[error(
        "{file_name} has no version set. Please add \"version: {suggested}\". \
         See https://buf.build/docs/configuration for more details"
    )]
    NoVersion {
        file_name: String,
        suggested: FileVersion,
    },

    /// The version string is not one of the known versions.
    #[error("unknown file version: {0:?}")]
    UnknownVersion(String),

    /// The version is known but this file kind does not support it.
    #[error("{file_name} does not support version {version}")]
    UnsupportedVersion {
        file_name: String,
        version: FileVersion,
    },

    /// A file was not present at the requested path.
    #[error("{path}: does not exist")]
    NotFound { path: String },

    /// An internal invariant was violated.
    #[error("system error: {0}")]
    System(String),

    /// The storage layer failed.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Any error, localised to the file it came from.
    #[error("{file_name}: {source}")]
    InFile {
        file_name: String,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    // Convenience constructors

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::invalid_field(field, format!("{} is required", field))
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::System(message.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(err: serde_yaml::Error) -> Self {
        Self::Decode {
            format: "YAML",
            message: err.to_string(),
        }
    }

    pub fn json(err: serde_json::Error) -> Self {
        Self::Decode {
            format: "JSON",
            message: err.to_string(),
        }
    }

    /// Attach the name of the file this error refers to.
    ///
    /// Errors that already name the same file are returned as-is.
    pub fn with_file_name(self, file_name: &str) -> Self {
        match self {
            Self::InFile {
                file_name: ref existing,
                ..
            } if existing == file_name => self,
            Self::NotFound { .. } | Self::NoVersion { .. } | Self::UnsupportedVersion { .. } => {
                self
            }
            other => Self::InFile {
                file_name: file_name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. }
            | Self::Invalid { .. }
            | Self::NoVersion { .. }
            | Self::UnknownVersion(_)
            | Self::UnsupportedVersion { .. } => ErrorKind::User,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::System(_) => ErrorKind::System,
            Self::Io { .. } => ErrorKind::Io,
            Self::InFile { source, .. } => source.kind(),
        }
    }

    /// The field this error is about, if it names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => field.as_deref(),
            Self::InFile { source, .. } => source.field(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_system(&self) -> bool {
        self.kind() == ErrorKind::System
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
