//! Error types for parameter compilation, validation and loading.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// The three domain error kinds surfaced to API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MissingParameter,
    InvalidParameter,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingParameter => "MissingParameter",
            ErrorKind::InvalidParameter => "InvalidParameter",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

/// Errors raised while compiling schemas or validating parameters.
///
/// The `Display` output is part of the public contract: consumers match on
/// these messages, so they must not change shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing required parameter '{name}'")]
    Missing { name: String },

    #[error("missing required parameter one of {} is required", fields.join(", "))]
    MissingOneOf { fields: Vec<String> },

    #[error("incorrect parameter '{name}' should be valid {expected}")]
    Invalid { name: String, expected: String },

    /// Schema declaration mistakes. Raised at compile/seal time.
    #[error("internal error {message}")]
    Internal { message: String },
}

impl ParamError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    pub fn missing_one_of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingOneOf {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invalid(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            expected: expected.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the domain kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing { .. } | Self::MissingOneOf { .. } => ErrorKind::MissingParameter,
            Self::Invalid { .. } => ErrorKind::InvalidParameter,
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// Returns the offending field path, or the comma-joined group for
    /// one-of failures. Internal errors have no field.
    pub fn field_path(&self) -> String {
        match self {
            Self::Missing { name } | Self::Invalid { name, .. } => name.clone(),
            Self::MissingOneOf { fields } => fields.join(", "),
            Self::Internal { .. } => String::new(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Internal { .. } => 2,
            _ => 1,
        }
    }

    /// Serializable summary for machine-readable output.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            field: self.field_path(),
            message: self.to_string(),
        }
    }
}

/// Serializable view of a [`ParamError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Errors while loading definitions and inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid operation definition: {source}")]
    InvalidDefinition {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
