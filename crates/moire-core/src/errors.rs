//! Structured error types shared across moire crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MoireError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (sample ids, loci, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the moire engine.
///
/// The host is expected to report and halt on any of these; none of them is
/// raised for an ordinary rejected proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MoireError {
    /// Invalid run configuration (ladder, bounds, hyperparameters).
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Malformed or inconsistent genotyping data.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// A chain could not be initialised with a finite likelihood.
    #[error("degenerate initialization: {0}")]
    DegenerateInit(ErrorInfo),
    /// Serialization, schema and file IO errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MoireError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MoireError::Config(info)
            | MoireError::Data(info)
            | MoireError::DegenerateInit(info)
            | MoireError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error with the given code and message.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        MoireError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a data error with the given code and message.
    pub fn data(code: &str, message: impl Into<String>) -> Self {
        MoireError::Data(ErrorInfo::new(code, message))
    }

    /// Shorthand for a serialization or IO error wrapping any displayable cause.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        MoireError::Serde(ErrorInfo::new(code, err.to_string()))
    }
}
