//! Structured error types shared across RGF crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`RgfError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (coupling names, norms, iteration counts).
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
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the RGF engine.
///
/// The spec-level taxonomy maps onto stable codes carried in the payload:
/// `divergence` and `step-underflow` under [`RgfError::Flow`],
/// `no-convergence` and `multiple-fixed-points` under [`RgfError::Solve`],
/// `unstable-invariant` under [`RgfError::Topology`] and `timeout` wherever a
/// budget expires before any partial result exists. Poor Monte Carlo mixing is
/// deliberately not an error; it is a flag on the estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RgfError {
    /// Flow integration errors (divergence, step underflow).
    #[error("flow error: {0}")]
    Flow(ErrorInfo),
    /// Fixed-point solver errors (no convergence, non-unique solutions).
    #[error("solve error: {0}")]
    Solve(ErrorInfo),
    /// Stability analysis errors (Jacobian or eigenvalue failures).
    #[error("stability error: {0}")]
    Stability(ErrorInfo),
    /// Monte Carlo sampling errors.
    #[error("sampling error: {0}")]
    Sampling(ErrorInfo),
    /// Topological invariant estimation errors.
    #[error("topology error: {0}")]
    Topology(ErrorInfo),
    /// Configuration validation errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
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

impl RgfError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RgfError::Flow(info)
            | RgfError::Solve(info)
            | RgfError::Stability(info)
            | RgfError::Sampling(info)
            | RgfError::Topology(info)
            | RgfError::Config(info)
            | RgfError::Serde(info) => info,
        }
    }

    /// Returns the stable machine readable code of the error.
    pub fn code(&self) -> &str {
        &self.info().code
    }
}
