//! Result and error types for covrand.

use thiserror::Error;

/// Result type for covrand operations
pub type CovResult<T> = Result<T, CovError>;

/// Errors that can occur while declaring coverage, randomizing or merging
#[derive(Debug, Error)]
pub enum CovError {
    /// Invalid declaration (names, bins, constraints, solve order)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Hard constraints admit no assignment
    #[error("Unsatisfiable constraints: {message}")]
    Unsatisfiable {
        /// Error message
        message: String,
    },

    /// Input document is not a supported coverage export
    #[error("Unsupported coverage document: {message}")]
    MergeFormat {
        /// Error message
        message: String,
    },

    /// No coverage node registered under this name
    #[error("Coverage node not found: {name}")]
    NodeNotFound {
        /// Dotted node name
        name: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CovError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsatisfiable-constraints error
    #[must_use]
    pub fn unsatisfiable(message: impl Into<String>) -> Self {
        Self::Unsatisfiable {
            message: message.into(),
        }
    }

    /// Create a merge format error
    #[must_use]
    pub fn merge_format(message: impl Into<String>) -> Self {
        Self::MergeFormat {
            message: message.into(),
        }
    }

    /// Create a node-not-found error
    #[must_use]
    pub fn node_not_found(name: impl Into<String>) -> Self {
        Self::NodeNotFound { name: name.into() }
    }

    /// Check whether this error means the constraints could not be met
    #[must_use]
    pub const fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::Unsatisfiable { .. })
    }
}
