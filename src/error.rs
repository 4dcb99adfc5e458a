use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneError {
    #[error("Invalid gene call: {0}")]
    Validation(String),

    #[error("Unrecognized {source_label} output: {message}")]
    Format {
        source_label: String,
        message: String,
    },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeneError {
    pub fn format(source_label: impl Into<String>, message: impl Into<String>) -> Self {
        GeneError::Format {
            source_label: source_label.into(),
            message: message.into(),
        }
    }

    /// Classification recorded when this error ends a query task.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeneError::Validation(_) => ErrorKind::Validation,
            GeneError::Format { .. } => ErrorKind::Format,
            GeneError::Transport(_) | GeneError::Http(_) | GeneError::Io(_) => ErrorKind::Transport,
            GeneError::Timeout(_) => ErrorKind::Timeout,
            GeneError::Cancelled => ErrorKind::Cancelled,
            GeneError::Config(_) | GeneError::Toml(_) => ErrorKind::Config,
            GeneError::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Serializable failure category stored in a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Format,
    Transport,
    Timeout,
    Cancelled,
    Config,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Format => "format",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

pub type Result<T> = std::result::Result<T, GeneError>;
