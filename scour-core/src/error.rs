//! Error types for scour operations

#[derive(Debug, thiserror::Error)]
pub enum ScourError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Interrupted while waiting for per-root query results")]
    Interrupted,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Provider error for {authority}: {message}")]
    Provider { authority: String, message: String },

    #[error("Failed to release row source {label}: {message}")]
    StreamClosed { label: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Glob pattern error: {0}")]
    GlobPattern(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScourError {
    pub fn provider(authority: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            authority: authority.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable code, used for JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Interrupted => "interrupted",
            Self::Cancelled => "cancelled",
            Self::Provider { .. } => "provider_error",
            Self::StreamClosed { .. } => "stream_closed",
            Self::Io(_) => "io_error",
            Self::ConfigParse(_) => "config_parse",
            Self::GlobPattern(_) => "glob_pattern",
            Self::Serialization(_) => "serialization",
        }
    }
}
