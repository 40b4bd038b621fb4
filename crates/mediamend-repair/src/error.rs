//! Error types for mediamend-repair.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while repairing a file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool exited with a failure status.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// An external tool exceeded its time budget and was killed.
    #[error("tool timed out after {seconds}s: {tool}")]
    ToolTimeout { tool: String, seconds: u64 },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// A repair strategy could not produce a candidate.
    #[error("strategy produced no usable output: {0}")]
    StrategyFailed(String),

    /// Workspace error.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Error from the analysis pass.
    #[error(transparent)]
    Analysis(#[from] mediamend_analysis::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the attempt failed but the next strategy
    /// should still run.
    pub fn is_attempt_failure(&self) -> bool {
        !matches!(self, Error::ToolNotFound { .. })
    }
}
