//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model backend call failed (network, timeout, auth)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend ignored a required tool choice
    #[error("Forced tool choice violated: {0}")]
    ForcedToolChoice(String),

    /// Tool-call arguments did not satisfy the response schema
    #[error("Schema conformance error: {0}")]
    SchemaConformance(String),

    /// Structured-output backend call returned a non-conformant object
    #[error("Structured output contract violated: {0}")]
    StructuredContract(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool argument validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Backend returned a payload the client could not parse
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configured turn cap reached
    #[error("Maximum turns ({0}) reached")]
    MaxTurns(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether this error aborts the invocation.
    ///
    /// Tool-level errors are captured as error-bearing tool results and the
    /// loop continues; everything else propagates to the caller.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolValidation(_)
                | AgentError::ToolExecution(_)
        )
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::ToolExecution(err.to_string())
    }
}
