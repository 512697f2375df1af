//! Error types for toolport.

use thiserror::Error;

/// Main error type for toolport operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API returned an error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response or input could not be interpreted
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required environment variables are absent
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// Tool parameter failed schema validation
    #[error("Invalid parameter '{field}': {message}")]
    Validation { field: String, message: String },

    /// No tool registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool name was registered twice
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Database driver error
    #[error("Database error: {0}")]
    Database(String),

    /// External command exited unsuccessfully
    #[error("Command failed (exit code {}): {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Command { code: Option<i32>, stderr: String },

    /// Remote system reported the operation as failed
    #[error("Remote operation failed: {0}")]
    Remote(String),

    /// Remote system cancelled the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Remote system answered with an inconsistent response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Bounded wait exhausted
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error annotated with what was being attempted
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map an HTTP status code and response body to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }

    /// Shorthand for a validation error on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with a description of the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Render as the single-line message shown to tool callers.
    ///
    /// Errors carrying a context read `Error fetching X: cause`, everything
    /// else reads `Error: cause`.
    pub fn user_message(&self) -> String {
        let raw = match self {
            Error::Context { context, source } => format!("Error {}: {}", context, source),
            other => format!("Error: {}", other),
        };
        single_line(&raw)
    }
}

/// Collapse line breaks and runs of whitespace into single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result type alias for toolport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension for attaching operation context to results.
pub trait ResultExt<T> {
    /// Attach a fixed context string.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Attach a lazily built context string.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
