use thiserror::Error;

/// Application-wide error types for dishmark.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed before a usable response arrived.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// External analyzer or vendor API answered with a non-success status.
    #[error("Analyzer error (HTTP {status_code}): {message}")]
    AnalyzerError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// The analyzer answered successfully but the payload lacked the expected fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A checkpoint, batch or report file could not be written.
    #[error("Persistence error at {path}: {message}")]
    PersistenceError { path: String, message: String },

    /// A source file is missing or not parseable.
    #[error("Input error in {path}: {message}")]
    InputError { path: String, message: String },

    /// Invalid configuration detected before a run starts.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl AppError {
    pub fn persistence(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        AppError::PersistenceError {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    pub fn input(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        AppError::InputError {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::AnalyzerError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if the run can no longer guarantee resumability and must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::PersistenceError { .. })
    }
}
