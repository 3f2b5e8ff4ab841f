//! Error types for validation, the HTTP client and the generation lifecycle.

use thiserror::Error;

/// Why a candidate input file was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFile,

    #[error("Please upload a valid MP3 file")]
    UnsupportedType { name: String, mime_type: String },

    #[error("File size exceeds 10MB. Please upload a smaller file.")]
    TooLarge { size: u64, max: u64 },
}

/// Failure talking to the generation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// DNS, connect, TLS or timeout failure. The request never got an answer.
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The service answered 2xx but the body was not what we expected.
    #[error("Invalid response from server: {0}")]
    Decode(String),

    #[error("Failed to read upload file: {0}")]
    Io(String),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// True for transport failures, as opposed to an answer we didn't like.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Everything `GenerationController::submit` can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Please enter a style description")]
    EmptyPrompt,

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The remote task failed or produced nothing usable.
    #[error("{0}")]
    Application(String),

    #[error("Generation timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// The caller dropped `submit` before the upload finished.
    #[error("Upload cancelled")]
    Cancelled,
}

impl GenerationError {
    /// True when the service was unreachable or answered with an error, as
    /// opposed to a task that ran and failed.
    pub fn is_api(&self) -> bool {
        matches!(self, GenerationError::Api(_))
    }
}
