/*!
 * Error types for the subtitle proxy.
 *
 * This module contains custom error types for different parts of the
 * application, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to an LLM provider API
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Provider selected in settings but not usable yet
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether this error means the provider could not be reached at all,
    /// as opposed to reaching it and getting a bad answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestFailed(_) | ProviderError::ConnectionError(_)
        )
    }
}

/// Errors surfaced by the translation engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The LLM could not be reached for any cue
    #[error("translation provider unreachable: {0}")]
    UpstreamUnavailable(String),

    /// The LLM answered but nothing was parseable, even per-cue
    #[error("translation provider returned nothing usable: {0}")]
    BadResponse(String),
}

/// Main application error type covering every failure a request can surface
#[derive(Error, Debug)]
pub enum AppError {
    /// Required settings are missing for the chosen operation
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// A catalog, LLM, demuxer, or VFS dependency failed transiently
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Malformed input: bad subtitle file, invalid path, traversal attempt,
    /// unknown fingerprint
    #[error("bad input: {0}")]
    BadInput(String),

    /// Subtitle parse produced zero cues
    #[error("no subtitle entries found: {0}")]
    Empty(String),

    /// Another batch is already active
    #[error("busy: {0}")]
    Busy(String),

    /// Unhandled internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::UpstreamUnavailable(msg) => AppError::UpstreamUnavailable(msg),
            EngineError::BadResponse(msg) => AppError::UpstreamUnavailable(msg),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Internal(error.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NotConfigured(msg) => AppError::NotConfigured(msg),
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}
