//! Error types for the rules API client.

use thiserror::Error;

/// Errors raised while talking to the rules provider.
///
/// None of these are retried; each one ends the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Token acquisition failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// What went wrong.
        message: String,
    },

    /// A rules page could not be fetched or decoded.
    #[error("failed to fetch rules page: {message}")]
    Fetch {
        /// What went wrong.
        message: String,
    },

    /// A configured host is not a valid base URL.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {message}")]
    HttpClient {
        /// What went wrong.
        message: String,
    },
}

impl ClientError {
    pub(crate) fn auth(message: String) -> Self {
        Self::Auth { message }
    }

    pub(crate) fn fetch(message: String) -> Self {
        Self::Fetch { message }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
