//! Error types for the generative API client.

use thiserror::Error;

/// Errors that can occur when calling the generative API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The prompt or candidate was blocked by safety filters.
    #[error("blocked by the model: {0}")]
    Blocked(String),

    /// An image edit finished without an image part.
    #[error("No image was returned by the model.")]
    NoImage,

    /// A caption request finished without any text.
    #[error("The model returned no text.")]
    NoText,
}

/// Error body returned by the API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Nested error details.
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    /// HTTP status code echoed in the body.
    #[serde(default)]
    pub code: u16,
    /// Error message.
    pub message: String,
    /// Canonical status name (e.g. `INVALID_ARGUMENT`).
    #[serde(default)]
    pub status: String,
}
