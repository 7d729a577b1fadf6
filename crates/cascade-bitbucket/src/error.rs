//! Error types for cascade-bitbucket.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Bitbucket API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication failed.
    #[error("bitbucket authentication failed - check BITBUCKET_USERNAME and BITBUCKET_PASSWORD")]
    AuthenticationFailed,

    /// The repository exposes no usable clone link.
    #[error("cannot determine clone url of {0}")]
    MissingCloneLink(String),

    /// The branching model has no release branch type, so the cascade
    /// cannot be configured.
    #[error("cannot inspect branching model on {0}")]
    ConfigurationMissing(String),

    /// API error with status code.
    #[error("bitbucket API error ({status}): {message}")]
    ApiError {
        /// HTTP status returned by the API.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse bitbucket response: {0}")]
    Parse(#[from] serde_json::Error),
}
