//! Error types shared across the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlogrollError {
    /// Rejected options: missing parameters, malformed proxy URL, zero batch size.
    #[error("configuration error: {0}")]
    Config(String),

    /// The host surface has no container with the configured id.
    #[error("feed container '{0}' not found")]
    ContainerNotFound(String),

    /// Transport failures and non-success statuses from the proxy.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A value outside its documented domain, e.g. a words-per-minute rate of zero.
    #[error("invalid value: {0}")]
    Value(String),
}

pub type Result<T> = std::result::Result<T, BlogrollError>;

impl From<reqwest::Error> for BlogrollError {
    fn from(err: reqwest::Error) -> Self {
        BlogrollError::Http(err.to_string())
    }
}
