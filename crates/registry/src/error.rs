use thiserror::Error;

/// Chain directory failures. Each one is scoped to the request that raised
/// it; the directory never hands out an empty descriptor instead.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),
}

impl RegistryError {
    /// Transport failures and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::Http { .. } => true,
            RegistryError::Status { status, .. } => *status >= 500,
            RegistryError::Decode { .. } | RegistryError::InvalidUrl(_) => false,
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
