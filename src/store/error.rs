use thiserror::Error;

/// Backing store specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Store returned an error response
    #[error("Store error (status {status}): {message}")]
    Backend { status: u16, message: String },

    /// Failed to connect after multiple retries
    #[error("Failed to connect to store after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    /// Failed to parse response
    #[error("Failed to parse response: {reason}")]
    Parse { reason: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}
