use thiserror::Error;

/// Result type for Yeelight operations
pub type Result<T> = std::result::Result<T, YeelightError>;

/// Errors that can occur when talking to a Yeelight device
#[derive(Error, Debug)]
pub enum YeelightError {
    /// No device answered the discovery search before the deadline
    #[error("No devices found")]
    DiscoveryTimeout,

    /// Discovery response could not be parsed as a header block
    #[error("Malformed discovery response: {0}")]
    MalformedDiscoveryResponse(String),

    /// Connection-level failure (refused, reset, unreachable, ...)
    #[error("Transport error for {address}: {source}")]
    Transport {
        /// Address the operation was talking to
        address: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Command write/read did not finish within the timeout budget
    #[error("Request timeout")]
    Timeout,

    /// Command response was not a decodable result line
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Device answered with an error object
    #[error("Command rejected (code {code}): {message}")]
    CommandRejected {
        /// Error code reported by the device
        code: i64,
        /// Error message reported by the device
        message: String,
    },

    /// Caller-supplied argument failed local validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl YeelightError {
    pub(crate) fn transport(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            address: address.into(),
            source,
        }
    }
}
