//! Error types for pigcache

use thiserror::Error;

/// Result type alias for pigcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by data sources and peer clients
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for cache operations
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an unusable argument (e.g. an empty key)
    #[error("{0}")]
    InvalidArgument(String),

    /// Named resource does not exist (unknown group, empty ring)
    #[error("{0}")]
    NotFound(String),

    /// Local data source failed; the message is passed through unchanged
    #[error("{0}")]
    Loader(BoxError),

    /// Owning peer returned a non-success response or was unreachable
    #[error("peer {peer}: {message}")]
    Remote {
        /// Peer the request was sent to
        peer: String,
        /// Status text or transport error
        message: String,
    },

    /// The load context deadline passed before the value was produced
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The load context was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Build a remote failure for `peer`
    pub fn remote(peer: impl Into<String>, message: impl ToString) -> Self {
        Error::Remote {
            peer: peer.into(),
            message: message.to_string(),
        }
    }
}
