use thiserror::Error;

/// Errors that can occur while constructing profiles or running simulated queries.
#[derive(Debug, Error)]
pub enum Error {
    /// The host interrupted the I/O suspension, for example on request cancellation or shutdown.
    #[error("simulated query was cancelled")]
    Cancelled,

    /// The memory phase could not obtain the requested buffer.
    #[error("cannot allocate {bytes} bytes for the simulated result set")]
    ResourceExhausted {
        /// The number of bytes that were requested.
        bytes: u64,
    },

    /// A profile was constructed with bounds that violate `min <= max`.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

/// Result type for simulator operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
