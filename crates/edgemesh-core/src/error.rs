//! Core error types

use thiserror::Error;

/// Runtime-core errors
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// MAC address string could not be parsed
    #[error("malformed MAC address: {0}")]
    MalformedMac(String),

    /// Supernode spec was not of the form `<host:port>`
    #[error("malformed supernode spec (expected <host:port>): {0}")]
    MalformedSupernode(String),

    /// Name resolution failed
    #[error("failed to resolve supernode host {host}: {reason}")]
    ResolveFailed { host: String, reason: String },

    /// Resolution succeeded but produced no IPv4 address
    #[error("no IPv4 address found for host {0}")]
    NoIpv4Address(String),

    /// Replay stamp too far from local time
    #[error("time stamp outside the allowed time frame")]
    StampOutOfFrame,

    /// Replay stamp not newer than the previously accepted one
    #[error("time stamp not strictly increasing")]
    StampNotIncreasing,

    /// No async runtime to host the resolver worker
    #[error("no async runtime available for the resolver worker")]
    ResolverUnavailable,
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
