//! Reactor error types

use thiserror::Error;

/// Management reactor errors
#[derive(Debug, Error)]
pub enum MgmtError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every listener slot is occupied
    #[error("no free listener slot")]
    ListenersFull,

    /// A connection was accepted with every slot occupied
    #[error("no free connection slot")]
    PoolFull,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for reactor operations
pub type MgmtResult<T> = Result<T, MgmtError>;
