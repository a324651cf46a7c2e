//! Error types for RTOS adaptation operations

use core::fmt;

/// Adaptation result type
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Adaptation error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The scheduler has not been started yet
    KernelNotRunning,
    /// Component used before it was initialized
    NotInitialized,
    /// Component initialized twice
    AlreadyInitialized,
    /// Invalid configuration
    InvalidConfig,
    /// Invalid parameter
    InvalidParameter,
    /// Semaphore, mutex or task could not be allocated
    ResourceExhausted,
    /// Semaphore already holds its maximum count
    CountLimit,
    /// Mutex released by a task that does not own it
    NotOwner,
    /// Object not found
    NotFound,
    /// Non-volatile storage failure
    StorageFailure,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KernelNotRunning => write!(f, "Scheduler not running"),
            Error::NotInitialized => write!(f, "Not initialized"),
            Error::AlreadyInitialized => write!(f, "Already initialized"),
            Error::InvalidConfig => write!(f, "Invalid configuration"),
            Error::InvalidParameter => write!(f, "Invalid parameter"),
            Error::ResourceExhausted => write!(f, "Resource exhausted"),
            Error::CountLimit => write!(f, "Semaphore count limit reached"),
            Error::NotOwner => write!(f, "Mutex not owned by caller"),
            Error::NotFound => write!(f, "Object not found"),
            Error::StorageFailure => write!(f, "Storage failure"),
        }
    }
}
