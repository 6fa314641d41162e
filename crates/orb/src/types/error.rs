//! Object layer error types

use orb_wire::WireError;
use thiserror::Error;

use super::Identity;

/// Result type for object layer operations
pub type Result<T> = std::result::Result<T, OrbError>;

/// Object layer errors
///
/// Errors are `Clone` because a single coalesced lookup hands the same
/// outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrbError {
    /// The locator does not know the adapter id
    #[error("adapter not found: {0}")]
    AdapterNotFound(String),

    /// The locator does not know the well-known object
    #[error("object not found: {0}")]
    ObjectNotFound(Identity),

    /// The locator could not be reached or failed
    #[error("locator unavailable: {0}")]
    LocatorUnavailable(String),

    /// The router could not be reached or failed
    #[error("router unavailable: {0}")]
    RouterUnavailable(String),

    /// Resolution produced no usable endpoint
    #[error("no suitable endpoint for {0}")]
    NoEndpoint(String),

    /// An invocation or lookup exceeded its time limit
    #[error("operation timed out")]
    Timeout,

    /// The communicator has been destroyed
    #[error("communicator destroyed")]
    Destroyed,

    /// The transport could not connect to any endpoint
    #[error("connection failed: {0}")]
    Connect(String),

    /// Malformed proxy string
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    /// Malformed endpoint string
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Malformed identity string
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A configuration property has a value that cannot be parsed
    #[error("invalid value {value:?} for property {key}")]
    InvalidProperty { key: String, value: String },

    /// Payload encoding or decoding failed
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

impl OrbError {
    /// Whether the caller may reasonably retry the invocation.
    ///
    /// Resolution failures are retryable; a missing object is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrbError::AdapterNotFound(_)
                | OrbError::LocatorUnavailable(_)
                | OrbError::RouterUnavailable(_)
                | OrbError::NoEndpoint(_)
                | OrbError::Timeout
                | OrbError::Connect(_)
        )
    }

    /// Whether the error reports a failure to reach the endpoints
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, OrbError::Connect(_))
    }
}
