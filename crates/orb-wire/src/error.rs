//! Wire error types

use thiserror::Error;

/// Upper bound for a single decoded size (sequence length, string length)
pub const MAX_WIRE_ALLOCATION_SIZE: usize = 64 * 1024 * 1024;

/// Encoding/decoding errors
///
/// Every variant raised while decoding is fatal to the payload being decoded:
/// the partially built graph is dropped and never handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Buffer underflow - not enough data
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// Invalid string - not valid UTF-8
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Size prefix is negative or larger than the remaining input
    #[error("size out of range: {size}")]
    SizeOutOfRange { size: i64 },

    /// Compacted type id refers to an entry that was never transmitted
    #[error("type id index {0} out of range")]
    InvalidTypeIdIndex(usize),

    /// An instance index was referenced but its body never arrived
    #[error("unresolved instance index {0}")]
    UnresolvedInstance(i32),

    /// The body of an instance index was transmitted twice
    #[error("duplicate instance index {0}")]
    DuplicateInstance(i32),

    /// Malformed instance marker
    #[error("invalid instance index {0}")]
    InvalidInstanceIndex(i32),

    /// Fields were read past the end of their slice
    #[error("slice overrun in {type_id}")]
    SliceOverrun { type_id: String },

    /// A slice header did not match the type expected at that level
    #[error("unexpected slice: expected {expected}, found {found}")]
    UnexpectedSlice { expected: String, found: String },

    /// No factory exists for any slice of an instance that must be concrete
    #[error("no known type for {type_id}")]
    NoKnownType { type_id: String },

    /// No slice of a user exception is known locally
    #[error("unknown user exception: {type_id}")]
    UnknownUserException { type_id: String },

    /// Narrowing an instance to a type it does not implement
    #[error("type mismatch: expected {expected}, actual {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Handle does not name a live instance of the graph
    #[error("invalid handle: {0}")]
    InvalidHandle(u32),

    /// Bytes left over after the payload was fully decoded
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

impl From<std::string::FromUtf8Error> for WireError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        WireError::InvalidString(err.to_string())
    }
}

/// Result type for wire operations
pub type Result<T> = std::result::Result<T, WireError>;
