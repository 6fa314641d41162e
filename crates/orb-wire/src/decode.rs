//! Wire decoding trait

use crate::{InputStream, Result};

/// Trait for types that can be read from a payload
pub trait WireDecode: Sized {
    /// Decode a value from the current position of the stream.
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self>;

    /// Minimum number of bytes the encoding occupies
    fn wire_min_size() -> usize {
        1
    }
}
