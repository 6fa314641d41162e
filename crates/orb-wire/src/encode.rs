//! Wire encoding trait

use crate::{OutputStream, Result};

/// Trait for types that can be written to a payload
///
/// Encoding goes through an [`OutputStream`] rather than a bare buffer because
/// instance references need the per-payload identity map the stream owns.
pub trait WireEncode {
    /// Encode this value at the current end of the stream.
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()>;

    /// Minimum number of bytes the encoding occupies.
    ///
    /// Used to reject sequence sizes that cannot possibly fit in the input.
    fn wire_min_size() -> usize
    where
        Self: Sized,
    {
        1
    }
}
