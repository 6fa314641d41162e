//! Object payload encoding runtime
//!
//! This crate encodes and decodes operation payloads that carry class
//! instances and user exceptions between processes that may not share the
//! same type definitions.
//!
//! # Wire Format
//!
//! - Primitives are little-endian with no alignment
//! - Sizes are one byte below 255, otherwise 255 followed by an i32
//! - An instance reference is an i32: 0 for null, `-index` otherwise
//! - Instance bodies follow the parameters in a pending-instance section:
//!   batches of `size n` then `n` × (index, slices), ending with size 0
//! - A class or exception is a stack of slices, most-derived first. Each
//!   slice carries a flags byte, its type id (inline on first use, then a
//!   compact index), an i32 byte size, and the fields of that level
//! - The last slice of a stack has [`FLAG_LAST_SLICE`] set
//!
//! A receiver that does not know a slice's type id skips it using the size
//! and keeps the remaining, less derived slices. This is what lets a process
//! decode instances and exceptions of types it has never seen.

mod codec;
mod decode;
mod encode;
mod error;
mod exception;
mod graph;
mod input;
mod output;
mod primitives;
mod registry;
mod sequences;

pub use codec::{decode_exception, decode_value, decode_values, encode_exception, encode_values};
pub use decode::WireDecode;
pub use encode::WireEncode;
pub use error::{Result, WireError, MAX_WIRE_ALLOCATION_SIZE};
pub use exception::{narrow_exception, RaisedException, UserException};
pub use graph::{
    is_a, narrow, narrow_mut, type_chain, Graph, Handle, StaticTypeId, UnknownValue, Value,
    ROOT_TYPE_ID,
};
pub use input::{InputStream, SliceHeader};
pub use output::OutputStream;
pub use registry::{ExceptionFactory, TypeRegistry, ValueFactory};

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Set on the final slice of an instance or exception
pub const FLAG_LAST_SLICE: u8 = 0x01;

/// Set when the slice's type id is sent as an index into earlier type ids
pub const FLAG_TYPE_ID_INDEX: u8 = 0x02;

/// Size byte announcing that an i32 size follows
pub const SIZE_ESCAPE: u8 = 255;
