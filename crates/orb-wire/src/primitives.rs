//! Primitive type implementations
//!
//! All primitives are little-endian with no alignment padding:
//!
//! | Wire Type | Rust Type | Size |
//! |-----------|-----------|------|
//! | bool      | bool      | 1    |
//! | byte      | u8        | 1    |
//! | short     | i16       | 2    |
//! | int       | i32       | 4    |
//! | long      | i64       | 8    |
//! | float     | f32       | 4    |
//! | double    | f64       | 8    |
//! | string    | String    | size + UTF-8 bytes |

use crate::{InputStream, OutputStream, Result, WireDecode, WireEncode};

macro_rules! impl_wire_primitive {
    ($ty:ty, $size:expr, $put:ident, $get:ident) => {
        impl WireEncode for $ty {
            fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
                out.$put(*self);
                Ok(())
            }

            fn wire_min_size() -> usize {
                $size
            }
        }

        impl WireDecode for $ty {
            fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
                input.$get()
            }

            fn wire_min_size() -> usize {
                $size
            }
        }
    };
}

impl_wire_primitive!(bool, 1, put_bool, get_bool);
impl_wire_primitive!(u8, 1, put_u8, get_u8);
impl_wire_primitive!(i16, 2, put_i16, get_i16);
impl_wire_primitive!(i32, 4, put_i32, get_i32);
impl_wire_primitive!(i64, 8, put_i64, get_i64);
impl_wire_primitive!(f32, 4, put_f32, get_f32);
impl_wire_primitive!(f64, 8, put_f64, get_f64);

impl WireEncode for str {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_string(self)
    }
}

impl WireEncode for String {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_string(self)
    }
}

impl WireDecode for String {
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
        input.read_string()
    }
}
