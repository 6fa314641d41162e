//! Output stream
//!
//! Encodes primitives, sizes and strings into a growable buffer, assigns
//! instance indices on first reference, and queues instance bodies for the
//! pending-instance section written at the end of the payload.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::exception::UserException;
use crate::graph::{Graph, Handle, Value};
use crate::{Result, WireEncode, WireError, FLAG_LAST_SLICE, FLAG_TYPE_ID_INDEX, SIZE_ESCAPE};

/// Encoder for one payload
pub struct OutputStream<'g> {
    buf: BytesMut,
    graph: Option<&'g Graph>,
    /// Handle to wire index (1-based)
    instances: HashMap<Handle, i32>,
    /// Referenced instances whose body has not been written yet
    pending: Vec<Handle>,
    /// Type ids already sent in this payload, with their compact index
    type_ids: HashMap<&'static str, usize>,
    /// Buffer offsets of the size fields of open slices
    slices: Vec<usize>,
}

impl<'g> OutputStream<'g> {
    /// Create a stream that cannot reference instances
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            graph: None,
            instances: HashMap::new(),
            pending: Vec::new(),
            type_ids: HashMap::new(),
            slices: Vec::new(),
        }
    }

    /// Create a stream whose instance references resolve in `graph`
    pub fn with_graph(graph: &'g Graph) -> Self {
        Self {
            graph: Some(graph),
            ..Self::new()
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    #[inline]
    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    #[inline]
    pub fn put_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    #[inline]
    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    #[inline]
    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    #[inline]
    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    #[inline]
    pub fn put_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    /// Write a size: one byte below 255, otherwise 255 followed by an i32
    pub fn write_size(&mut self, size: usize) -> Result<()> {
        if size < SIZE_ESCAPE as usize {
            self.put_u8(size as u8);
            return Ok(());
        }
        let size = i32::try_from(size).map_err(|_| WireError::SizeOutOfRange { size: size as i64 })?;
        self.put_u8(SIZE_ESCAPE);
        self.put_i32(size);
        Ok(())
    }

    /// Write raw bytes without a size prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a size-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_size(value.len())?;
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Write any encodable value
    pub fn write<T: WireEncode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.wire_encode(self)
    }

    /// Write a reference to an instance.
    ///
    /// The first reference to a handle assigns it the next wire index and
    /// queues its body; later references repeat the index.
    pub fn write_instance(&mut self, handle: Option<Handle>) -> Result<()> {
        let Some(handle) = handle else {
            self.put_i32(0);
            return Ok(());
        };
        let graph = self.graph.ok_or(WireError::InvalidHandle(handle.0))?;
        if !graph.contains(handle) {
            return Err(WireError::InvalidHandle(handle.0));
        }

        let next = self.instances.len() as i32 + 1;
        let index = match self.instances.get(&handle) {
            Some(&index) => index,
            None => {
                self.instances.insert(handle, next);
                self.pending.push(handle);
                next
            }
        };
        self.put_i32(-index);
        Ok(())
    }

    pub(crate) fn start_slice(&mut self, type_id: &'static str, last: bool) -> Result<()> {
        let mut flags = 0u8;
        if last {
            flags |= FLAG_LAST_SLICE;
        }
        match self.type_ids.get(type_id) {
            Some(&index) => {
                self.put_u8(flags | FLAG_TYPE_ID_INDEX);
                self.write_size(index)?;
            }
            None => {
                let index = self.type_ids.len() + 1;
                self.type_ids.insert(type_id, index);
                self.put_u8(flags);
                self.write_string(type_id)?;
            }
        }
        self.slices.push(self.buf.len());
        self.put_i32(0);
        Ok(())
    }

    pub(crate) fn end_slice(&mut self) -> Result<()> {
        let Some(start) = self.slices.pop() else {
            return Ok(());
        };
        let size = self.buf.len() - start;
        let size = i32::try_from(size).map_err(|_| WireError::SizeOutOfRange { size: size as i64 })?;
        self.buf[start..start + 4].copy_from_slice(&size.to_le_bytes());
        Ok(())
    }

    fn write_value_slices(&mut self, value: &dyn Value) -> Result<()> {
        let base = value.base();
        self.start_slice(value.type_name(), base.is_none())?;
        value.write_fields(self)?;
        self.end_slice()?;
        match base {
            Some(base) => self.write_value_slices(base),
            None => Ok(()),
        }
    }

    /// Write the slices of a user exception, most-derived first
    pub fn write_exception(&mut self, exception: &dyn UserException) -> Result<()> {
        let base = exception.base();
        self.start_slice(exception.type_name(), base.is_none())?;
        exception.write_fields(self)?;
        self.end_slice()?;
        match base {
            Some(base) => self.write_exception(base),
            None => Ok(()),
        }
    }

    /// Write the pending-instance section.
    ///
    /// Bodies may reference further instances, so batches are written until
    /// the queue drains, then a zero-size batch terminates the section.
    pub fn write_pending_instances(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            self.write_size(batch.len())?;
            for handle in batch {
                let index = *self
                    .instances
                    .get(&handle)
                    .ok_or(WireError::InvalidHandle(handle.0))?;
                let graph = self.graph.ok_or(WireError::InvalidHandle(handle.0))?;
                let value = graph.get(handle)?;
                value.pre_marshal()?;
                trace!("writing instance {} of type `{}`", index, value.type_name());
                self.put_i32(index);
                self.write_value_slices(value)?;
            }
        }
        self.write_size(0)
    }

    /// Write the pending-instance section and return the payload
    pub fn finish(mut self) -> Result<Bytes> {
        self.write_pending_instances()?;
        Ok(self.buf.freeze())
    }
}

impl Default for OutputStream<'_> {
    fn default() -> Self {
        Self::new()
    }
}
