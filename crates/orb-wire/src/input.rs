//! Input stream
//!
//! Decodes a payload produced by [`OutputStream`](crate::OutputStream).
//! Instance references are mapped to graph slots as soon as their index is
//! first seen, which lets forward references and cycles resolve once the
//! pending-instance section is read. Slices of types that are not registered
//! locally are skipped using their size prefix.

use std::collections::HashMap;

use bytes::{Buf, Bytes};
use tracing::{debug, trace};

use crate::exception::UserException;
use crate::graph::{Graph, Handle, UnknownValue, Value};
use crate::registry::TypeRegistry;
use crate::{
    Result, WireDecode, WireError, FLAG_LAST_SLICE, FLAG_TYPE_ID_INDEX, MAX_WIRE_ALLOCATION_SIZE,
    SIZE_ESCAPE,
};

/// Minimum encoded size of one pending-instance entry: index plus flags
const MIN_INSTANCE_ENTRY: usize = 5;

/// Decoded slice header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    pub type_id: String,
    pub last: bool,
}

struct OpenSlice {
    end: usize,
    type_id: String,
}

/// Decoder for one payload
pub struct InputStream<'r> {
    buf: Bytes,
    len: usize,
    registry: &'r TypeRegistry,
    graph: Graph,
    /// Wire index (1-based) to graph slot
    instances: HashMap<i32, Handle>,
    type_ids: Vec<String>,
    slices: Vec<OpenSlice>,
    /// References read outside of any instance body
    roots: Vec<Handle>,
    instance_depth: usize,
}

impl<'r> InputStream<'r> {
    /// Create a stream over `buf`, instantiating types from `registry`
    pub fn new(buf: Bytes, registry: &'r TypeRegistry) -> Self {
        Self {
            len: buf.len(),
            buf,
            registry,
            graph: Graph::new(),
            instances: HashMap::new(),
            type_ids: Vec::new(),
            slices: Vec::new(),
            roots: Vec::new(),
            instance_depth: 0,
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.len - self.buf.remaining()
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(WireError::BufferUnderflow {
                needed,
                have: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Read a size written by [`OutputStream::write_size`](crate::OutputStream::write_size)
    pub fn read_size(&mut self) -> Result<usize> {
        let first = self.get_u8()?;
        if first < SIZE_ESCAPE {
            return Ok(first as usize);
        }
        let size = self.get_i32()?;
        if size < 0 || size as usize > MAX_WIRE_ALLOCATION_SIZE {
            return Err(WireError::SizeOutOfRange { size: size as i64 });
        }
        Ok(size as usize)
    }

    /// Read an element count and check that `count` elements of at least
    /// `min_element` bytes each can still be present in the input.
    pub fn read_sequence_size(&mut self, min_element: usize) -> Result<usize> {
        let count = self.read_size()?;
        let needed = count.saturating_mul(min_element);
        if needed > self.remaining() {
            return Err(WireError::SizeOutOfRange { size: count as i64 });
        }
        Ok(count)
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    /// Read a size-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_sequence_size(1)?;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read any decodable value
    pub fn read<T: WireDecode>(&mut self) -> Result<T> {
        T::wire_decode(self)
    }

    fn handle_for(&mut self, index: i32) -> Handle {
        let graph = &mut self.graph;
        *self.instances.entry(index).or_insert_with(|| graph.reserve())
    }

    /// Read a reference to an instance.
    ///
    /// The returned handle may name an instance whose body arrives later in
    /// the payload; it only becomes usable once the stream is finished.
    pub fn read_instance(&mut self) -> Result<Option<Handle>> {
        let marker = self.get_i32()?;
        if marker == 0 {
            return Ok(None);
        }
        if marker > 0 {
            return Err(WireError::InvalidInstanceIndex(marker));
        }
        let index = marker
            .checked_neg()
            .ok_or(WireError::InvalidInstanceIndex(marker))?;
        let handle = self.handle_for(index);
        if self.instance_depth == 0 {
            self.roots.push(handle);
        }
        Ok(Some(handle))
    }

    /// Read a slice header and open the slice
    pub(crate) fn start_slice(&mut self) -> Result<SliceHeader> {
        let flags = self.get_u8()?;
        let type_id = if flags & FLAG_TYPE_ID_INDEX != 0 {
            let index = self.read_size()?;
            self.type_ids
                .get(index.wrapping_sub(1))
                .cloned()
                .ok_or(WireError::InvalidTypeIdIndex(index))?
        } else {
            let type_id = self.read_string()?;
            self.type_ids.push(type_id.clone());
            type_id
        };

        let start = self.position();
        let size = self.get_i32()?;
        if size < 4 || (size - 4) as usize > self.remaining() {
            return Err(WireError::SizeOutOfRange { size: size as i64 });
        }
        self.slices.push(OpenSlice {
            end: start + size as usize,
            type_id: type_id.clone(),
        });

        Ok(SliceHeader {
            type_id,
            last: flags & FLAG_LAST_SLICE != 0,
        })
    }

    /// Close the innermost slice, skipping whatever its reader left unread
    pub(crate) fn end_slice(&mut self) -> Result<()> {
        let Some(slice) = self.slices.pop() else {
            return Ok(());
        };
        let position = self.position();
        if position > slice.end {
            return Err(WireError::SliceOverrun {
                type_id: slice.type_id,
            });
        }
        let skip = slice.end - position;
        if skip > 0 {
            trace!("skipping {} bytes of slice `{}`", skip, slice.type_id);
            self.ensure(skip)?;
            self.buf.advance(skip);
        }
        Ok(())
    }

    fn read_instance_body(&mut self) -> Result<(Box<dyn Value>, Vec<String>)> {
        let registry = self.registry;
        let mut sliced = Vec::new();
        loop {
            let header = self.start_slice()?;
            if let Some(factory) = registry.value_factory(&header.type_id) {
                let mut value = factory();
                self.read_value_slices(value.as_mut(), header.last)?;
                if !sliced.is_empty() {
                    debug!(
                        "instance sliced to known base `{}`, discarded {:?}",
                        value.type_name(),
                        sliced
                    );
                }
                return Ok((value, sliced));
            }

            self.end_slice()?;
            let last = header.last;
            sliced.push(header.type_id);
            if last {
                debug!("no slice of instance known, using generic value for {:?}", sliced);
                return Ok((Box::new(UnknownValue), sliced));
            }
        }
    }

    fn read_value_slices(&mut self, value: &mut dyn Value, last: bool) -> Result<()> {
        value.read_fields(self)?;
        self.end_slice()?;

        match value.base_mut() {
            Some(base) => {
                if last {
                    return Err(WireError::UnexpectedSlice {
                        expected: base.type_name().to_string(),
                        found: String::new(),
                    });
                }
                let next = self.start_slice()?;
                if next.type_id != base.type_name() {
                    return Err(WireError::UnexpectedSlice {
                        expected: base.type_name().to_string(),
                        found: next.type_id,
                    });
                }
                self.read_value_slices(base, next.last)
            }
            None => self.skip_remaining_slices(last),
        }
    }

    /// Skip base slices the sender has below our most basic known level
    fn skip_remaining_slices(&mut self, mut last: bool) -> Result<()> {
        while !last {
            last = self.start_slice()?.last;
            self.end_slice()?;
        }
        Ok(())
    }

    /// Read a user exception, slicing it to its most-derived known type.
    ///
    /// Returns the exception and the type ids of the discarded slices.
    pub fn read_exception(&mut self) -> Result<(Box<dyn UserException>, Vec<String>)> {
        let registry = self.registry;
        let mut sliced: Vec<String> = Vec::new();
        loop {
            let header = self.start_slice()?;
            if let Some(factory) = registry.exception_factory(&header.type_id) {
                let mut exception = factory();
                self.read_exception_slices(exception.as_mut(), header.last)?;
                if !sliced.is_empty() {
                    debug!(
                        "exception sliced to known base `{}`, discarded {:?}",
                        exception.type_name(),
                        sliced
                    );
                }
                return Ok((exception, sliced));
            }

            self.end_slice()?;
            let last = header.last;
            sliced.push(header.type_id);
            if last {
                let type_id = sliced.swap_remove(0);
                return Err(WireError::UnknownUserException { type_id });
            }
        }
    }

    fn read_exception_slices(&mut self, exception: &mut dyn UserException, last: bool) -> Result<()> {
        exception.read_fields(self)?;
        self.end_slice()?;

        match exception.base_mut() {
            Some(base) => {
                if last {
                    return Err(WireError::UnexpectedSlice {
                        expected: base.type_name().to_string(),
                        found: String::new(),
                    });
                }
                let next = self.start_slice()?;
                if next.type_id != base.type_name() {
                    return Err(WireError::UnexpectedSlice {
                        expected: base.type_name().to_string(),
                        found: next.type_id,
                    });
                }
                self.read_exception_slices(base, next.last)
            }
            None => self.skip_remaining_slices(last),
        }
    }

    /// Read the pending-instance section
    pub fn read_pending_instances(&mut self) -> Result<()> {
        loop {
            let count = self.read_sequence_size(MIN_INSTANCE_ENTRY)?;
            if count == 0 {
                return Ok(());
            }
            for _ in 0..count {
                let index = self.get_i32()?;
                if index <= 0 {
                    return Err(WireError::InvalidInstanceIndex(index));
                }
                let handle = self.handle_for(index);
                if !self.graph.is_vacant(handle) {
                    return Err(WireError::DuplicateInstance(index));
                }

                self.instance_depth += 1;
                let body = self.read_instance_body();
                self.instance_depth -= 1;

                let (value, sliced) = body?;
                trace!("read instance {} of type `{}`", index, value.type_name());
                self.graph.fill(handle, value, sliced);
            }
        }
    }

    /// Read the pending-instance section and hand back the decoded graph.
    ///
    /// Fails if any referenced instance never arrived or input is left over.
    /// Instances not reachable from a reference read outside of instance
    /// bodies are dropped, then every survivor gets its post-unmarshal hook.
    pub fn finish(mut self) -> Result<Graph> {
        self.read_pending_instances()?;

        let unresolved = self
            .instances
            .iter()
            .filter(|(_, handle)| self.graph.is_vacant(**handle))
            .map(|(index, _)| *index)
            .min();
        if let Some(index) = unresolved {
            return Err(WireError::UnresolvedInstance(index));
        }

        if self.remaining() > 0 {
            return Err(WireError::TrailingBytes(self.remaining()));
        }

        let dropped = self.graph.retain_reachable(&self.roots);
        if dropped > 0 {
            debug!("dropped {} instances unreachable from payload roots", dropped);
        }
        self.graph.run_post_unmarshal();
        Ok(self.graph)
    }
}
