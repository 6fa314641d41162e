//! Sequences, dictionaries and instance references
//!
//! Sequences and dictionaries are a size followed by their elements.
//! Dictionary entries are written in key order for `BTreeMap` and in
//! iteration order for `HashMap`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::graph::Handle;
use crate::{InputStream, OutputStream, Result, WireDecode, WireEncode};

impl<T: WireEncode> WireEncode for Vec<T> {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_size(self.len())?;
        for item in self {
            item.wire_encode(out)?;
        }
        Ok(())
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
        let count = input.read_sequence_size(T::wire_min_size())?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::wire_decode(input)?);
        }
        Ok(items)
    }
}

impl<K: WireEncode, V: WireEncode> WireEncode for BTreeMap<K, V> {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_size(self.len())?;
        for (key, value) in self {
            key.wire_encode(out)?;
            value.wire_encode(out)?;
        }
        Ok(())
    }
}

impl<K: WireDecode + Ord, V: WireDecode> WireDecode for BTreeMap<K, V> {
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
        let count = input.read_sequence_size(K::wire_min_size() + V::wire_min_size())?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::wire_decode(input)?;
            let value = V::wire_decode(input)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<K: WireEncode, V: WireEncode> WireEncode for HashMap<K, V> {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_size(self.len())?;
        for (key, value) in self {
            key.wire_encode(out)?;
            value.wire_encode(out)?;
        }
        Ok(())
    }
}

impl<K: WireDecode + Eq + Hash, V: WireDecode> WireDecode for HashMap<K, V> {
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
        let count = input.read_sequence_size(K::wire_min_size() + V::wire_min_size())?;
        let mut map = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = K::wire_decode(input)?;
            let value = V::wire_decode(input)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl WireEncode for Option<Handle> {
    fn wire_encode(&self, out: &mut OutputStream<'_>) -> Result<()> {
        out.write_instance(*self)
    }

    fn wire_min_size() -> usize {
        4
    }
}

impl WireDecode for Option<Handle> {
    fn wire_decode(input: &mut InputStream<'_>) -> Result<Self> {
        input.read_instance()
    }

    fn wire_min_size() -> usize {
        4
    }
}
