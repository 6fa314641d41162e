//! Class instances and the per-payload instance arena
//!
//! Instances sent in one payload form an arbitrary graph: several fields may
//! point at the same instance and an instance may point back at itself. Rather
//! than owning pointers, every instance lives in a [`Graph`] slot and fields
//! refer to it through a copyable [`Handle`]. Two fields that name the same
//! handle name the same instance, so reference identity survives a round trip
//! exactly.
//!
//! A class hierarchy is expressed by composition: a derived class embeds its
//! base and exposes it through [`Value::base`]. Each level contributes one
//! slice on the wire, most-derived first.

use std::any::Any;
use std::fmt;

use crate::{InputStream, OutputStream, Result, WireError};

/// Type id reported by an instance whose slices are all unknown locally
pub const ROOT_TYPE_ID: &str = "::Object";

/// Reference to an instance stored in a [`Graph`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u32);

impl Handle {
    /// Slot index inside the owning graph
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Compile-time type id of a class or exception
pub trait StaticTypeId {
    const TYPE_ID: &'static str;
}

/// A class instance that can be marshaled as a stack of slices
pub trait Value: Any + Send + Sync + fmt::Debug {
    /// Type id of this class level
    fn type_name(&self) -> &'static str;

    /// Embedded base class level, if any
    fn base(&self) -> Option<&dyn Value> {
        None
    }

    /// Mutable access to the embedded base class level
    fn base_mut(&mut self) -> Option<&mut dyn Value> {
        None
    }

    /// Write the fields owned by this level (not the base's)
    fn write_fields(&self, out: &mut OutputStream<'_>) -> Result<()>;

    /// Read the fields owned by this level (not the base's)
    fn read_fields(&mut self, input: &mut InputStream<'_>) -> Result<()>;

    /// Report every instance handle held by this level's fields.
    ///
    /// The graph walks the base chain itself.
    fn visit_handles(&self, visit: &mut dyn FnMut(Handle)) {
        let _ = visit;
    }

    /// Called before the instance's slices are written.
    fn pre_marshal(&self) -> Result<()> {
        Ok(())
    }

    /// Called once the whole payload has been decoded and every reference
    /// in the graph is resolved.
    fn post_unmarshal(&mut self) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Generic instance produced when no slice of the received type is known
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnknownValue;

impl StaticTypeId for UnknownValue {
    const TYPE_ID: &'static str = ROOT_TYPE_ID;
}

impl Value for UnknownValue {
    fn type_name(&self) -> &'static str {
        ROOT_TYPE_ID
    }

    fn write_fields(&self, _out: &mut OutputStream<'_>) -> Result<()> {
        Ok(())
    }

    fn read_fields(&mut self, _input: &mut InputStream<'_>) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Narrow an instance to `T`, walking down its base chain.
///
/// Returns `None` when neither the instance nor any of its bases is a `T`,
/// which is always the case for a type that was sliced away on decode.
pub fn narrow<T: Value>(value: &dyn Value) -> Option<&T> {
    let mut level = Some(value);
    while let Some(current) = level {
        if let Some(found) = current.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        level = current.base();
    }
    None
}

/// Mutable counterpart of [`narrow`]
pub fn narrow_mut<T: Value>(value: &mut dyn Value) -> Option<&mut T> {
    if value.as_any().is::<T>() {
        return value.as_any_mut().downcast_mut::<T>();
    }
    value.base_mut().and_then(narrow_mut::<T>)
}

/// Whether `value` is, or derives from, the class named `type_id`
pub fn is_a(value: &dyn Value, type_id: &str) -> bool {
    if type_id == ROOT_TYPE_ID {
        return true;
    }
    type_chain(value).into_iter().any(|id| id == type_id)
}

/// Type ids of every level of `value`, most-derived first
pub fn type_chain(value: &dyn Value) -> Vec<&'static str> {
    let mut ids = Vec::new();
    let mut level = Some(value);
    while let Some(current) = level {
        ids.push(current.type_name());
        level = current.base();
    }
    ids
}

fn visit_chain(value: &dyn Value, visit: &mut dyn FnMut(Handle)) {
    let mut level = Some(value);
    while let Some(current) = level {
        current.visit_handles(visit);
        level = current.base();
    }
}

struct Node {
    value: Box<dyn Value>,
    sliced: Vec<String>,
}

enum Slot {
    /// Reserved by a reference whose body has not been read yet
    Vacant,
    Live(Node),
    /// Decoded but unreachable from the payload roots
    Dropped,
}

/// Arena of class instances addressed by [`Handle`]
#[derive(Default)]
pub struct Graph {
    slots: Vec<Slot>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance and return its handle
    pub fn insert<T: Value>(&mut self, value: T) -> Handle {
        self.insert_boxed(Box::new(value))
    }

    /// Add an already boxed instance
    pub fn insert_boxed(&mut self, value: Box<dyn Value>) -> Handle {
        let handle = Handle(self.slots.len() as u32);
        self.slots.push(Slot::Live(Node {
            value,
            sliced: Vec::new(),
        }));
        handle
    }

    pub(crate) fn reserve(&mut self) -> Handle {
        let handle = Handle(self.slots.len() as u32);
        self.slots.push(Slot::Vacant);
        handle
    }

    pub(crate) fn is_vacant(&self, handle: Handle) -> bool {
        matches!(self.slots.get(handle.0 as usize), Some(Slot::Vacant))
    }

    pub(crate) fn fill(&mut self, handle: Handle, value: Box<dyn Value>, sliced: Vec<String>) {
        if let Some(slot) = self.slots.get_mut(handle.0 as usize) {
            *slot = Slot::Live(Node { value, sliced });
        }
    }

    fn node(&self, handle: Handle) -> Result<&Node> {
        match self.slots.get(handle.0 as usize) {
            Some(Slot::Live(node)) => Ok(node),
            _ => Err(WireError::InvalidHandle(handle.0)),
        }
    }

    /// Whether `handle` names a live instance
    pub fn contains(&self, handle: Handle) -> bool {
        self.node(handle).is_ok()
    }

    /// Get an instance
    pub fn get(&self, handle: Handle) -> Result<&dyn Value> {
        self.node(handle).map(|node| node.value.as_ref())
    }

    /// Get a mutable instance
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut dyn Value> {
        match self.slots.get_mut(handle.0 as usize) {
            Some(Slot::Live(node)) => Ok(node.value.as_mut()),
            _ => Err(WireError::InvalidHandle(handle.0)),
        }
    }

    /// Get an instance narrowed to `T`.
    ///
    /// Fails with [`WireError::TypeMismatch`] if the instance is not a `T`,
    /// including when its `T` level was sliced away during decoding.
    pub fn get_as<T: Value + StaticTypeId>(&self, handle: Handle) -> Result<&T> {
        let value = self.get(handle)?;
        narrow::<T>(value).ok_or_else(|| WireError::TypeMismatch {
            expected: T::TYPE_ID.to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Mutable counterpart of [`Graph::get_as`]
    pub fn get_mut_as<T: Value + StaticTypeId>(&mut self, handle: Handle) -> Result<&mut T> {
        let actual = self.get(handle)?.type_name();
        narrow_mut::<T>(self.get_mut(handle)?).ok_or_else(|| WireError::TypeMismatch {
            expected: T::TYPE_ID.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Most-derived type id known for an instance
    pub fn type_id_of(&self, handle: Handle) -> Result<&'static str> {
        Ok(self.get(handle)?.type_name())
    }

    /// Type ids of the slices discarded when this instance was decoded
    pub fn sliced_type_ids(&self, handle: Handle) -> Result<&[String]> {
        Ok(&self.node(handle)?.sliced)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of every live instance, in slot order
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(index, _)| Handle(index as u32))
    }

    /// Drop every live instance not reachable from `roots`.
    ///
    /// Handles stay stable; dropped slots simply stop resolving.
    pub(crate) fn retain_reachable(&mut self, roots: &[Handle]) -> usize {
        let mut reached = vec![false; self.slots.len()];
        let mut stack: Vec<Handle> = roots.to_vec();

        while let Some(handle) = stack.pop() {
            let index = handle.0 as usize;
            if index >= reached.len() || reached[index] {
                continue;
            }
            reached[index] = true;
            if let Slot::Live(node) = &self.slots[index] {
                visit_chain(node.value.as_ref(), &mut |next| stack.push(next));
            }
        }

        let mut dropped = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Live(_)) && !reached[index] {
                *slot = Slot::Dropped;
                dropped += 1;
            }
        }
        dropped
    }

    pub(crate) fn run_post_unmarshal(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Live(node) = slot {
                node.value.post_unmarshal();
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Live(node) => list.entry(&index, &node.value),
                Slot::Vacant => list.entry(&index, &"<vacant>"),
                Slot::Dropped => list.entry(&index, &"<dropped>"),
            };
        }
        list.finish()
    }
}
