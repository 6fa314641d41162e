//! User exceptions
//!
//! User exceptions marshal like classes, as a stack of slices most-derived
//! first, but travel by value: they have no instance index and cannot be
//! shared. Their fields may still reference class instances, which are
//! carried in the pending-instance section after the exception.

use std::any::Any;
use std::fmt;

use crate::graph::{Graph, StaticTypeId};
use crate::{InputStream, OutputStream, Result, WireError};

/// A user exception that can be marshaled as a stack of slices
pub trait UserException: Any + Send + Sync + fmt::Debug {
    /// Type id of this exception level
    fn type_name(&self) -> &'static str;

    /// Embedded base exception level, if any
    fn base(&self) -> Option<&dyn UserException> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut dyn UserException> {
        None
    }

    /// Write the fields owned by this level
    fn write_fields(&self, out: &mut OutputStream<'_>) -> Result<()>;

    /// Read the fields owned by this level
    fn read_fields(&mut self, input: &mut InputStream<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Narrow an exception to `T`, walking down its base chain
pub fn narrow_exception<T: UserException>(exception: &dyn UserException) -> Option<&T> {
    let mut level = Some(exception);
    while let Some(current) = level {
        if let Some(found) = current.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        level = current.base();
    }
    None
}

/// A decoded user exception together with the instances its fields reference
#[derive(Debug)]
pub struct RaisedException {
    exception: Box<dyn UserException>,
    graph: Graph,
    sliced: Vec<String>,
}

impl RaisedException {
    pub(crate) fn new(exception: Box<dyn UserException>, graph: Graph, sliced: Vec<String>) -> Self {
        Self {
            exception,
            graph,
            sliced,
        }
    }

    /// Most-derived type id known locally
    pub fn type_name(&self) -> &'static str {
        self.exception.type_name()
    }

    pub fn exception(&self) -> &dyn UserException {
        self.exception.as_ref()
    }

    /// Whether the exception is, or derives from, `T`
    pub fn is<T: UserException>(&self) -> bool {
        narrow_exception::<T>(self.exception.as_ref()).is_some()
    }

    /// Narrow the exception to `T`
    pub fn downcast_ref<T: UserException + StaticTypeId>(&self) -> Result<&T> {
        narrow_exception::<T>(self.exception.as_ref()).ok_or_else(|| WireError::TypeMismatch {
            expected: T::TYPE_ID.to_string(),
            actual: self.type_name().to_string(),
        })
    }

    /// Instances referenced by the exception's fields
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Type ids of the derived slices that were not known locally
    pub fn sliced_type_ids(&self) -> &[String] {
        &self.sliced
    }

    pub fn into_parts(self) -> (Box<dyn UserException>, Graph) {
        (self.exception, self.graph)
    }
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user exception {}", self.type_name())
    }
}
