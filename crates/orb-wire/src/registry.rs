//! Type registry
//!
//! Maps type ids to factories for the classes and user exceptions a process
//! knows about. Decoding consults the registry slice by slice: the first
//! registered type id in a slice stack decides what gets instantiated.
//!
//! A registry is filled once during setup and then shared read-only, usually
//! behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::exception::UserException;
use crate::graph::{StaticTypeId, UnknownValue, Value};

/// Creates a default instance of a class
pub type ValueFactory = Arc<dyn Fn() -> Box<dyn Value> + Send + Sync>;

/// Creates a default instance of a user exception
pub type ExceptionFactory = Arc<dyn Fn() -> Box<dyn UserException> + Send + Sync>;

/// Registry of locally known classes and user exceptions
#[derive(Clone)]
pub struct TypeRegistry {
    values: HashMap<String, ValueFactory>,
    exceptions: HashMap<String, ExceptionFactory>,
}

impl TypeRegistry {
    /// Create a registry that knows only the root class
    pub fn new() -> Self {
        let mut registry = Self {
            values: HashMap::new(),
            exceptions: HashMap::new(),
        };
        registry.register_value::<UnknownValue>();
        registry
    }

    /// Register a class by its static type id
    pub fn register_value<T: Value + StaticTypeId + Default>(&mut self) -> &mut Self {
        self.register_value_factory(T::TYPE_ID, || Box::new(T::default()) as Box<dyn Value>)
    }

    /// Register a class with a custom factory
    pub fn register_value_factory<F>(&mut self, type_id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Value> + Send + Sync + 'static,
    {
        self.values.insert(type_id.into(), Arc::new(factory));
        self
    }

    /// Register a user exception by its static type id
    pub fn register_exception<T: UserException + StaticTypeId + Default>(&mut self) -> &mut Self {
        let factory: ExceptionFactory = Arc::new(|| Box::new(T::default()) as Box<dyn UserException>);
        self.exceptions.insert(T::TYPE_ID.to_string(), factory);
        self
    }

    /// Builder form of [`TypeRegistry::register_value`]
    pub fn with_value<T: Value + StaticTypeId + Default>(mut self) -> Self {
        self.register_value::<T>();
        self
    }

    /// Builder form of [`TypeRegistry::register_exception`]
    pub fn with_exception<T: UserException + StaticTypeId + Default>(mut self) -> Self {
        self.register_exception::<T>();
        self
    }

    pub fn value_factory(&self, type_id: &str) -> Option<&ValueFactory> {
        self.values.get(type_id)
    }

    pub fn exception_factory(&self, type_id: &str) -> Option<&ExceptionFactory> {
        self.exceptions.get(type_id)
    }

    pub fn knows_value(&self, type_id: &str) -> bool {
        self.values.contains_key(type_id)
    }

    pub fn knows_exception(&self, type_id: &str) -> bool {
        self.exceptions.contains_key(type_id)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut values: Vec<_> = self.values.keys().collect();
        let mut exceptions: Vec<_> = self.exceptions.keys().collect();
        values.sort();
        exceptions.sort();
        f.debug_struct("TypeRegistry")
            .field("values", &values)
            .field("exceptions", &exceptions)
            .finish()
    }
}
