//! Indirect proxy resolution through a locator service
//!
//! - [`LocatorTable`]: cache of adapter endpoints and well-known objects
//! - [`LocatorInfo`]: resolver for one locator, with request coalescing
//! - [`LocatorRegistry`]: one resolver per locator identity

mod info;
mod registry;
mod service;
mod table;

pub use info::*;
pub use registry::*;
pub use service::*;
pub use table::*;
