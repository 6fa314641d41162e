//! Core object layer types
//!
//! - Identities: names of remote objects
//! - Endpoints: concrete transport addresses
//! - Proxies: location-transparent references
//! - Errors

mod endpoint;
mod error;
mod identity;
mod proxy;

pub use endpoint::{Endpoint, EndpointSet, Protocol};
pub use error::{OrbError, Result};
pub use identity::Identity;
pub use proxy::{InvocationMode, Proxy};
