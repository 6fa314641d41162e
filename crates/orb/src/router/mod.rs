//! Routed proxies
//!
//! Proxies carrying a router reference are reached through the router's
//! client endpoints instead of their own.

mod info;
mod registry;
mod service;

pub use info::*;
pub use registry::*;
pub use service::*;
