//! Object request broker core
//!
//! This crate resolves location-transparent proxies to concrete endpoints
//! and carries their payloads through a pluggable transport. Payload
//! encoding lives in the `orb-wire` crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Communicator (this crate)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Locator Registry      │  Router Registry   │  Type Registry │
//! │  - one LocatorInfo     │  - one RouterInfo  │  (orb-wire)    │
//! │    per locator         │    per router      │                │
//! │  - shared LocatorTable │  - client/server   │                │
//! │  - coalesced lookups   │    overrides       │                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport / Locator / Router services (caller supplied)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Direct proxy**: carries its endpoints
//! - **Indirect proxy**: names an adapter id, resolved through a locator
//! - **Well-known proxy**: names only an identity, resolved through a locator
//! - **Routed proxy**: reached through a router's client endpoints
//!
//! Cached endpoints are only invalidated when a connection to them fails;
//! the failed invocation is then retried once with fresh endpoints.
//!
//! # Modules
//!
//! - [`types`]: identities, endpoints, proxies and errors
//! - [`locator`]: locator table, resolver and registry
//! - [`router`]: router resolver and registry
//! - [`config`]: communicator configuration

pub mod config;
pub mod locator;
pub mod router;
pub mod transport;
pub mod types;

mod communicator;

pub use communicator::Communicator;
pub use config::CommunicatorConfig;
pub use locator::{Locator, LocatorInfo, LocatorRegistry, LocatorTable, LookupPolicy, Resolved};
pub use router::{Router, RouterInfo, RouterRegistry};
pub use transport::{ServiceBinder, Transport};
pub use types::{Endpoint, EndpointSet, Identity, InvocationMode, OrbError, Protocol, Proxy, Result};
