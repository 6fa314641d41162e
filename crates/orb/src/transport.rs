//! Seams to the layers this crate does not implement
//!
//! The connection layer is reached through [`Transport`]; the remote locator
//! and router services are reached through objects produced by a
//! [`ServiceBinder`] for a given service proxy.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::locator::Locator;
use crate::router::Router;
use crate::types::{EndpointSet, Proxy, Result};

/// Delivers a request payload to one of a set of endpoints
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` and wait for the reply.
    ///
    /// A failure to reach any of the endpoints must be reported as
    /// [`OrbError::Connect`](crate::OrbError::Connect) so stale cached
    /// endpoints can be invalidated.
    async fn send(&self, endpoints: &EndpointSet, payload: Bytes) -> Result<Bytes>;
}

/// Creates clients for remote locator and router services
pub trait ServiceBinder: Send + Sync {
    fn bind_locator(&self, proxy: &Proxy) -> Arc<dyn Locator>;

    fn bind_router(&self, proxy: &Proxy) -> Arc<dyn Router>;
}
