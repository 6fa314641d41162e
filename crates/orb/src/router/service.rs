//! Remote router service interface

use async_trait::async_trait;

use crate::types::{Proxy, Result};

/// Client view of a remote router (for example a firewall gateway)
#[async_trait]
pub trait Router: Send + Sync {
    /// Proxy whose endpoints clients use to reach routed objects
    async fn get_client_proxy(&self) -> Result<Option<Proxy>>;

    /// Proxy whose endpoints servers behind the router are reached on
    async fn get_server_proxy(&self) -> Result<Option<Proxy>>;

    /// Register proxies with the router.
    ///
    /// Returns the proxies the router evicted to make room, if any.
    async fn add_proxies(&self, proxies: Vec<Proxy>) -> Result<Vec<Proxy>>;
}
