//! Remote locator service interface

use async_trait::async_trait;

use crate::types::{EndpointSet, Identity, Proxy, Result};

/// Client view of a remote locator service
#[async_trait]
pub trait Locator: Send + Sync {
    /// Endpoints of an object adapter, `None` if the adapter is not registered
    async fn find_adapter_by_id(&self, adapter_id: &str) -> Result<Option<EndpointSet>>;

    /// Proxy for a well-known object, `None` if the object is not registered
    async fn find_object_by_id(&self, identity: &Identity) -> Result<Option<Proxy>>;
}
