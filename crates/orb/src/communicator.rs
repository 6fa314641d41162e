//! Communicator runtime
//!
//! The [`Communicator`] owns everything that is shared between proxies: the
//! locator and router registries, the transport, and the type registry used
//! to decode payloads. Independent communicators share nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use orb_wire::{Graph, Handle, RaisedException, TypeRegistry};
use tracing::{debug, warn};

use crate::config::CommunicatorConfig;
use crate::locator::{LocatorInfo, LocatorRegistry, Resolved};
use crate::router::{RouterInfo, RouterRegistry};
use crate::transport::{ServiceBinder, Transport};
use crate::types::{OrbError, Proxy, Result};

/// Client-side runtime resolving proxies and carrying their payloads
pub struct Communicator {
    config: CommunicatorConfig,
    transport: Arc<dyn Transport>,
    types: Arc<TypeRegistry>,
    locators: LocatorRegistry,
    routers: RouterRegistry,
    destroyed: AtomicBool,
}

impl Communicator {
    pub fn new(
        config: CommunicatorConfig,
        transport: Arc<dyn Transport>,
        binder: Arc<dyn ServiceBinder>,
        types: TypeRegistry,
    ) -> Self {
        let locators = LocatorRegistry::new(Arc::clone(&binder), config.lookup_policy());
        let routers = RouterRegistry::new(binder, config.locator_timeout);
        Self {
            config,
            transport,
            types: Arc::new(types),
            locators,
            routers,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.config
    }

    /// Types known to this communicator when decoding
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn check_destroyed(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(OrbError::Destroyed);
        }
        Ok(())
    }

    /// Parse a stringified proxy and attach the default locator and router
    pub fn string_to_proxy(&self, s: &str) -> Result<Proxy> {
        self.check_destroyed()?;
        let proxy: Proxy = s.parse()?;
        Ok(proxy
            .with_locator(self.config.default_locator.clone())
            .with_router(self.config.default_router.clone()))
    }

    /// Resolver for the locator embedded in `proxy`, if any
    pub fn locator_info(&self, proxy: &Proxy) -> Result<Option<Arc<LocatorInfo>>> {
        self.check_destroyed()?;
        self.locators.get(proxy.locator())
    }

    /// Resolver for the router embedded in `proxy`, if any
    pub fn router_info(&self, proxy: &Proxy) -> Result<Option<Arc<RouterInfo>>> {
        self.check_destroyed()?;
        self.routers.get(proxy.router())
    }

    /// Endpoints an invocation on `proxy` should connect to
    pub async fn resolve_endpoints(&self, proxy: &Proxy) -> Result<Resolved> {
        self.check_destroyed()?;

        let resolved = if let Some(router) = self.router_info(proxy)? {
            let mut resolved = Resolved {
                endpoints: router.get_client_endpoints().await?,
                cached: false,
            };
            if resolved.endpoints.is_empty() {
                // an indirect router without a client proxy is found through its locator
                if let Some(locator) = self.locator_info(router.proxy())? {
                    resolved = locator.get_endpoints(router.proxy()).await?;
                }
            }
            router.add_proxy(proxy).await?;
            resolved
        } else if !proxy.endpoints().is_empty() {
            Resolved {
                endpoints: proxy.endpoints().clone(),
                cached: false,
            }
        } else {
            match self.locator_info(proxy)? {
                Some(locator) => locator.get_endpoints(proxy).await?,
                None => return Err(OrbError::NoEndpoint(proxy.to_string())),
            }
        };

        let endpoints = proxy.filter_endpoints(&resolved.endpoints, self.config.shuffle_endpoints);
        if endpoints.is_empty() {
            return Err(OrbError::NoEndpoint(proxy.to_string()));
        }
        Ok(Resolved {
            endpoints,
            cached: resolved.cached,
        })
    }

    /// Deliver `payload` to the object behind `proxy` and return the reply
    pub async fn send(&self, proxy: &Proxy, payload: Bytes) -> Result<Bytes> {
        self.check_destroyed()?;
        match self.config.invocation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.invoke(proxy, payload))
                .await
                .map_err(|_| OrbError::Timeout)?,
            None => self.invoke(proxy, payload).await,
        }
    }

    async fn invoke(&self, proxy: &Proxy, payload: Bytes) -> Result<Bytes> {
        let mut retried = false;
        loop {
            let resolved = self.resolve_endpoints(proxy).await?;
            let err = match self.transport.send(&resolved.endpoints, payload.clone()).await {
                Err(err) if err.is_connection_failure() => err,
                result => return result,
            };

            self.clear_resolution(proxy)?;
            if resolved.cached && self.config.retry_cached_endpoints && !retried {
                debug!(
                    "cached endpoints of `{}` failed ({}), retrying with fresh endpoints",
                    proxy, err
                );
                retried = true;
                continue;
            }
            warn!("invocation on `{}` failed: {}", proxy, err);
            return Err(err);
        }
    }

    /// Invalidate the locator entry behind an indirect proxy, or behind the
    /// router of a routed one
    fn clear_resolution(&self, proxy: &Proxy) -> Result<()> {
        let target = match self.router_info(proxy)? {
            Some(router) => router.proxy().clone(),
            None => proxy.clone(),
        };
        if !target.is_indirect() {
            return Ok(());
        }
        if let Some(locator) = self.locator_info(&target)? {
            locator.clear_cache(&target);
        }
        Ok(())
    }

    /// Decode a reply carrying one instance of `expected_type`
    pub fn decode_value(&self, bytes: Bytes, expected_type: &str) -> Result<(Graph, Option<Handle>)> {
        self.check_destroyed()?;
        Ok(orb_wire::decode_value(bytes, &self.types, expected_type)?)
    }

    /// Decode a reply carrying `count` instance references
    pub fn decode_values(&self, bytes: Bytes, count: usize) -> Result<(Graph, Vec<Option<Handle>>)> {
        self.check_destroyed()?;
        Ok(orb_wire::decode_values(bytes, &self.types, count)?)
    }

    /// Decode a user exception reply
    pub fn decode_exception(&self, bytes: Bytes) -> Result<RaisedException> {
        self.check_destroyed()?;
        Ok(orb_wire::decode_exception(bytes, &self.types)?)
    }

    /// Tear down both registries; every later call fails with `Destroyed`
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("destroying communicator");
        self.routers.destroy();
        self.locators.destroy();
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.destroy();
    }
}
