//! Router resolver

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::Router;
use crate::types::{EndpointSet, Identity, OrbError, Proxy, Result};

#[derive(Default)]
struct RouterState {
    client_endpoints: Option<EndpointSet>,
    server_proxy: Option<Proxy>,
    /// Identities already registered with the router
    added: HashSet<Identity>,
    destroyed: bool,
}

/// Endpoint and adapter overrides for proxies routed through one router
pub struct RouterInfo {
    proxy: Proxy,
    router: Arc<dyn Router>,
    timeout: Duration,
    state: Mutex<RouterState>,
}

impl RouterInfo {
    /// Create a resolver for `proxy`, which must already be de-routed
    pub fn new(proxy: Proxy, router: Arc<dyn Router>, timeout: Duration) -> Self {
        Self {
            proxy,
            router,
            timeout,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// The router proxy this resolver talks to
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        if self.is_destroyed() {
            return Err(OrbError::Destroyed);
        }
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(OrbError::RouterUnavailable(err.to_string())),
            Err(_) => Err(OrbError::Timeout),
        }
    }

    /// Endpoints clients must use for routed proxies.
    ///
    /// Falls back to the router's own endpoints when it has no client proxy.
    pub async fn get_client_endpoints(&self) -> Result<EndpointSet> {
        {
            let state = self.state.lock();
            if state.destroyed {
                return Err(OrbError::Destroyed);
            }
            if let Some(endpoints) = &state.client_endpoints {
                trace!("using cached client endpoints of router `{}`", self.proxy.identity());
                return Ok(endpoints.clone());
            }
        }

        let client = self.call(self.router.get_client_proxy()).await?;
        let endpoints = match client {
            Some(client) if !client.endpoints().is_empty() => client.endpoints().clone(),
            _ => {
                debug!(
                    "router `{}` has no client endpoints, using its own",
                    self.proxy.identity()
                );
                self.proxy.endpoints().clone()
            }
        };

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(OrbError::Destroyed);
        }
        Ok(state.client_endpoints.get_or_insert(endpoints).clone())
    }

    async fn server_proxy(&self) -> Result<Proxy> {
        {
            let state = self.state.lock();
            if state.destroyed {
                return Err(OrbError::Destroyed);
            }
            if let Some(proxy) = &state.server_proxy {
                return Ok(proxy.clone());
            }
        }

        let server = self.call(self.router.get_server_proxy()).await?.ok_or_else(|| {
            OrbError::RouterUnavailable(format!(
                "router `{}` has no server proxy",
                self.proxy.identity()
            ))
        })?;
        // the server proxy must not be routed again
        let server = server.with_router(None);

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(OrbError::Destroyed);
        }
        Ok(state.server_proxy.get_or_insert(server).clone())
    }

    /// Endpoints servers behind the router are reachable on
    pub async fn get_server_endpoints(&self) -> Result<EndpointSet> {
        Ok(self.server_proxy().await?.endpoints().clone())
    }

    /// Adapter id to use for `proxy`: its own, else the router's server adapter
    pub async fn get_adapter_id(&self, proxy: &Proxy) -> Result<String> {
        if !proxy.adapter_id().is_empty() {
            return Ok(proxy.adapter_id().to_string());
        }
        Ok(self.server_proxy().await?.adapter_id().to_string())
    }

    /// Register `proxy` with the router once per identity
    pub async fn add_proxy(&self, proxy: &Proxy) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(OrbError::Destroyed);
            }
            if !state.added.insert(proxy.identity().clone()) {
                return Ok(());
            }
        }

        debug!(
            "adding `{}` to router `{}`",
            proxy.identity(),
            self.proxy.identity()
        );
        match self.call(self.router.add_proxies(vec![proxy.clone()])).await {
            Ok(evicted) => {
                let mut state = self.state.lock();
                for proxy in evicted {
                    debug!("router evicted `{}`", proxy.identity());
                    state.added.remove(proxy.identity());
                }
                Ok(())
            }
            Err(err) => {
                self.state.lock().added.remove(proxy.identity());
                Err(err)
            }
        }
    }

    /// Whether `identity` is currently registered with the router
    pub fn is_added(&self, identity: &Identity) -> bool {
        self.state.lock().added.contains(identity)
    }

    /// Drop cached overrides and refuse further requests
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        state.client_endpoints = None;
        state.server_proxy = None;
        state.added.clear();
    }
}

impl std::fmt::Debug for RouterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterInfo")
            .field("router", self.proxy.identity())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
