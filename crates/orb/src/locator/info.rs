//! Locator resolver
//!
//! A [`LocatorInfo`] wraps one remote locator and resolves adapter ids and
//! well-known identities to endpoints, consulting its [`LocatorTable`]
//! first. Concurrent misses for the same key share a single remote lookup.
//!
//! Lock order is pending-lookup map, then table. No lock is held across an
//! `.await`. A lookup task is spawned only after its shared handle is in the
//! pending map and the map lock is released, so the task never waits on a
//! caller to remove its own entry.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::table::{CachedLookup, LocatorTable};
use super::Locator;
use crate::types::{EndpointSet, Identity, OrbError, Proxy, Result};

type SharedLookup<T> = Shared<BoxFuture<'static, Result<Option<T>>>>;
type Lookup<T> = BoxFuture<'static, Result<Option<T>>>;

/// Default bound for a single remote lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Limits applied to remote lookups and negative results
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupPolicy {
    /// Bound for a single remote lookup
    pub timeout: Duration,
    /// How long "not registered" answers are cached; zero disables it
    pub negative_ttl: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            negative_ttl: Duration::ZERO,
        }
    }
}

/// Endpoints produced by resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub endpoints: EndpointSet,
    /// Whether any part of the answer came from the cache
    pub cached: bool,
}

struct Inner {
    proxy: Proxy,
    locator: Arc<dyn Locator>,
    table: Arc<LocatorTable>,
    policy: LookupPolicy,
    adapter_lookups: Mutex<HashMap<String, SharedLookup<EndpointSet>>>,
    object_lookups: Mutex<HashMap<Identity, SharedLookup<Proxy>>>,
    destroyed: AtomicBool,
}

/// Resolver bound to one remote locator
pub struct LocatorInfo {
    inner: Arc<Inner>,
}

/// Run a remote call under the lookup timeout
async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(OrbError::LocatorUnavailable(err.to_string())),
        Err(_) => Err(OrbError::Timeout),
    }
}

/// Split `lookup` into a handle any number of waiters can await and the task
/// that drives it. The task runs to completion even if every waiter goes away.
fn share<T>(lookup: Lookup<T>) -> (SharedLookup<T>, BoxFuture<'static, ()>)
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = oneshot::channel();
    let waiter = async move {
        rx.await.unwrap_or_else(|_| {
            Err(OrbError::LocatorUnavailable(
                "lookup ended without a result".to_string(),
            ))
        })
    }
    .boxed()
    .shared();
    let task = async move {
        // nobody left to tell
        let _ = tx.send(lookup.await);
    }
    .boxed();
    (waiter, task)
}

/// Join the pending lookup for `key`, or register one built by `start`.
///
/// A newly registered lookup comes back with the task to spawn once the
/// pending map is unlocked.
fn join_or_start<K, T>(
    pending: &mut HashMap<K, SharedLookup<T>>,
    key: &K,
    start: impl FnOnce() -> Lookup<T>,
) -> (SharedLookup<T>, Option<BoxFuture<'static, ()>>)
where
    K: Clone + Eq + Hash,
    T: Clone + Send + Sync + 'static,
{
    if let Some(lookup) = pending.get(key) {
        return (lookup.clone(), None);
    }
    let (lookup, task) = share(start());
    pending.insert(key.clone(), lookup.clone());
    (lookup, Some(task))
}

impl LocatorInfo {
    /// Create a resolver for `proxy`, which must already be normalized
    pub fn new(
        proxy: Proxy,
        locator: Arc<dyn Locator>,
        table: Arc<LocatorTable>,
        policy: LookupPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                proxy,
                locator,
                table,
                policy,
                adapter_lookups: Mutex::new(HashMap::new()),
                object_lookups: Mutex::new(HashMap::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The locator proxy this resolver talks to
    pub fn proxy(&self) -> &Proxy {
        &self.inner.proxy
    }

    pub fn table(&self) -> &Arc<LocatorTable> {
        &self.inner.table
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    fn check_destroyed(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(OrbError::Destroyed);
        }
        Ok(())
    }

    /// Resolve the endpoints of an indirect proxy
    pub async fn get_endpoints(&self, proxy: &Proxy) -> Result<Resolved> {
        if !proxy.adapter_id().is_empty() {
            return self.find_adapter_endpoints(proxy.adapter_id()).await;
        }
        if !proxy.is_well_known() {
            return Ok(Resolved {
                endpoints: proxy.endpoints().clone(),
                cached: false,
            });
        }

        let (object, object_cached) = self.find_object(proxy.identity()).await?;
        if !object.endpoints().is_empty() {
            return Ok(Resolved {
                endpoints: object.endpoints().clone(),
                cached: object_cached,
            });
        }
        if !object.adapter_id().is_empty() {
            let adapter = self.find_adapter_endpoints(object.adapter_id()).await?;
            return Ok(Resolved {
                endpoints: adapter.endpoints,
                cached: object_cached || adapter.cached,
            });
        }
        Ok(Resolved {
            endpoints: EndpointSet::empty(),
            cached: object_cached,
        })
    }

    /// Resolve an adapter id, from the table if possible
    pub async fn find_adapter_endpoints(&self, adapter_id: &str) -> Result<Resolved> {
        self.check_destroyed()?;
        let inner = &self.inner;

        let (lookup, task) = {
            let mut pending = inner.adapter_lookups.lock();
            match inner.table.get_adapter(adapter_id, inner.policy.negative_ttl) {
                CachedLookup::Hit(endpoints) => {
                    trace!("locator cache hit for adapter `{}`", adapter_id);
                    return Ok(Resolved {
                        endpoints,
                        cached: true,
                    });
                }
                CachedLookup::Missing => {
                    return Err(OrbError::AdapterNotFound(adapter_id.to_string()));
                }
                CachedLookup::Miss => {}
            }
            join_or_start(&mut *pending, &adapter_id.to_string(), || {
                Self::adapter_lookup(Arc::clone(inner), adapter_id.to_string())
            })
        };
        if let Some(task) = task {
            tokio::spawn(task);
        }

        match lookup.await? {
            Some(endpoints) => Ok(Resolved {
                endpoints,
                cached: false,
            }),
            None => Err(OrbError::AdapterNotFound(adapter_id.to_string())),
        }
    }

    fn adapter_lookup(inner: Arc<Inner>, adapter_id: String) -> Lookup<EndpointSet> {
        let stamp = inner.table.adapter_stamp(&adapter_id);
        async move {
            debug!("looking up endpoints of adapter `{}`", adapter_id);
            let result = bounded(
                inner.policy.timeout,
                inner.locator.find_adapter_by_id(&adapter_id),
            )
            .await;

            match &result {
                Ok(Some(endpoints)) if !endpoints.is_empty() => {
                    if !inner.table.add_adapter(&adapter_id, Some(endpoints.clone()), stamp) {
                        debug!("cache invalidated while resolving `{}`, result not cached", adapter_id);
                    }
                }
                Ok(None) if !inner.policy.negative_ttl.is_zero() => {
                    inner.table.add_adapter(&adapter_id, None, stamp);
                }
                Ok(_) => {}
                Err(err) => warn!("lookup of adapter `{}` failed: {}", adapter_id, err),
            }

            inner.adapter_lookups.lock().remove(&adapter_id);
            result
        }
        .boxed()
    }

    /// Resolve a well-known object, from the table if possible.
    ///
    /// Returns the object's proxy and whether it came from the cache.
    pub async fn find_object(&self, identity: &Identity) -> Result<(Proxy, bool)> {
        self.check_destroyed()?;
        let inner = &self.inner;

        let (lookup, task) = {
            let mut pending = inner.object_lookups.lock();
            match inner.table.get_object(identity, inner.policy.negative_ttl) {
                CachedLookup::Hit(proxy) => {
                    trace!("locator cache hit for object `{}`", identity);
                    return Ok((proxy, true));
                }
                CachedLookup::Missing => return Err(OrbError::ObjectNotFound(identity.clone())),
                CachedLookup::Miss => {}
            }
            join_or_start(&mut *pending, identity, || {
                Self::object_lookup(Arc::clone(inner), identity.clone())
            })
        };
        if let Some(task) = task {
            tokio::spawn(task);
        }

        match lookup.await? {
            Some(proxy) => Ok((proxy, false)),
            None => Err(OrbError::ObjectNotFound(identity.clone())),
        }
    }

    fn object_lookup(inner: Arc<Inner>, identity: Identity) -> Lookup<Proxy> {
        let stamp = inner.table.object_stamp(&identity);
        async move {
            debug!("looking up well-known object `{}`", identity);
            let result = bounded(inner.policy.timeout, inner.locator.find_object_by_id(&identity)).await;

            match &result {
                Ok(Some(proxy)) => {
                    if !inner.table.add_object(&identity, Some(proxy.clone()), stamp) {
                        debug!("cache invalidated while resolving `{}`, result not cached", identity);
                    }
                }
                Ok(None) if !inner.policy.negative_ttl.is_zero() => {
                    inner.table.add_object(&identity, None, stamp);
                }
                Ok(None) => {}
                Err(err) => warn!("lookup of object `{}` failed: {}", identity, err),
            }

            inner.object_lookups.lock().remove(&identity);
            result
        }
        .boxed()
    }

    /// Forget the cached resolution used by `proxy`
    pub fn clear_cache(&self, proxy: &Proxy) {
        if !proxy.adapter_id().is_empty() {
            self.clear_adapter(proxy.adapter_id());
        } else if proxy.is_well_known() {
            if let Some(object) = self.inner.table.remove_object(proxy.identity()) {
                debug!("cleared cached object `{}`", proxy.identity());
                if !object.adapter_id().is_empty() {
                    self.clear_adapter(object.adapter_id());
                }
            }
        }
    }

    /// Forget the cached endpoints of an adapter
    pub fn clear_adapter(&self, adapter_id: &str) {
        if self.inner.table.remove_adapter(adapter_id) {
            debug!("cleared cached endpoints of adapter `{}`", adapter_id);
        }
    }

    /// Fail all further resolutions and empty the table.
    ///
    /// Lookups already in flight still deliver their result to current
    /// waiters but no longer install it.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.adapter_lookups.lock().clear();
        self.inner.object_lookups.lock().clear();
        self.inner.table.clear();
    }
}

impl std::fmt::Debug for LocatorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatorInfo")
            .field("locator", self.proxy().identity())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
