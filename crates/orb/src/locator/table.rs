//! Locator cache table
//!
//! Maps adapter ids to endpoint sets and well-known identities to proxies.
//! One table exists per locator identity and is shared by every proxy that
//! uses that locator.
//!
//! Entries are never expired proactively. They are removed when an
//! invocation using them fails to connect, or when the table is cleared.
//! A lookup takes a [`Stamp`] before it starts and installs its result only
//! if neither its own key nor the whole table was invalidated meanwhile.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{EndpointSet, Identity, Proxy};

/// Outcome of a cache lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedLookup<T> {
    /// Cached value
    Hit(T),
    /// Recently confirmed as not registered
    Missing,
    /// Nothing usable cached
    Miss,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    /// `None` records a negative lookup
    value: Option<T>,
    resolved_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            value,
            resolved_at: Instant::now(),
        }
    }

    fn lookup(&self, negative_ttl: Duration) -> CachedLookup<T> {
        match &self.value {
            Some(value) => CachedLookup::Hit(value.clone()),
            None if self.resolved_at.elapsed() < negative_ttl => CachedLookup::Missing,
            None => CachedLookup::Miss,
        }
    }
}

/// Invalidation state observed when a lookup started
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stamp {
    epoch: u64,
    generation: u64,
}

#[derive(Default)]
struct TableState {
    adapters: HashMap<String, Entry<EndpointSet>>,
    objects: HashMap<Identity, Entry<Proxy>>,
    /// Removals per key since the last clear
    adapter_generations: HashMap<String, u64>,
    object_generations: HashMap<Identity, u64>,
    /// Advanced by `clear`
    epoch: u64,
}

impl TableState {
    fn adapter_stamp(&self, adapter_id: &str) -> Stamp {
        Stamp {
            epoch: self.epoch,
            generation: self.adapter_generations.get(adapter_id).copied().unwrap_or(0),
        }
    }

    fn object_stamp(&self, identity: &Identity) -> Stamp {
        Stamp {
            epoch: self.epoch,
            generation: self.object_generations.get(identity).copied().unwrap_or(0),
        }
    }
}

/// Thread-safe cache of locator lookups
pub struct LocatorTable {
    state: RwLock<TableState>,
}

impl LocatorTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState::default()),
        }
    }

    /// Invalidation state of an adapter entry, taken before looking it up
    pub fn adapter_stamp(&self, adapter_id: &str) -> Stamp {
        self.state.read().adapter_stamp(adapter_id)
    }

    /// Invalidation state of a well-known object entry
    pub fn object_stamp(&self, identity: &Identity) -> Stamp {
        self.state.read().object_stamp(identity)
    }

    /// Look up the endpoints of an adapter
    pub fn get_adapter(&self, adapter_id: &str, negative_ttl: Duration) -> CachedLookup<EndpointSet> {
        let state = self.state.read();
        state
            .adapters
            .get(adapter_id)
            .map_or(CachedLookup::Miss, |entry| entry.lookup(negative_ttl))
    }

    /// Install a lookup result unless the entry was invalidated after `stamp`
    pub fn add_adapter(&self, adapter_id: &str, endpoints: Option<EndpointSet>, stamp: Stamp) -> bool {
        let mut state = self.state.write();
        if state.adapter_stamp(adapter_id) != stamp {
            return false;
        }
        state
            .adapters
            .insert(adapter_id.to_string(), Entry::new(endpoints));
        true
    }

    /// Remove an adapter entry, returning whether one was cached
    pub fn remove_adapter(&self, adapter_id: &str) -> bool {
        let mut state = self.state.write();
        *state
            .adapter_generations
            .entry(adapter_id.to_string())
            .or_insert(0) += 1;
        state.adapters.remove(adapter_id).is_some()
    }

    /// Time the cached entry for an adapter was resolved
    pub fn adapter_resolved_at(&self, adapter_id: &str) -> Option<Instant> {
        self.state.read().adapters.get(adapter_id).map(|entry| entry.resolved_at)
    }

    /// Look up a well-known object
    pub fn get_object(&self, identity: &Identity, negative_ttl: Duration) -> CachedLookup<Proxy> {
        let state = self.state.read();
        state
            .objects
            .get(identity)
            .map_or(CachedLookup::Miss, |entry| entry.lookup(negative_ttl))
    }

    /// Install a well-known object unless the entry was invalidated after `stamp`
    pub fn add_object(&self, identity: &Identity, proxy: Option<Proxy>, stamp: Stamp) -> bool {
        let mut state = self.state.write();
        if state.object_stamp(identity) != stamp {
            return false;
        }
        state.objects.insert(identity.clone(), Entry::new(proxy));
        true
    }

    /// Remove a well-known object entry, returning the cached proxy
    pub fn remove_object(&self, identity: &Identity) -> Option<Proxy> {
        let mut state = self.state.write();
        *state.object_generations.entry(identity.clone()).or_insert(0) += 1;
        state.objects.remove(identity).and_then(|entry| entry.value)
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.epoch += 1;
        state.adapters.clear();
        state.objects.clear();
        state.adapter_generations.clear();
        state.object_generations.clear();
    }

    pub fn adapter_count(&self) -> usize {
        self.state.read().adapters.len()
    }

    pub fn object_count(&self) -> usize {
        self.state.read().objects.len()
    }
}

impl Default for LocatorTable {
    fn default() -> Self {
        Self::new()
    }
}
