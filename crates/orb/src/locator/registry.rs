//! Per-communicator registry of locator resolvers

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::info::{LocatorInfo, LookupPolicy};
use super::table::LocatorTable;
use crate::transport::ServiceBinder;
use crate::types::{Identity, OrbError, Proxy, Result};

#[derive(Default)]
struct RegistryState {
    infos: HashMap<Identity, Arc<LocatorInfo>>,
    destroyed: bool,
}

/// One [`LocatorInfo`] per distinct locator identity.
///
/// Entries live until [`destroy`](Self::destroy); nothing is reaped while
/// the communicator is running.
pub struct LocatorRegistry {
    binder: Arc<dyn ServiceBinder>,
    policy: LookupPolicy,
    state: Mutex<RegistryState>,
}

impl LocatorRegistry {
    pub fn new(binder: Arc<dyn ServiceBinder>, policy: LookupPolicy) -> Self {
        Self {
            binder,
            policy,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Resolver for `locator`, created on first use.
    ///
    /// `None` means "no locator" and is not an error.
    pub fn get(&self, locator: Option<&Proxy>) -> Result<Option<Arc<LocatorInfo>>> {
        let Some(locator) = locator else {
            return Ok(None);
        };
        // the locator itself is never resolved through a locator or router
        let normalized = locator.with_locator(None).with_router(None);

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(OrbError::Destroyed);
        }
        if let Some(info) = state.infos.get(normalized.identity()) {
            return Ok(Some(Arc::clone(info)));
        }

        debug!("creating locator resolver for `{}`", normalized.identity());
        let service = self.binder.bind_locator(&normalized);
        let info = Arc::new(LocatorInfo::new(
            normalized.clone(),
            service,
            Arc::new(LocatorTable::new()),
            self.policy,
        ));
        state
            .infos
            .insert(normalized.identity().clone(), Arc::clone(&info));
        Ok(Some(info))
    }

    pub fn len(&self) -> usize {
        self.state.lock().infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every resolver and refuse further lookups
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        for (identity, info) in state.infos.drain() {
            debug!("destroying locator resolver for `{}`", identity);
            info.destroy();
        }
    }
}
