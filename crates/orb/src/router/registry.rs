//! Per-communicator registry of router resolvers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::info::RouterInfo;
use crate::transport::ServiceBinder;
use crate::types::{Identity, OrbError, Proxy, Result};

#[derive(Default)]
struct RegistryState {
    infos: HashMap<Identity, Arc<RouterInfo>>,
    destroyed: bool,
}

/// One [`RouterInfo`] per distinct router identity
pub struct RouterRegistry {
    binder: Arc<dyn ServiceBinder>,
    timeout: Duration,
    state: Mutex<RegistryState>,
}

impl RouterRegistry {
    pub fn new(binder: Arc<dyn ServiceBinder>, timeout: Duration) -> Self {
        Self {
            binder,
            timeout,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Resolver for `router`, created on first use; `None` for no router
    pub fn get(&self, router: Option<&Proxy>) -> Result<Option<Arc<RouterInfo>>> {
        let Some(router) = router else {
            return Ok(None);
        };
        // a router cannot be routed; an indirect router keeps its locator
        let normalized = router.with_router(None);

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(OrbError::Destroyed);
        }
        if let Some(info) = state.infos.get(normalized.identity()) {
            return Ok(Some(Arc::clone(info)));
        }

        debug!("creating router resolver for `{}`", normalized.identity());
        let service = self.binder.bind_router(&normalized);
        let info = Arc::new(RouterInfo::new(normalized.clone(), service, self.timeout));
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

    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        for (identity, info) in state.infos.drain() {
            debug!("destroying router resolver for `{}`", identity);
            info.destroy();
        }
    }
}
