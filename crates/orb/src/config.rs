//! Communicator configuration
//!
//! Built directly with [`CommunicatorConfig::default`] and the `with_*`
//! methods, or read from a flat property map:
//!
//! | key                                | value                                |
//! |------------------------------------|--------------------------------------|
//! | `Orb.Default.Locator`              | stringified locator proxy            |
//! | `Orb.Default.Router`               | stringified router proxy             |
//! | `Orb.Locator.Timeout`              | ms per remote lookup, negative = none |
//! | `Orb.Locator.NegativeCacheTimeout` | ms to remember "not registered"      |
//! | `Orb.RetryCachedEndpoints`         | `0` or `1`                           |
//! | `Orb.ShuffleEndpoints`             | `0` or `1`                           |
//! | `Orb.Invocation.Timeout`           | ms per `send`, negative = none       |

use std::collections::HashMap;
use std::time::Duration;

use crate::locator::{LookupPolicy, DEFAULT_LOOKUP_TIMEOUT};
use crate::types::{OrbError, Proxy, Result};

pub const DEFAULT_LOCATOR_KEY: &str = "Orb.Default.Locator";
pub const DEFAULT_ROUTER_KEY: &str = "Orb.Default.Router";
pub const LOCATOR_TIMEOUT_KEY: &str = "Orb.Locator.Timeout";
pub const LOCATOR_NEGATIVE_TTL_KEY: &str = "Orb.Locator.NegativeCacheTimeout";
pub const RETRY_CACHED_ENDPOINTS_KEY: &str = "Orb.RetryCachedEndpoints";
pub const SHUFFLE_ENDPOINTS_KEY: &str = "Orb.ShuffleEndpoints";
pub const INVOCATION_TIMEOUT_KEY: &str = "Orb.Invocation.Timeout";

/// Configuration for a [`Communicator`](crate::Communicator)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunicatorConfig {
    /// Locator attached to proxies created from strings
    pub default_locator: Option<Proxy>,
    /// Router attached to proxies created from strings
    pub default_router: Option<Proxy>,
    /// Bound for a single locator or router request
    pub locator_timeout: Duration,
    /// How long a "not registered" answer is cached; zero disables it
    pub locator_negative_ttl: Duration,
    /// Retry once with fresh endpoints after cached endpoints fail to connect
    pub retry_cached_endpoints: bool,
    /// Randomize endpoint order before connecting
    pub shuffle_endpoints: bool,
    /// Bound for a whole `send`, resolution and retry included
    pub invocation_timeout: Option<Duration>,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            default_locator: None,
            default_router: None,
            locator_timeout: DEFAULT_LOOKUP_TIMEOUT,
            locator_negative_ttl: Duration::ZERO,
            retry_cached_endpoints: true,
            shuffle_endpoints: true,
            invocation_timeout: None,
        }
    }
}

impl CommunicatorConfig {
    pub fn with_default_locator(mut self, locator: Proxy) -> Self {
        self.default_locator = Some(locator);
        self
    }

    pub fn with_default_router(mut self, router: Proxy) -> Self {
        self.default_router = Some(router);
        self
    }

    pub fn with_locator_timeout(mut self, timeout: Duration) -> Self {
        self.locator_timeout = timeout;
        self
    }

    pub fn with_locator_negative_ttl(mut self, ttl: Duration) -> Self {
        self.locator_negative_ttl = ttl;
        self
    }

    pub fn with_retry_cached_endpoints(mut self, retry: bool) -> Self {
        self.retry_cached_endpoints = retry;
        self
    }

    pub fn with_shuffle_endpoints(mut self, shuffle: bool) -> Self {
        self.shuffle_endpoints = shuffle;
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Lookup limits handed to every locator resolver
    pub fn lookup_policy(&self) -> LookupPolicy {
        LookupPolicy {
            timeout: self.locator_timeout,
            negative_ttl: self.locator_negative_ttl,
        }
    }

    /// Read a configuration from properties; missing keys keep their defaults
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = properties.get(DEFAULT_LOCATOR_KEY) {
            config.default_locator = Some(parse_proxy(DEFAULT_LOCATOR_KEY, value)?);
        }
        if let Some(value) = properties.get(DEFAULT_ROUTER_KEY) {
            let router = parse_proxy(DEFAULT_ROUTER_KEY, value)?;
            // the router itself is found through the default locator
            config.default_router = Some(router.with_locator(config.default_locator.clone()));
        }
        if let Some(value) = properties.get(LOCATOR_TIMEOUT_KEY) {
            config.locator_timeout =
                parse_timeout(LOCATOR_TIMEOUT_KEY, value)?.unwrap_or(Duration::MAX);
        }
        if let Some(value) = properties.get(LOCATOR_NEGATIVE_TTL_KEY) {
            config.locator_negative_ttl =
                parse_timeout(LOCATOR_NEGATIVE_TTL_KEY, value)?.unwrap_or(Duration::ZERO);
        }
        if let Some(value) = properties.get(RETRY_CACHED_ENDPOINTS_KEY) {
            config.retry_cached_endpoints = parse_flag(RETRY_CACHED_ENDPOINTS_KEY, value)?;
        }
        if let Some(value) = properties.get(SHUFFLE_ENDPOINTS_KEY) {
            config.shuffle_endpoints = parse_flag(SHUFFLE_ENDPOINTS_KEY, value)?;
        }
        if let Some(value) = properties.get(INVOCATION_TIMEOUT_KEY) {
            config.invocation_timeout = parse_timeout(INVOCATION_TIMEOUT_KEY, value)?;
        }

        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> OrbError {
    OrbError::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_proxy(key: &str, value: &str) -> Result<Proxy> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    value
        .trim()
        .parse::<i64>()
        .map(|n| n > 0)
        .map_err(|_| invalid(key, value))
}

/// Milliseconds; a negative value means "no bound" and yields `None`
fn parse_timeout(key: &str, value: &str) -> Result<Option<Duration>> {
    let ms = value.trim().parse::<i64>().map_err(|_| invalid(key, value))?;
    Ok(u64::try_from(ms).ok().map(Duration::from_millis))
}
