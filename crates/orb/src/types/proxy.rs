//! Proxies
//!
//! A proxy is an immutable, location-transparent reference to a remote
//! object. It either carries direct endpoints or names an object adapter
//! (possibly none, for a well-known object) that a locator resolves.
//!
//! String form:
//!
//! ```text
//! <identity> [-f <facet>] [-t|-o|-O|-d|-D] [-s] (:<endpoint>)*
//! <identity> [-f <facet>] [-t|-o|-O|-d|-D] [-s] @ <adapter-id>
//! ```
//!
//! Identity, facet and adapter id are quoted with `"` when they contain
//! whitespace, `:` or `@`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::SliceRandom;

use super::{Endpoint, EndpointSet, Identity, OrbError, Result};

/// How invocations on a proxy are delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum InvocationMode {
    #[default]
    Twoway,
    Oneway,
    BatchOneway,
    Datagram,
    BatchDatagram,
}

impl InvocationMode {
    /// Whether the mode needs datagram endpoints
    pub fn is_datagram(self) -> bool {
        matches!(self, InvocationMode::Datagram | InvocationMode::BatchDatagram)
    }

    fn flag(self) -> &'static str {
        match self {
            InvocationMode::Twoway => "-t",
            InvocationMode::Oneway => "-o",
            InvocationMode::BatchOneway => "-O",
            InvocationMode::Datagram => "-d",
            InvocationMode::BatchDatagram => "-D",
        }
    }

    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-t" => Some(InvocationMode::Twoway),
            "-o" => Some(InvocationMode::Oneway),
            "-O" => Some(InvocationMode::BatchOneway),
            "-d" => Some(InvocationMode::Datagram),
            "-D" => Some(InvocationMode::BatchDatagram),
            _ => None,
        }
    }
}

/// Reference to a remote object
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    identity: Identity,
    facet: String,
    mode: InvocationMode,
    secure: bool,
    adapter_id: String,
    endpoints: EndpointSet,
    locator: Option<Arc<Proxy>>,
    router: Option<Arc<Proxy>>,
}

impl Proxy {
    fn with_target(identity: Identity, adapter_id: String, endpoints: EndpointSet) -> Self {
        Self {
            identity,
            facet: String::new(),
            mode: InvocationMode::default(),
            secure: false,
            adapter_id,
            endpoints,
            locator: None,
            router: None,
        }
    }

    /// Proxy with direct endpoints
    pub fn direct(identity: Identity, endpoints: impl Into<EndpointSet>) -> Self {
        Self::with_target(identity, String::new(), endpoints.into())
    }

    /// Proxy resolved through a locator by adapter id
    pub fn indirect(identity: Identity, adapter_id: impl Into<String>) -> Self {
        Self::with_target(identity, adapter_id.into(), EndpointSet::empty())
    }

    /// Proxy resolved through a locator by identity alone
    pub fn well_known(identity: Identity) -> Self {
        Self::with_target(identity, String::new(), EndpointSet::empty())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn facet(&self) -> &str {
        &self.facet
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn locator(&self) -> Option<&Proxy> {
        self.locator.as_deref()
    }

    pub fn router(&self) -> Option<&Proxy> {
        self.router.as_deref()
    }

    /// Whether endpoints must be obtained from a locator
    pub fn is_indirect(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Whether the proxy names its object by identity alone
    pub fn is_well_known(&self) -> bool {
        self.endpoints.is_empty() && self.adapter_id.is_empty()
    }

    pub fn with_identity(&self, identity: Identity) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    pub fn with_facet(&self, facet: impl Into<String>) -> Self {
        Self {
            facet: facet.into(),
            ..self.clone()
        }
    }

    pub fn with_mode(&self, mode: InvocationMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn with_secure(&self, secure: bool) -> Self {
        Self {
            secure,
            ..self.clone()
        }
    }

    /// Make the proxy indirect, dropping any direct endpoints
    pub fn with_adapter_id(&self, adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            endpoints: EndpointSet::empty(),
            ..self.clone()
        }
    }

    /// Make the proxy direct, dropping any adapter id
    pub fn with_endpoints(&self, endpoints: impl Into<EndpointSet>) -> Self {
        Self {
            adapter_id: String::new(),
            endpoints: endpoints.into(),
            ..self.clone()
        }
    }

    pub fn with_locator(&self, locator: Option<Proxy>) -> Self {
        Self {
            locator: locator.map(Arc::new),
            ..self.clone()
        }
    }

    pub fn with_router(&self, router: Option<Proxy>) -> Self {
        Self {
            router: router.map(Arc::new),
            ..self.clone()
        }
    }

    /// Rewrite the timeout of every direct endpoint
    pub fn with_timeout(&self, timeout_ms: Option<u32>) -> Self {
        let endpoints = self
            .endpoints
            .iter()
            .map(|endpoint| endpoint.with_timeout(timeout_ms))
            .collect();
        Self {
            endpoints,
            ..self.clone()
        }
    }

    /// Select the endpoints of `endpoints` usable by this proxy.
    ///
    /// Unknown protocols are dropped, as are endpoints whose datagram-ness
    /// does not match the invocation mode. A secure proxy keeps only secure
    /// endpoints; otherwise insecure endpoints are ordered first.
    pub fn filter_endpoints(&self, endpoints: &EndpointSet, shuffle: bool) -> EndpointSet {
        let mut usable: Vec<Endpoint> = endpoints
            .iter()
            .filter(|endpoint| !endpoint.unknown())
            .filter(|endpoint| endpoint.datagram() == self.mode.is_datagram())
            .cloned()
            .collect();

        if shuffle {
            usable.shuffle(&mut rand::thread_rng());
        }

        if self.secure {
            usable.retain(Endpoint::secure);
        } else {
            usable.sort_by_key(Endpoint::secure);
        }

        EndpointSet::new(usable)
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == ':' || c == '@' || c == '"')
}

fn write_token(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if needs_quotes(s) {
        write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        write!(f, "{}", s)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, &self.identity.to_string())?;
        if !self.facet.is_empty() {
            write!(f, " -f ")?;
            write_token(f, &self.facet)?;
        }
        write!(f, " {}", self.mode.flag())?;
        if self.secure {
            write!(f, " -s")?;
        }
        if !self.endpoints.is_empty() {
            for endpoint in &self.endpoints {
                write!(f, ":{}", endpoint)?;
            }
        } else if !self.adapter_id.is_empty() {
            write!(f, " @ ")?;
            write_token(f, &self.adapter_id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("proxy", &self.to_string())
            .field("locator", &self.locator.as_ref().map(|l| l.identity.clone()))
            .field("router", &self.router.as_ref().map(|r| r.identity.clone()))
            .finish()
    }
}

/// Position and kind of the first `:` or `@` outside quotes
fn find_separator(s: &str) -> Option<(usize, char)> {
    let mut quoted = false;
    let mut escaped = false;
    for (index, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ':' | '@' if !quoted => return Some((index, c)),
            _ => {}
        }
    }
    None
}

/// Split on whitespace outside quotes, removing the quotes
fn tokenize(s: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current: Option<String> = None;
    let mut quoted = false;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                current.get_or_insert_with(String::new);
            }
            '\\' if quoted => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| OrbError::InvalidProxy(s.to_string()))?;
                current.get_or_insert_with(String::new).push(escaped);
            }
            c if c.is_whitespace() && !quoted => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            c => current.get_or_insert_with(String::new).push(c),
        }
    }

    if quoted {
        return Err(OrbError::InvalidProxy(s.to_string()));
    }
    tokens.extend(current);
    Ok(tokens)
}

impl FromStr for Proxy {
    type Err = OrbError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OrbError::InvalidProxy(s.to_string());

        let (head, tail) = match find_separator(s) {
            Some((index, separator)) => (&s[..index], Some((separator, &s[index + 1..]))),
            None => (s, None),
        };

        let mut tokens = tokenize(head)?.into_iter();
        let identity: Identity = tokens.next().ok_or_else(invalid)?.parse()?;
        let mut proxy = Proxy::well_known(identity);

        while let Some(option) = tokens.next() {
            match option.as_str() {
                "-f" => proxy.facet = tokens.next().ok_or_else(invalid)?,
                "-s" => proxy.secure = true,
                flag => proxy.mode = InvocationMode::from_flag(flag).ok_or_else(invalid)?,
            }
        }

        match tail {
            Some((':', endpoints)) => {
                let endpoints = endpoints
                    .split(':')
                    .map(str::parse)
                    .collect::<Result<Vec<Endpoint>>>()?;
                proxy.endpoints = EndpointSet::new(endpoints);
            }
            Some((_, adapter)) => {
                let mut tokens = tokenize(adapter)?.into_iter();
                proxy.adapter_id = tokens.next().ok_or_else(invalid)?;
                if proxy.adapter_id.is_empty() || tokens.next().is_some() {
                    return Err(invalid());
                }
            }
            None => {}
        }

        Ok(proxy)
    }
}
