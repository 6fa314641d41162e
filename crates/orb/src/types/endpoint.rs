//! Transport endpoints
//!
//! Endpoints are opaque to resolution beyond a few predicates used for
//! filtering. The string form mirrors the usual `tcp -h host -p port` syntax.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{OrbError, Result};

/// Transport protocol of an endpoint
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Ssl,
    Udp,
    /// A protocol this process has no transport for
    Opaque(String),
}

impl Protocol {
    pub fn name(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Ssl => "ssl",
            Protocol::Udp => "udp",
            Protocol::Opaque(name) => name,
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "tcp" => Protocol::Tcp,
            "ssl" => Protocol::Ssl,
            "udp" => Protocol::Udp,
            other => Protocol::Opaque(other.to_string()),
        }
    }
}

/// A single network address of an object adapter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Connection timeout in milliseconds, `None` for no limit
    pub timeout_ms: Option<u32>,
    pub compress: bool,
}

impl Endpoint {
    /// Create an endpoint with no timeout and no compression
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            timeout_ms: None,
            compress: false,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Protocol::Tcp, host, port)
    }

    pub fn ssl(host: impl Into<String>, port: u16) -> Self {
        Self::new(Protocol::Ssl, host, port)
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Protocol::Udp, host, port)
    }

    /// Copy of this endpoint with a different timeout
    pub fn with_timeout(&self, timeout_ms: Option<u32>) -> Self {
        Self {
            timeout_ms,
            ..self.clone()
        }
    }

    /// Whether the endpoint carries datagrams
    pub fn datagram(&self) -> bool {
        self.protocol == Protocol::Udp
    }

    /// Whether the endpoint is encrypted
    pub fn secure(&self) -> bool {
        self.protocol == Protocol::Ssl
    }

    /// Whether no transport exists for the endpoint's protocol
    pub fn unknown(&self) -> bool {
        matches!(self.protocol, Protocol::Opaque(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -h {} -p {}", self.protocol.name(), self.host, self.port)?;
        if let Some(timeout) = self.timeout_ms {
            write!(f, " -t {}", timeout)?;
        }
        if self.compress {
            write!(f, " -z")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = OrbError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OrbError::InvalidEndpoint(s.to_string());
        let mut tokens = s.split_whitespace();
        let protocol = Protocol::from_name(tokens.next().ok_or_else(invalid)?);

        let mut host = None;
        let mut port = 0u16;
        let mut timeout_ms = None;
        let mut compress = false;

        while let Some(option) = tokens.next() {
            match option {
                "-h" => host = Some(tokens.next().ok_or_else(invalid)?.to_string()),
                "-p" => {
                    port = tokens
                        .next()
                        .and_then(|value| value.parse().ok())
                        .ok_or_else(invalid)?
                }
                "-t" => {
                    timeout_ms = match tokens.next().ok_or_else(invalid)? {
                        "infinite" => None,
                        value => Some(value.parse().map_err(|_| invalid())?),
                    }
                }
                "-z" => compress = true,
                _ => return Err(invalid()),
            }
        }

        Ok(Endpoint {
            protocol,
            host: host.ok_or_else(invalid)?,
            port,
            timeout_ms,
            compress,
        })
    }
}

/// Immutable, cheaply clonable list of endpoints
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EndpointSet(Arc<[Endpoint]>);

impl EndpointSet {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self(Arc::from(endpoints))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Endpoint] {
        &self.0
    }

    /// Whether both sets share the same allocation
    pub fn ptr_eq(&self, other: &EndpointSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Endpoint>> for EndpointSet {
    fn from(endpoints: Vec<Endpoint>) -> Self {
        Self::new(endpoints)
    }
}

impl FromIterator<Endpoint> for EndpointSet {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for EndpointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, endpoint) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", endpoint)?;
        }
        Ok(())
    }
}

impl fmt::Debug for EndpointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointSet[{}]", self)
    }
}
