//! Object identities
//!
//! An identity names a remote object independently of where it lives. It is
//! also the key under which locator and router resolvers are shared.

use std::fmt;
use std::str::FromStr;

use super::{OrbError, Result};

/// Name and category of a remote object
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    /// Create an identity
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Create an identity with an empty category
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }

    /// Create an identity with a random UUID name
    pub fn random(category: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), category)
    }

    /// An identity with an empty name names nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        if c == '/' || c == '\\' {
            write!(f, "\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.category.is_empty() {
            write_escaped(f, &self.category)?;
            write!(f, "/")?;
        }
        write_escaped(f, &self.name)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = OrbError;

    /// Parse `category/name` or `name`, with `\` escaping `/` and itself
    fn from_str(s: &str) -> Result<Self> {
        let mut category: Option<String> = None;
        let mut current = String::new();
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(OrbError::InvalidIdentity(s.to_string())),
                },
                '/' => {
                    if category.is_some() {
                        return Err(OrbError::InvalidIdentity(s.to_string()));
                    }
                    category = Some(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }

        if current.is_empty() {
            return Err(OrbError::InvalidIdentity(s.to_string()));
        }
        Ok(Identity::new(current, category.unwrap_or_default()))
    }
}
