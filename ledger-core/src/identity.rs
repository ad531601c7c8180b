//! Identity model
//!
//! Identities are value types: ledger mutations replace an identity with a
//! new value instead of editing it in place.

use crate::{address::NodeAddress, id::IdentityId, Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated identity name: ASCII letters, digits and `-`
///
/// Names are case-preserving; uniqueness in the ledger is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Name(String);

impl Name {
    /// Parse and validate a name
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(Error::InvalidName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Best-effort name for an arbitrary platform username.
    ///
    /// Every character outside `[A-Za-z0-9-]` becomes `-`.
    pub fn coerce(s: &str) -> Self {
        let coerced: String = s
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        if coerced.is_empty() {
            Self("-".to_string())
        } else {
            Self(coerced)
        }
    }

    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used for uniqueness checks
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Name::parse(s)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Name::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Kind of identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    /// A person
    User,
    /// An automated account
    Bot,
    /// A group of people
    Organization,
    /// A project or repository
    Project,
}

impl IdentityType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityType::User => "USER",
            IdentityType::Bot => "BOT",
            IdentityType::Organization => "ORGANIZATION",
            IdentityType::Project => "PROJECT",
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(IdentityType::User),
            "BOT" => Ok(IdentityType::Bot),
            "ORGANIZATION" => Ok(IdentityType::Organization),
            "PROJECT" => Ok(IdentityType::Project),
            other => Err(Error::Validation(format!("invalid identity type: {other:?}"))),
        }
    }
}

/// External identifier claimed by an identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    /// Graph address
    pub address: NodeAddress,
    /// Free-form description shown to users
    pub description: String,
}

/// A participant in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier
    pub id: IdentityId,
    /// Kind of identity
    pub subtype: IdentityType,
    /// Display name
    pub name: Name,
    /// Innate address, derived from `id`
    pub address: NodeAddress,
    /// Claimed aliases, in the order they were added
    pub aliases: Vec<Alias>,
}

/// Parts every innate identity address starts with
pub const IDENTITY_PREFIX: [&str; 3] = ["sourcecred", "core", "IDENTITY"];

/// Prefix of every innate identity address
pub fn identity_prefix() -> NodeAddress {
    NodeAddress::from_trusted_parts(IDENTITY_PREFIX.iter().map(|p| p.to_string()).collect())
}

/// Innate address of the identity with `id`
pub fn innate_address(id: IdentityId) -> NodeAddress {
    let mut parts: Vec<String> = IDENTITY_PREFIX.iter().map(|p| p.to_string()).collect();
    parts.push(id.to_string());
    // Base64url ids never contain NUL.
    NodeAddress::from_trusted_parts(parts)
}

impl Identity {
    /// New identity with no aliases
    pub fn new(id: IdentityId, subtype: IdentityType, name: Name) -> Self {
        Self {
            id,
            subtype,
            name,
            address: innate_address(id),
            aliases: Vec::new(),
        }
    }

    /// Every address bound to this identity: the innate one, then aliases
    pub fn addresses(&self) -> impl Iterator<Item = &NodeAddress> {
        std::iter::once(&self.address).chain(self.aliases.iter().map(|a| &a.address))
    }

    /// Alias standing in for this identity after it is merged away
    pub fn merge_alias(&self) -> Alias {
        Alias {
            address: self.address.clone(),
            description: format!("identity @{} (id: {})", self.name, self.id),
        }
    }
}
