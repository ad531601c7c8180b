//! Node addresses from the contribution graph
//!
//! An address is an ordered list of string parts. The wire form is
//! `"N\0part1\0part2\0"`, which sorts and compares the same way the part
//! lists do.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const PREFIX: &str = "N\0";
const SEPARATOR: char = '\0';

/// Structured identifier of a graph node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddress {
    parts: Vec<String>,
}

impl NodeAddress {
    /// Build an address; parts must not contain NUL
    pub fn from_parts<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if let Some(bad) = parts.iter().find(|p| p.contains(SEPARATOR)) {
            return Err(Error::Validation(format!("address part contains NUL: {bad:?}")));
        }
        Ok(Self { parts })
    }

    /// Build from parts already known to be NUL-free
    pub(crate) fn from_trusted_parts(parts: Vec<String>) -> Self {
        debug_assert!(parts.iter().all(|p| !p.contains(SEPARATOR)));
        Self { parts }
    }

    /// Address parts
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// True when `prefix`'s parts are a leading subsequence of ours
    pub fn has_prefix(&self, prefix: &NodeAddress) -> bool {
        self.parts.starts_with(&prefix.parts)
    }

    /// Append parts to this address
    pub fn append<I, S>(&self, parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra = NodeAddress::from_parts(parts)?;
        let mut joined = self.parts.clone();
        joined.extend(extra.parts);
        Ok(Self { parts: joined })
    }

    /// Wire encoding
    pub fn to_raw(&self) -> String {
        let mut raw = String::from(PREFIX);
        for part in &self.parts {
            raw.push_str(part);
            raw.push(SEPARATOR);
        }
        raw
    }

    /// Decode the wire encoding
    pub fn from_raw(raw: &str) -> Result<Self> {
        let body = raw
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::Validation(format!("not a node address: {raw:?}")))?;
        if body.is_empty() {
            return Ok(Self { parts: Vec::new() });
        }
        let body = body
            .strip_suffix(SEPARATOR)
            .ok_or_else(|| Error::Validation(format!("node address not terminated: {raw:?}")))?;
        Ok(Self { parts: body.split(SEPARATOR).map(str::to_string).collect() })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress{:?}", self.parts)
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_raw())
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeAddress::from_raw(&raw).map_err(serde::de::Error::custom)
    }
}
