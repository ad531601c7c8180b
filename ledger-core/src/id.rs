//! Compact random identifiers
//!
//! Identities, allocations, distributions and events are keyed by 16 random
//! bytes rendered as 22 characters of URL-safe base64 without padding.

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// 128-bit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; 16]);

/// Identity identifier, stable across renames and merges
pub type IdentityId = Id;
/// Allocation identifier
pub type AllocationId = Id;
/// Distribution identifier
pub type DistributionId = Id;
/// Event identifier
pub type EventId = Id;

impl Id {
    /// Construct from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 22 {
            return Err(Error::Validation(format!("invalid id {s:?}: expected 22 characters")));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| Error::Validation(format!("invalid id {s:?}: {e}")))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::Validation(format!("invalid id {s:?}: expected 16 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of fresh identifiers
pub trait IdSource: Send + Sync {
    /// Next identifier
    fn next_id(&self) -> Id;
}

/// Random identifiers (UUIDv4 bytes)
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> Id {
        Id(uuid::Uuid::new_v4().into_bytes())
    }
}

/// Deterministic identifiers from a counter, for tests and simulations
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Start counting at `start`
    pub fn starting_at(start: u64) -> Self {
        Self { next: AtomicU64::new(start) }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> Id {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Id(u128::from(n).to_be_bytes())
    }
}
