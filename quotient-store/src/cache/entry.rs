//! Cache entry envelope and freshness derivation.
//!
//! Freshness is derived from the entry's age at read time, never stored as a
//! flag: `age < fresh` is fresh, `fresh <= age < stale` is stale-but-usable,
//! `age >= stale` is expired and treated as a hard miss. The backend TTL is
//! set to the stale bound, so a backend that evicts on time agrees with the
//! derivation.

use chrono::{DateTime, Utc};
use quotient_core::{CodecError, TtlPreset};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fresh/stale TTL pair governing one cache write.
///
/// The constructor clamps so `fresh <= stale` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    fresh: Duration,
    stale: Duration,
}

impl TtlPolicy {
    /// Create a policy, clamping `stale` up to at least `fresh`.
    pub fn new(fresh: Duration, stale: Duration) -> Self {
        Self {
            fresh,
            stale: stale.max(fresh),
        }
    }

    /// Age bound below which an entry is served without any fetch.
    pub fn fresh(&self) -> Duration {
        self.fresh
    }

    /// Age bound below which an entry may be served while a background
    /// refresh runs. Also the backend eviction TTL.
    pub fn stale(&self) -> Duration {
        self.stale
    }
}

impl From<TtlPreset> for TtlPolicy {
    fn from(preset: TtlPreset) -> Self {
        Self::new(preset.fresh(), preset.stale())
    }
}

/// Freshness class of a stored entry at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Young enough to serve without contacting the upstream.
    Fresh,
    /// Serveable, but a background refresh should run.
    Stale,
    /// Too old to serve; a hard miss.
    Expired,
}

/// The serialized envelope written to the store.
///
/// Carries its own TTL bounds so an entry written under one policy is
/// classified by that policy even after configuration changes; the caller's
/// current policy applies from the next successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub stored_at: DateTime<Utc>,
    pub fresh_ms: u64,
    pub stale_ms: u64,
    pub payload: serde_json::Value,
}

impl StoredEntry {
    /// Wrap a payload fetched now under the given policy.
    pub fn new(policy: TtlPolicy, payload: serde_json::Value) -> Self {
        Self {
            stored_at: Utc::now(),
            fresh_ms: policy.fresh().as_millis() as u64,
            stale_ms: policy.stale().as_millis() as u64,
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }

    /// Entry age at `now`. Clock skew that puts `stored_at` in the future
    /// counts as zero age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Classify this entry against its own stored bounds.
    pub fn state(&self, now: DateTime<Utc>) -> EntryState {
        let age = self.age(now);
        if age < Duration::from_millis(self.fresh_ms) {
            EntryState::Fresh
        } else if age < Duration::from_millis(self.stale_ms) {
            EntryState::Stale
        } else {
            EntryState::Expired
        }
    }
}

/// A cache read result carrying its staleness.
///
/// Callers get the value either way; `is_stale` tells them whether a
/// background refresh is underway so they can surface it (e.g. a
/// `Warning: stale` header) if they care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    value: T,
    is_stale: bool,
}

impl<T> Cached<T> {
    pub(crate) fn fresh(value: T) -> Self {
        Self {
            value,
            is_stale: false,
        }
    }

    pub(crate) fn stale(value: T) -> Self {
        Self {
            value,
            is_stale: true,
        }
    }

    /// Whether the value was past its fresh bound when read.
    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    /// Get a reference to the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume the wrapper and return the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> AsRef<T> for Cached<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
