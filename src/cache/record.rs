//! Cached Record Module
//!
//! The unit written to a durable slot: a value plus the time it was saved.

use serde::{Deserialize, Serialize};

// == Cached Record ==
/// A value stamped with its save time.
///
/// Serialized as `{"savedAtMs": <epoch ms>, "value": <T>}`. Records are never
/// mutated; every write builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord<T> {
    /// Save time (Unix milliseconds)
    pub saved_at_ms: u64,
    /// The cached value
    pub value: T,
}

impl<T> CachedRecord<T> {
    // == Constructor ==
    pub fn new(value: T, saved_at_ms: u64) -> Self {
        Self { saved_at_ms, value }
    }

    // == Age ==
    /// Milliseconds elapsed since the save. A clock that moved backwards
    /// yields zero.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.saved_at_ms)
    }

    // == Is Expired ==
    /// A record is stale once its age strictly exceeds `max_age_ms`.
    /// `None` never expires.
    pub fn is_expired(&self, max_age_ms: Option<u64>, now_ms: u64) -> bool {
        match max_age_ms {
            Some(max_age) => self.age_ms(now_ms) > max_age,
            None => false,
        }
    }
}
