//! Cache Options Module
//!
//! Configuration resolved once and shared by an entry, or by every entry of a
//! group.

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::{Clock, Codec, JsonCodec, SystemClock, DEFAULT_MAX_AGE_MS};

// == Expiry Listener ==
/// Notified with the storage key of an entry that was found stale and evicted.
pub trait ExpiryListener: Send + Sync {
    fn on_expired(&self, key: &str);
}

impl<F> ExpiryListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_expired(&self, key: &str) {
        self(key)
    }
}

// == Cache Options ==
/// Settings for entries.
pub struct CacheOptions<T> {
    /// Maximum age before a value is stale; `None` never expires
    pub max_age_ms: Option<u64>,
    /// Whether a stale read removes the durable slot and notifies the
    /// listener. When false the value is only hidden.
    pub evict_on_expire: bool,
    /// Rotation offset for stored text; out of range disables obfuscation
    pub obfuscation_offset: Option<u32>,
    /// Serializer/deserializer pair for records
    pub codec: Arc<dyn Codec<T>>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Called once per detected expiration
    pub on_expire: Option<Arc<dyn ExpiryListener>>,
}

impl<T> CacheOptions<T> {
    /// Options using the given codec and defaults for everything else.
    pub fn with_codec(codec: Arc<dyn Codec<T>>) -> Self {
        Self {
            max_age_ms: Some(DEFAULT_MAX_AGE_MS),
            evict_on_expire: true,
            obfuscation_offset: None,
            codec,
            clock: Arc::new(SystemClock),
            on_expire: None,
        }
    }

    pub fn max_age_ms(mut self, max_age_ms: Option<u64>) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    pub fn evict_on_expire(mut self, evict: bool) -> Self {
        self.evict_on_expire = evict;
        self
    }

    pub fn obfuscation_offset(mut self, offset: Option<u32>) -> Self {
        self.obfuscation_offset = offset;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec<T>>) -> Self {
        self.codec = codec;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn on_expire(mut self, listener: Arc<dyn ExpiryListener>) -> Self {
        self.on_expire = Some(listener);
        self
    }
}

impl<T> Default for CacheOptions<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::with_codec(Arc::new(JsonCodec::<T>::new()))
    }
}

impl<T> Clone for CacheOptions<T> {
    fn clone(&self) -> Self {
        Self {
            max_age_ms: self.max_age_ms,
            evict_on_expire: self.evict_on_expire,
            obfuscation_offset: self.obfuscation_offset,
            codec: Arc::clone(&self.codec),
            clock: Arc::clone(&self.clock),
            on_expire: self.on_expire.clone(),
        }
    }
}

impl<T> fmt::Debug for CacheOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("max_age_ms", &self.max_age_ms)
            .field("evict_on_expire", &self.evict_on_expire)
            .field("obfuscation_offset", &self.obfuscation_offset)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}
