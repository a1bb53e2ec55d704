//! Cache Entry Module
//!
//! One TTL-bounded value bound to one durable storage slot.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::cache::{
    deobfuscate, is_valid_offset, obfuscate, CacheOptions, CachedRecord, OBFUSCATION_MODULUS,
};
use crate::error::Result;
use crate::store::SharedStore;

// == Cache Entry ==
/// A cached value mirrored into the store under `key`.
///
/// The in-memory record is the source for reads; the store is read on
/// construction and on [`Entry::load`], and written on every change. Reading a
/// stale value may remove the durable slot (see
/// [`CacheOptions::evict_on_expire`]).
pub struct Entry<T> {
    key: String,
    store: SharedStore,
    options: CacheOptions<T>,
    record: Option<CachedRecord<T>>,
}

impl<T> Entry<T> {
    // == Constructor ==
    /// Opens the entry for `key`, loading any stored record.
    ///
    /// A record that is already stale is evicted before this returns (or kept
    /// hidden when `evict_on_expire` is off). If no fresh value remains and
    /// `default_value` is given, it is written.
    pub fn new(
        key: impl Into<String>,
        store: SharedStore,
        options: CacheOptions<T>,
        default_value: Option<T>,
    ) -> Result<Self> {
        let mut entry = Self {
            key: key.into(),
            store,
            options,
            record: None,
        };

        if !entry.store.is_available() {
            debug!("No durable store for '{}', caching in memory only", entry.key);
        }

        if entry.load()? && entry.options.evict_on_expire {
            entry.evict_if_expired()?;
        }

        if entry.peek().is_none() {
            if let Some(value) = default_value {
                debug!("Seeding default value for '{}'", entry.key);
                entry.set(value)?;
            }
        }

        Ok(entry)
    }

    // == Set ==
    /// Caches `value` stamped with the current time and writes it to the store.
    ///
    /// Returns whether a durable write happened; without a store the value is
    /// still cached in memory.
    ///
    /// An encoding error leaves both memory and the slot untouched. A store
    /// write error is returned after the new value is cached, the same
    /// degradation as having no store at all.
    pub fn set(&mut self, value: T) -> Result<bool> {
        let record = CachedRecord::new(value, self.options.clock.now_ms());

        if !self.store.is_available() {
            self.record = Some(record);
            return Ok(false);
        }

        let text = self.encode(&record)?;
        self.record = Some(record);
        self.store.set_item(&self.key, &text)?;
        debug!("Saved value for '{}'", self.key);
        Ok(true)
    }

    // == Unset ==
    /// Drops the cached value and removes the durable slot.
    pub fn unset(&mut self) -> Result<bool> {
        self.record = None;
        if self.store.is_available() {
            self.store.remove_item(&self.key)?;
            debug!("Removed value for '{}'", self.key);
        }
        Ok(true)
    }

    // == Load ==
    /// Re-reads the slot into memory.
    ///
    /// Returns false when the store holds nothing for the key, leaving the
    /// in-memory record alone. Unreadable text counts as loaded but leaves no
    /// record. Expiration is not checked here.
    pub fn load(&mut self) -> Result<bool> {
        if !self.store.is_available() {
            return Ok(false);
        }

        let Some(text) = self.store.get_item(&self.key)? else {
            debug!("Nothing stored for '{}'", self.key);
            return Ok(false);
        };

        self.record = self.decode(&text)?;
        debug!("Loaded '{}' (usable: {})", self.key, self.record.is_some());
        Ok(true)
    }

    // == Is Expired ==
    /// Whether the cached record is older than the max age.
    ///
    /// Always false without a record or without a max age.
    pub fn is_expired(&self) -> bool {
        let now_ms = self.options.clock.now_ms();
        self.record
            .as_ref()
            .is_some_and(|record| record.is_expired(self.options.max_age_ms, now_ms))
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds.
    ///
    /// # Returns
    /// - `Some(0)` if the record is stale
    /// - `Some(remaining_ms)` while the record is fresh
    /// - `None` if there is no record or it never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        let record = self.record.as_ref()?;
        let max_age = self.options.max_age_ms?;
        let age = record.age_ms(self.options.clock.now_ms());
        Some(max_age.saturating_sub(age))
    }

    // == Accessors ==
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_age_ms(&self) -> Option<u64> {
        self.options.max_age_ms
    }

    pub fn saved_at_ms(&self) -> Option<u64> {
        self.record.as_ref().map(|record| record.saved_at_ms)
    }

    /// Whether a record is held in memory, fresh or not.
    pub fn has_value(&self) -> bool {
        self.record.is_some()
    }

    // == Peek ==
    /// Borrows the value if it is present and fresh. Never touches the store.
    pub fn peek(&self) -> Option<&T> {
        if self.is_expired() {
            return None;
        }
        self.record.as_ref().map(|record| &record.value)
    }

    // == Evict If Expired ==
    /// Evicts a stale record regardless of `evict_on_expire`.
    ///
    /// Returns whether an eviction happened.
    pub fn evict_if_expired(&mut self) -> Result<bool> {
        if !self.is_expired() {
            return Ok(false);
        }
        self.evict()?;
        Ok(true)
    }

    // == Evict ==
    /// Clears memory and the slot, then notifies the listener.
    fn evict(&mut self) -> Result<()> {
        let age = self
            .record
            .take()
            .map(|record| record.age_ms(self.options.clock.now_ms()));
        debug!(
            "Evicting '{}' (age {:?}ms > max {:?}ms)",
            self.key, age, self.options.max_age_ms
        );

        let removed = if self.store.is_available() {
            self.store.remove_item(&self.key)
        } else {
            Ok(())
        };

        if let Some(listener) = &self.options.on_expire {
            listener.on_expired(&self.key);
        }

        removed
    }

    fn active_offset(&self) -> Option<u32> {
        self.options
            .obfuscation_offset
            .filter(|offset| is_valid_offset(*offset, OBFUSCATION_MODULUS))
    }

    fn encode(&self, record: &CachedRecord<T>) -> Result<String> {
        let text = self.options.codec.encode(record)?;

        Ok(match self.active_offset() {
            Some(offset) => obfuscate(&STANDARD.encode(text), offset, OBFUSCATION_MODULUS),
            None => text,
        })
    }

    fn decode(&self, text: &str) -> Result<Option<CachedRecord<T>>> {
        let Some(offset) = self.active_offset() else {
            return self.options.codec.decode(text);
        };

        let encoded = deobfuscate(text, offset, OBFUSCATION_MODULUS);
        let plain = match STANDARD.decode(encoded) {
            Ok(bytes) => String::from_utf8(bytes).ok(),
            Err(_) => None,
        };

        match plain {
            Some(plain) => self.options.codec.decode(&plain),
            None => {
                warn!("Ignoring unreadable obfuscated slot for '{}'", self.key);
                Ok(None)
            }
        }
    }
}

impl<T: Clone> Entry<T> {
    // == Get ==
    /// Returns the cached value unless it is missing or stale.
    ///
    /// A stale read evicts the slot and notifies the listener when
    /// `evict_on_expire` is set; otherwise the value is only hidden.
    pub fn get(&mut self) -> Result<Option<T>> {
        let Some(record) = &self.record else {
            return Ok(None);
        };

        if !self.is_expired() {
            return Ok(Some(record.value.clone()));
        }

        if self.options.evict_on_expire {
            self.evict()?;
        }
        Ok(None)
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("max_age_ms", &self.options.max_age_ms)
            .field("saved_at_ms", &self.saved_at_ms())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ExpiryListener, ManualClock};
    use crate::error::CacheError;
    use crate::store::{KvStore, MemoryStore, NullStore};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const START_MS: u64 = 1_000_000;

    fn setup(max_age_ms: Option<u64>) -> (Arc<MemoryStore>, Arc<ManualClock>, CacheOptions<String>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let options = CacheOptions::<String>::default()
            .max_age_ms(max_age_ms)
            .clock(clock.clone());
        (store, clock, options)
    }

    fn counting_listener() -> (Arc<AtomicUsize>, Arc<dyn ExpiryListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let listener: Arc<dyn ExpiryListener> = Arc::new(move |_key: &str| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    struct FailingStore;

    impl KvStore for FailingStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(CacheError::Store("quota exceeded".to_string()))
        }

        fn remove_item(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_entry_empty() {
        let (store, _, options) = setup(Some(100));
        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();

        assert!(!entry.has_value());
        assert!(!entry.is_expired());
        assert_eq!(entry.get().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_set_and_get() {
        let (store, _, options) = setup(Some(100));
        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();

        assert!(entry.set("value".to_string()).unwrap());

        assert_eq!(entry.get().unwrap(), Some("value".to_string()));
        assert_eq!(entry.saved_at_ms(), Some(START_MS));
        assert_eq!(
            store.get_item("key").unwrap(),
            Some(format!(r#"{{"savedAtMs":{},"value":"value"}}"#, START_MS))
        );
    }

    #[test]
    fn test_entry_default_value_seeded() {
        let (store, _, options) = setup(Some(100));
        let mut entry =
            Entry::new("key", store.clone(), options, Some("fallback".to_string())).unwrap();

        assert_eq!(entry.get().unwrap(), Some("fallback".to_string()));
        assert!(store.get_item("key").unwrap().unwrap().contains("fallback"));
    }

    #[test]
    fn test_entry_default_value_ignored_when_stored() {
        let (store, _, options) = setup(Some(100));
        Entry::new("key", store.clone(), options.clone(), Some("first".to_string())).unwrap();

        let mut entry = Entry::new("key", store, options, Some("second".to_string())).unwrap();
        assert_eq!(entry.get().unwrap(), Some("first".to_string()));
    }

    #[test]
    fn test_entry_ttl_boundary() {
        let (store, clock, options) = setup(Some(100));
        let (expired, listener) = counting_listener();
        let mut entry = Entry::new("key", store.clone(), options.on_expire(listener), None).unwrap();
        entry.set("value".to_string()).unwrap();

        clock.advance(100);
        assert_eq!(entry.get().unwrap(), Some("value".to_string()));
        assert_eq!(entry.ttl_remaining_ms(), Some(0));

        clock.advance(1);
        assert!(entry.is_expired());
        assert_eq!(entry.get().unwrap(), None);
        assert_eq!(store.get_item("key").unwrap(), None);
        assert_eq!(expired.load(Ordering::SeqCst), 1);

        // Already evicted: no second notification
        assert_eq!(entry.get().unwrap(), None);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entry_no_max_age_never_expires() {
        let (store, clock, options) = setup(None);
        let mut entry = Entry::new("key", store, options, Some("forever".to_string())).unwrap();

        clock.advance(u64::MAX / 2);

        assert!(!entry.is_expired());
        assert_eq!(entry.ttl_remaining_ms(), None);
        assert_eq!(entry.get().unwrap(), Some("forever".to_string()));
    }

    #[test]
    fn test_entry_stale_on_construction_is_evicted() {
        let (store, clock, options) = setup(Some(100));
        Entry::new("key", store.clone(), options.clone(), Some("old".to_string())).unwrap();

        clock.advance(500);
        let (expired, listener) = counting_listener();
        let entry = Entry::new("key", store.clone(), options.on_expire(listener), None).unwrap();

        assert!(!entry.has_value());
        assert_eq!(store.get_item("key").unwrap(), None);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entry_stale_on_construction_replaced_by_default() {
        let (store, clock, options) = setup(Some(100));
        Entry::new("key", store.clone(), options.clone(), Some("old".to_string())).unwrap();

        clock.advance(500);
        let mut entry = Entry::new("key", store, options, Some("new".to_string())).unwrap();

        assert_eq!(entry.get().unwrap(), Some("new".to_string()));
        assert_eq!(entry.saved_at_ms(), Some(START_MS + 500));
    }

    #[test]
    fn test_entry_expired_without_eviction_keeps_slot() {
        let (store, clock, options) = setup(Some(100));
        let (expired, listener) = counting_listener();
        let options = options.evict_on_expire(false).on_expire(listener);
        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();
        entry.set("value".to_string()).unwrap();

        clock.advance(101);

        assert_eq!(entry.get().unwrap(), None);
        assert!(entry.has_value());
        assert!(store.get_item("key").unwrap().is_some());
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_entry_peek_has_no_side_effects() {
        let (store, clock, options) = setup(Some(100));
        let (expired, listener) = counting_listener();
        let mut entry = Entry::new("key", store.clone(), options.on_expire(listener), None).unwrap();
        entry.set("value".to_string()).unwrap();

        assert_eq!(entry.peek(), Some(&"value".to_string()));

        clock.advance(101);
        assert_eq!(entry.peek(), None);
        assert!(store.get_item("key").unwrap().is_some());
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_entry_evict_if_expired_ignores_read_policy() {
        let (store, clock, options) = setup(Some(100));
        let mut entry =
            Entry::new("key", store.clone(), options.evict_on_expire(false), None).unwrap();
        entry.set("value".to_string()).unwrap();

        assert!(!entry.evict_if_expired().unwrap());

        clock.advance(101);
        assert!(entry.evict_if_expired().unwrap());
        assert!(!entry.has_value());
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_unset_removes_slot() {
        let (store, _, options) = setup(Some(100));
        let mut entry = Entry::new("key", store.clone(), options, Some("v".to_string())).unwrap();

        assert!(entry.unset().unwrap());

        assert_eq!(entry.get().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_load_picks_up_external_write() {
        let (store, _, options) = setup(Some(100));
        let mut reader = Entry::new("key", store.clone(), options.clone(), None).unwrap();
        let mut writer = Entry::new("key", store, options, None).unwrap();

        writer.set("external".to_string()).unwrap();
        assert_eq!(reader.get().unwrap(), None);

        assert!(reader.load().unwrap());
        assert_eq!(reader.get().unwrap(), Some("external".to_string()));
    }

    #[test]
    fn test_entry_load_missing_keeps_memory() {
        let (store, _, options) = setup(Some(100));
        let mut entry = Entry::new("key", store.clone(), options, Some("v".to_string())).unwrap();

        store.remove_item("key").unwrap();

        assert!(!entry.load().unwrap());
        assert_eq!(entry.get().unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_entry_malformed_slot_left_in_place() {
        let (store, _, options) = setup(Some(100));
        store.set_item("key", "not a record").unwrap();

        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();

        assert!(entry.load().unwrap());
        assert_eq!(entry.get().unwrap(), None);
        assert_eq!(store.get_item("key").unwrap(), Some("not a record".to_string()));
    }

    #[test]
    fn test_entry_null_store_is_memory_only() {
        let clock = Arc::new(ManualClock::new(START_MS));
        let options = CacheOptions::<String>::default().clock(clock);
        let mut entry = Entry::new("key", NullStore::shared(), options, None).unwrap();

        assert!(!entry.set("value".to_string()).unwrap());
        assert_eq!(entry.get().unwrap(), Some("value".to_string()));
        assert!(!entry.load().unwrap());
    }

    #[test]
    fn test_entry_store_error_propagates() {
        let options = CacheOptions::<String>::default();
        let mut entry = Entry::new("key", Arc::new(FailingStore), options, None).unwrap();

        let result = entry.set("value".to_string());
        assert!(matches!(result, Err(CacheError::Store(_))));
        // Cached in memory even though the write failed
        assert_eq!(entry.get().unwrap(), Some("value".to_string()));
    }

    #[test]
    fn test_entry_encode_error_leaves_state_untouched() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let options = CacheOptions::<HashMap<Vec<u8>, u32>>::default().clock(clock);
        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();

        // JSON object keys must be strings
        let result = entry.set(HashMap::from([(vec![1u8], 1)]));

        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert!(!entry.has_value());
        assert_eq!(entry.get().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_encode_error_keeps_previous_value() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let options = CacheOptions::<HashMap<Vec<u8>, u32>>::default().clock(clock);
        let mut entry = Entry::new("key", store.clone(), options, Some(HashMap::new())).unwrap();
        let before = store.get_item("key").unwrap();

        assert!(entry.set(HashMap::from([(vec![2u8], 2)])).is_err());

        assert_eq!(entry.get().unwrap(), Some(HashMap::new()));
        assert_eq!(store.get_item("key").unwrap(), before);
    }

    #[test]
    fn test_entry_obfuscated_slot() {
        let (store, _, options) = setup(Some(100));
        let options = options.obfuscation_offset(Some(42));
        let mut writer = Entry::new("key", store.clone(), options.clone(), None).unwrap();
        writer.set("secret".to_string()).unwrap();

        let raw = store.get_item("key").unwrap().unwrap();
        assert!(!raw.contains("secret"));
        assert!(!raw.contains("savedAtMs"));

        let mut reader = Entry::new("key", store, options, None).unwrap();
        assert_eq!(reader.get().unwrap(), Some("secret".to_string()));
    }

    #[test]
    fn test_entry_invalid_offset_disables_obfuscation() {
        let (store, _, options) = setup(Some(100));
        let options = options.obfuscation_offset(Some(OBFUSCATION_MODULUS));
        let mut entry = Entry::new("key", store.clone(), options, None).unwrap();
        entry.set("plain".to_string()).unwrap();

        let raw = store.get_item("key").unwrap().unwrap();
        assert!(raw.contains("\"plain\""));
    }

    #[test]
    fn test_entry_obfuscated_garbage_is_absent() {
        let (store, _, options) = setup(Some(100));
        store.set_item("key", "\u{1}\u{2}\u{3}").unwrap();

        let mut entry =
            Entry::new("key", store.clone(), options.obfuscation_offset(Some(9)), None).unwrap();

        assert_eq!(entry.get().unwrap(), None);
        assert_eq!(store.get_item("key").unwrap(), Some("\u{1}\u{2}\u{3}".to_string()));
    }
}
