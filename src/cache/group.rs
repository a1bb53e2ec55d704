//! Cache Group Module
//!
//! A namespace of independently expiring entries sharing one configuration.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::cache::{CacheOptions, Entry, ExpiryListener};
use crate::error::Result;
use crate::store::SharedStore;

// == Eviction Queue ==
/// Collects storage keys of entries that evicted themselves, until the group
/// settles them. Forwards each notification to the caller's own listener.
struct EvictionQueue {
    pending: Mutex<Vec<String>>,
    forward: Option<Arc<dyn ExpiryListener>>,
}

impl EvictionQueue {
    fn new(forward: Option<Arc<dyn ExpiryListener>>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            forward,
        }
    }

    fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }
}

impl ExpiryListener for EvictionQueue {
    fn on_expired(&self, key: &str) {
        // Keys are kept even if a previous holder panicked
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        if let Some(forward) = &self.forward {
            forward.on_expired(key);
        }
    }
}

// == Cache Group ==
/// Entries under `namespace`, created on first use.
///
/// Items live in the store under `"{namespace}-{lowercased key}"`. A group
/// built with [`Group::with_index`] also persists the set of item keys that
/// exist, under the namespace itself, so a fresh group can enumerate them.
pub struct Group<T> {
    /// Lower-cased namespace
    namespace: String,
    /// Backing store shared with every entry
    store: SharedStore,
    /// Options cloned into each new entry, wired to `evictions`
    options: CacheOptions<T>,
    /// Tracked entries by storage key
    entries: HashMap<String, Entry<T>>,
    /// Keys reported by self-evicting entries
    evictions: Arc<EvictionQueue>,
    /// Persisted set of existing storage keys
    index: Option<Entry<BTreeSet<String>>>,
    /// Evictions settled so far
    evicted: usize,
}

impl<T> Group<T> {
    // == Constructor ==
    /// Creates a group without a persisted index. Does no storage I/O.
    pub fn new(namespace: &str, store: SharedStore, mut options: CacheOptions<T>) -> Self {
        let evictions = Arc::new(EvictionQueue::new(options.on_expire.take()));
        let listener: Arc<dyn ExpiryListener> = evictions.clone();
        options.on_expire = Some(listener);

        Self {
            namespace: namespace.to_lowercase(),
            store,
            options,
            entries: HashMap::new(),
            evictions,
            index: None,
            evicted: 0,
        }
    }

    /// Creates a group that keeps a persisted index of its item keys,
    /// loading (or seeding) it from the store.
    pub fn with_index(
        namespace: &str,
        store: SharedStore,
        options: CacheOptions<T>,
    ) -> Result<Self> {
        let mut group = Self::new(namespace, store, options);

        let index_options = CacheOptions::<BTreeSet<String>>::default()
            .max_age_ms(None)
            .obfuscation_offset(group.options.obfuscation_offset)
            .clock(group.options.clock.clone());
        let index = Entry::new(
            group.namespace.clone(),
            group.store.clone(),
            index_options,
            Some(BTreeSet::new()),
        )?;
        debug!(
            "Opened index for group '{}' with {} keys",
            group.namespace,
            index.peek().map_or(0, BTreeSet::len)
        );

        group.index = Some(index);
        Ok(group)
    }

    // == Item Cache Key ==
    /// Storage key for a logical key: `"{namespace}-{lowercased key}"`.
    pub fn item_cache_key(&self, key: &str) -> String {
        format!("{}-{}", self.namespace, key.to_lowercase())
    }

    // == Accessors ==
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of entries currently tracked in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry object is held for the logical key.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.entries.contains_key(&self.item_cache_key(key))
    }

    /// Total entries that expired and were dropped from this group.
    pub fn evictions(&self) -> usize {
        self.evicted
    }

    /// Storage keys listed in the index, sorted. Empty without an index.
    pub fn keys(&self) -> Vec<String> {
        self.index
            .as_ref()
            .and_then(Entry::peek)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    // == Set Item ==
    /// Stores `value` under `key`; `None` deletes the item.
    pub fn set_item(&mut self, key: &str, value: Option<T>) -> Result<()> {
        let Some(value) = value else {
            return self.delete_item(key);
        };

        let storage_key = self.item_cache_key(key);
        let mut entry = match self.entries.remove(&storage_key) {
            Some(entry) => entry,
            None => self.create_entry(&storage_key)?.0,
        };
        let saved = entry.set(value);
        self.entries.insert(storage_key.clone(), entry);
        saved?;

        self.update_index(|keys| keys.insert(storage_key))
    }

    // == Delete Item ==
    /// Forgets the item and removes its durable slot.
    pub fn delete_item(&mut self, key: &str) -> Result<()> {
        let storage_key = self.item_cache_key(key);

        match self.entries.remove(&storage_key) {
            Some(mut entry) => {
                entry.unset()?;
            }
            None if self.store.is_available() => self.store.remove_item(&storage_key)?,
            None => {}
        }

        self.update_index(|keys| keys.remove(&storage_key))
    }

    // == Reload ==
    /// Re-reads the index and every tracked entry from the store.
    pub fn reload(&mut self) -> Result<()> {
        if let Some(index) = &mut self.index {
            index.load()?;
        }
        for entry in self.entries.values_mut() {
            entry.load()?;
        }
        debug!("Reloaded group '{}' ({} entries)", self.namespace, self.entries.len());
        Ok(())
    }

    // == Purge Expired ==
    /// Evicts every stale item the group knows about, indexed or tracked.
    ///
    /// Index entries whose slot no longer exists are dropped. Returns the
    /// number of items evicted.
    pub fn purge_expired(&mut self) -> Result<usize> {
        let before = self.evicted;
        let mut candidates: BTreeSet<String> = self.keys().into_iter().collect();
        candidates.extend(self.entries.keys().cloned());

        let mut dangling = Vec::new();
        for storage_key in candidates {
            // Untracked when opening already evicted it
            let Some(entry) = self.open_entry(&storage_key)? else {
                continue;
            };
            if !entry.evict_if_expired()? && !entry.has_value() {
                dangling.push(storage_key);
            }
        }
        self.settle_evictions()?;

        if !dangling.is_empty() {
            for storage_key in &dangling {
                self.entries.remove(storage_key);
            }
            self.update_index(|keys| {
                dangling
                    .iter()
                    .fold(false, |changed, key| keys.remove(key) || changed)
            })?;
        }

        let removed = self.evicted - before;
        debug!("Purged {} expired entries from group '{}'", removed, self.namespace);
        Ok(removed)
    }

    /// Returns the tracked entry for `storage_key`, creating it on first use.
    ///
    /// Returns `None` when the new entry evicted a stale slot while opening.
    /// Such an entry is not tracked, so the next access opens a new one.
    fn open_entry(&mut self, storage_key: &str) -> Result<Option<&mut Entry<T>>> {
        if !self.entries.contains_key(storage_key) {
            let (entry, evicted) = self.create_entry(storage_key)?;
            if evicted {
                return Ok(None);
            }
            debug!("Tracking '{}' in group '{}'", storage_key, self.namespace);
            self.entries.insert(storage_key.to_string(), entry);
        }

        Ok(self.entries.get_mut(storage_key))
    }

    /// Builds an untracked entry and settles any eviction it caused. The flag
    /// is set when the entry evicted its own stale slot.
    fn create_entry(&mut self, storage_key: &str) -> Result<(Entry<T>, bool)> {
        let created = Entry::new(storage_key, self.store.clone(), self.options.clone(), None);
        let expired = self.settle_evictions()?;
        let evicted = expired.iter().any(|key| key == storage_key);
        Ok((created?, evicted))
    }

    /// Drops entries that reported expiry from the map and the index.
    /// Returns the settled storage keys.
    fn settle_evictions(&mut self) -> Result<Vec<String>> {
        let expired = self.evictions.drain();
        if expired.is_empty() {
            return Ok(expired);
        }

        for storage_key in &expired {
            self.entries.remove(storage_key);
        }
        self.evicted += expired.len();

        self.update_index(|keys| {
            expired
                .iter()
                .fold(false, |changed, key| keys.remove(key) || changed)
        })?;
        Ok(expired)
    }

    /// Applies `change` to the index and persists it if `change` reports a
    /// modification. No-op without an index.
    fn update_index(
        &mut self,
        change: impl FnOnce(&mut BTreeSet<String>) -> bool,
    ) -> Result<()> {
        let Some(index) = &mut self.index else {
            return Ok(());
        };

        let mut keys = index.peek().cloned().unwrap_or_default();
        if change(&mut keys) {
            index.set(keys)?;
        }
        Ok(())
    }
}

impl<T: Clone> Group<T> {
    // == Get Item ==
    /// Returns the fresh value stored under `key`, if any.
    ///
    /// A stale value is evicted by its entry and the entry is dropped from
    /// the group, so the next call starts from a new entry.
    pub fn get_item(&mut self, key: &str) -> Result<Option<T>> {
        let storage_key = self.item_cache_key(key);
        let Some(entry) = self.open_entry(&storage_key)? else {
            return Ok(None);
        };
        let value = entry.get();
        self.settle_evictions()?;

        let value = value?;
        if value.is_some() {
            self.update_index(|keys| keys.insert(storage_key))?;
        }
        Ok(value)
    }
}

impl<T> fmt::Debug for Group<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("namespace", &self.namespace)
            .field("options", &self.options)
            .field("tracked", &self.entries.len())
            .field("indexed", &self.index.is_some())
            .finish()
    }
}
