//! Store Module
//!
//! The durable key-value medium that cache entries persist into.
//!
//! Entries only need three operations on plain strings plus an availability
//! probe, so any backend (a map in memory, a JSON file, an external service)
//! can sit behind [`KvStore`].

mod file;
mod memory;
mod null;

use std::sync::Arc;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use null::NullStore;

// == KvStore Trait ==
/// A synchronous string key-value store.
///
/// Errors returned from any method are propagated to the caller of the cache
/// operation that triggered them.
pub trait KvStore: Send + Sync {
    /// Returns the text stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous text.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Whether a durable medium is present at all.
    ///
    /// When this returns false, entries keep values in memory only.
    fn is_available(&self) -> bool {
        true
    }
}

/// A store handle shared by every entry that writes into it.
pub type SharedStore = Arc<dyn KvStore>;
