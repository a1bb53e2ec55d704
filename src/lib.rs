//! Cachable - TTL-expiring cache entries over a pluggable key-value store
//!
//! An [`Entry`] mirrors one value into one storage slot and forgets it once it
//! is older than its max age. A [`Group`] manages many entries under a shared
//! namespace and configuration.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheOptions, CachedRecord, Entry, Group};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{FileStore, KvStore, MemoryStore, NullStore, SharedStore};
