//! Placeholder store for environments without a durable medium.

use std::sync::Arc;

use crate::error::Result;
use crate::store::{KvStore, SharedStore};

// == Null Store ==
/// Reports itself unavailable. Reads find nothing and writes are dropped,
/// so entries over it behave as a memory-only cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl NullStore {
    /// Returns a shared handle to a null store.
    pub fn shared() -> SharedStore {
        Arc::new(NullStore)
    }
}

impl KvStore for NullStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}
