//! Cachable demo
//!
//! Stores a value in a cache group, reads it back, and reports what the
//! backing store holds.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachable::{Config, Group, KvStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoItem {
    test: String,
}

/// Demo entry point.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured store and an indexed group
/// 4. Write an item, read it back, list the indexed keys
fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachable=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: namespace={}, max_age_ms={:?}, obfuscation_offset={:?}, store={:?}",
        config.namespace, config.max_age_ms, config.obfuscation_offset, config.store_path
    );

    let store = config.open_store().context("failed to open store")?;
    let mut group: Group<DemoItem> =
        Group::with_index(&config.namespace, store.clone(), config.cache_options())
            .context("failed to open cache group")?;

    let item = DemoItem {
        test: "test".to_string(),
    };
    group.set_item("test2", Some(item))?;

    let cached = group.get_item("test2")?;
    info!("Read back {:?}", cached);

    let purged = group.purge_expired()?;
    info!("Indexed keys: {:?} ({} purged)", group.keys(), purged);

    for key in group.keys() {
        let raw = store.get_item(&key)?;
        info!("Slot '{}' holds {:?}", key, raw);
    }

    Ok(())
}
