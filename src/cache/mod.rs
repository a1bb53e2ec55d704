//! Cache Module
//!
//! TTL-bounded entries persisted into a [`KvStore`](crate::store::KvStore),
//! and groups that manage many entries under one namespace.

mod clock;
mod codec;
mod entry;
mod group;
mod obfuscate;
mod options;
mod record;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use codec::{Codec, FnCodec, JsonCodec, MappedCodec};
pub use entry::Entry;
pub use group::Group;
pub use obfuscate::{deobfuscate, is_valid_offset, obfuscate, OBFUSCATION_MODULUS};
pub use options::{CacheOptions, ExpiryListener};
pub use record::CachedRecord;

// == Public Constants ==
/// Max age applied when none is configured: one hour
pub const DEFAULT_MAX_AGE_MS: u64 = 60 * 60 * 1000;
