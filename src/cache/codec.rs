//! Codec Module
//!
//! Serializer/deserializer hooks that turn records into slot text and back.
//!
//! Decoding returns `Ok(None)` for "unreadable, treat as absent" and `Err` for
//! failures the caller of `load` must see. The built-in codecs are lenient:
//! malformed text is logged and read as absent.

use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::cache::CachedRecord;
use crate::error::Result;

// == Codec Trait ==
pub trait Codec<T>: Send + Sync {
    /// Encodes a record as slot text.
    fn encode(&self, record: &CachedRecord<T>) -> Result<String>;

    /// Decodes slot text. `Ok(None)` means the text is unusable.
    fn decode(&self, text: &str) -> Result<Option<CachedRecord<T>>>;
}

// == JSON Codec ==
/// The default codec: plain `serde_json`.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, record: &CachedRecord<T>) -> Result<String> {
        Ok(serde_json::to_string(record)?)
    }

    fn decode(&self, text: &str) -> Result<Option<CachedRecord<T>>> {
        match serde_json::from_str(text) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!("Ignoring unreadable cached record: {}", err);
                Ok(None)
            }
        }
    }
}

// == Mapped Codec ==
/// JSON codec for values that need a stand-in representation on the wire,
/// e.g. a custom set type stored as an array of strings.
pub struct MappedCodec<T, W, F, G> {
    to_wire: F,
    from_wire: G,
    _marker: PhantomData<fn(W) -> T>,
}

impl<T, W, F, G> MappedCodec<T, W, F, G>
where
    F: Fn(&T) -> W,
    G: Fn(W) -> T,
{
    pub fn new(to_wire: F, from_wire: G) -> Self {
        Self {
            to_wire,
            from_wire,
            _marker: PhantomData,
        }
    }
}

impl<T, W, F, G> Codec<T> for MappedCodec<T, W, F, G>
where
    W: Serialize + DeserializeOwned,
    F: Fn(&T) -> W + Send + Sync,
    G: Fn(W) -> T + Send + Sync,
{
    fn encode(&self, record: &CachedRecord<T>) -> Result<String> {
        let wire = CachedRecord::new((self.to_wire)(&record.value), record.saved_at_ms);
        Ok(serde_json::to_string(&wire)?)
    }

    fn decode(&self, text: &str) -> Result<Option<CachedRecord<T>>> {
        match serde_json::from_str::<CachedRecord<W>>(text) {
            Ok(wire) => Ok(Some(CachedRecord::new(
                (self.from_wire)(wire.value),
                wire.saved_at_ms,
            ))),
            Err(err) => {
                warn!("Ignoring unreadable cached record: {}", err);
                Ok(None)
            }
        }
    }
}

// == Fn Codec ==
/// Codec built from a pair of closures. The decoder decides whether bad text
/// is absent (`Ok(None)`) or an error.
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    E: Fn(&CachedRecord<T>) -> Result<String> + Send + Sync,
    D: Fn(&str) -> Result<Option<CachedRecord<T>>> + Send + Sync,
{
    fn encode(&self, record: &CachedRecord<T>) -> Result<String> {
        (self.encode)(record)
    }

    fn decode(&self, text: &str) -> Result<Option<CachedRecord<T>>> {
        (self.decode)(text)
    }
}
