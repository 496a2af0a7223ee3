//! Payload codecs and typed cache views.

use crate::manager::CacheManager;
use crate::types::CacheClass;
use quill_common::{QuillError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::warn;

/// Converts a payload type to and from cached bytes.
pub trait PayloadCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec for any serde type.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<T> PayloadCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| QuillError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| QuillError::Codec(e.to_string()))
    }
}

/// A view of one cache class with a statically known payload type.
///
/// Reads and writes go through both tiers.
pub struct TypedCache<'a, T, C = JsonCodec> {
    cache: &'a CacheManager,
    class: CacheClass,
    codec: C,
    _payload: PhantomData<fn() -> T>,
}

impl<'a, T, C> TypedCache<'a, T, C>
where
    C: PayloadCodec<T>,
{
    pub fn new(cache: &'a CacheManager, class: CacheClass, codec: C) -> Self {
        Self {
            cache,
            class,
            codec,
            _payload: PhantomData,
        }
    }

    pub fn class(&self) -> CacheClass {
        self.class
    }

    /// Read through both tiers. A payload that fails to decode is dropped
    /// and reported as a miss.
    pub async fn get(&self, id: &str) -> Option<T> {
        let bytes = self.cache.get_multi_tier(self.class, id).await?;
        match self.codec.decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(class = self.class.as_str(), id = %id, error = %e, "Dropping undecodable cache payload");
                self.cache.delete(self.class, id).await;
                None
            }
        }
    }

    /// Write to both tiers with the class TTL policy.
    pub async fn set(&self, id: &str, value: &T) -> bool {
        match self.codec.encode(value) {
            Ok(bytes) => self.cache.set_multi_tier(self.class, id, bytes).await,
            Err(e) => {
                warn!(class = self.class.as_str(), id = %id, error = %e, "Failed to encode cache payload");
                false
            }
        }
    }

    /// Write to the hot tier only, with an explicit TTL.
    pub async fn set_hot(&self, id: &str, value: &T, ttl: Duration) -> bool {
        match self.codec.encode(value) {
            Ok(bytes) => {
                self.cache
                    .set(self.class, id, bytes, crate::Tier::Hot, Some(ttl))
                    .await
            }
            Err(e) => {
                warn!(class = self.class.as_str(), id = %id, error = %e, "Failed to encode cache payload");
                false
            }
        }
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.cache.delete(self.class, id).await
    }
}
