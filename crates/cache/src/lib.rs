//! Two-tier cache for Quill.
//!
//! Payloads are bytes keyed by content class and identifier. Every class
//! carries its own TTL policy for each tier:
//!
//! - **Hot tier**: process-local, bounded, lazily expired on read
//! - **Shared tier**: a larger store behind [`SharedBackend`], expected to be
//!   reachable from several processes
//!
//! ```text
//!   get_multi_tier ──► hot ──miss──► shared ──hit──► promote into hot
//!   set_multi_tier ──► hot (class hot TTL) + shared (class shared TTL)
//! ```
//!
//! Typed access goes through [`TypedCache`] with an explicit
//! [`PayloadCodec`] per class.

pub mod codec;
pub mod hot;
pub mod key;
pub mod manager;
pub mod shared;
pub mod types;

pub use codec::{JsonCodec, PayloadCodec, TypedCache};
pub use manager::{CacheManager, CacheStats, ClearReport, TierUtilization};
pub use shared::{InMemorySharedBackend, SharedBackend};
pub use types::{CacheClass, CacheConfig, CacheEntry, EvictionPolicy, Tier, TierTtl};
