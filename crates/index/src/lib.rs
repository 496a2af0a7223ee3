//! Knowledge index for Quill.
//!
//! [`KnowledgeIndex`] is the contract the orchestration engine searches,
//! aggregates trends from, and writes finished content through.
//! [`InMemoryIndex`] implements it in-process with:
//!
//! - weighted full-text relevance (title 3, body 2, key insights 2) plus a
//!   boost for domain terms
//! - fingerprint-vector cosine similarity over processed content
//! - time-windowed trend aggregation over raw documents

pub mod fingerprint;
pub mod index;
pub mod lock;
pub mod memory;
pub mod terms;
pub mod types;

pub use index::KnowledgeIndex;
pub use lock::FileLock;
pub use memory::InMemoryIndex;
pub use types::{BatchReport, IndexConfig, IndexStats, SearchFilters, SimilarityHit};
