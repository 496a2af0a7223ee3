//! Common types and traits shared across Quill crates.
//!
//! This crate provides the domain model (topics, content, articles), the
//! error taxonomy, and the collaborator traits the orchestration engine is
//! written against.

pub mod article;
pub mod content;
pub mod error;
pub mod search;
pub mod signal;
pub mod topic;
pub mod traits;

pub use article::{Article, ArticleId, ArticleStatus, IndexReceipt};
pub use content::{Content, ContentStyle, QualityDimension, QualityMetrics};
pub use error::{QuillError, Result};
pub use search::{ContentClass, RawDocument, SearchResult};
pub use signal::{CancelSignal, Clock, ManualClock, SystemClock};
pub use topic::Topic;
pub use traits::{Assessor, Generator, StaticTopicSource, TopicSource};
