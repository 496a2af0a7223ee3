//! The Quill orchestration engine.
//!
//! A run ranks candidate topics, decides whether existing content can be
//! reused, produces content, refines it until it clears the quality bar (or
//! runs out of attempts) and publishes it through the knowledge index.
//!
//! ```text
//!   TopicRanker ─► SimilarityGate ─► ContentComposer ─► QualityGate ─► publish
//! ```
//!
//! [`Scheduler`] triggers runs on a schedule or on demand and guarantees at
//! most one is in flight. [`AppContext`] wires concrete collaborators from a
//! [`QuillConfig`].

pub mod compose;
pub mod config;
pub mod context;
pub mod metrics;
pub mod quality;
pub mod ranker;
pub mod scheduler;
pub mod schema;
pub mod search;
pub mod similarity;
pub mod sink;
pub mod templates;
pub mod variation;
pub mod workflow;

pub use compose::{Composition, ContentComposer, Origin};
pub use config::{LlmSection, QuillConfig, SchedulerConfig, SeedTopic, SinkConfig, WorkflowConfig};
pub use context::AppContext;
pub use metrics::{RunMetrics, WorkflowStats};
pub use quality::{QualityGate, Verdict};
pub use ranker::{RankedTopic, TopicRanker};
pub use scheduler::{Schedule, Scheduler};
pub use schema::{article_properties, validate_schema, PropertyKind, SchemaIssue};
pub use search::CachedSearch;
pub use similarity::{Route, SimilarityGate};
pub use sink::{ArticleSink, DirectorySink};
pub use templates::ContentTemplate;
pub use variation::{FixedVariation, SeededVariation, VariationStrategy};
pub use workflow::{RunError, Workflow, WorkflowBuilder, WorkflowResult};
