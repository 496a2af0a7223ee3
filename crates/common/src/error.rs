//! Error types for Quill.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuillError {
    /// Network-classified failure on a Generator/Assessor call. Retried with
    /// backoff before it escalates to [`QuillError::Generation`].
    #[error("Transient collaborator error: {0}")]
    TransientCollaborator(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Assessment failed: {0}")]
    Assessment(String),

    #[error("Cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),

    #[error("Knowledge index unavailable: {0}")]
    IndexBackendUnavailable(String),

    #[error("No topics available for selection")]
    NoTopicsAvailable,

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Invalid article transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("A workflow run is already in progress")]
    RunInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuillError {
    /// Stable classification reported in run results and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientCollaborator(_) => "transient_collaborator",
            Self::Generation(_) => "generation_failure",
            Self::Assessment(_) => "assessment_failure",
            Self::CacheBackendUnavailable(_) => "cache_backend_unavailable",
            Self::IndexBackendUnavailable(_) => "index_backend_unavailable",
            Self::NoTopicsAvailable => "no_topics_available",
            Self::InvalidTopic(_) => "invalid_topic",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Cancelled => "cancelled",
            Self::RunInProgress => "run_in_progress",
            Self::Config(_) => "config",
            Self::Codec(_) => "codec",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientCollaborator(_))
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
