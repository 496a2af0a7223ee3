//! Per-run metrics and statistics across runs.

use serde::{Deserialize, Serialize};

/// Counters for one run. Filled in as the run progresses, so a failed or
/// cancelled run still reports what it did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub topics_considered: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub generation_calls: u32,
    pub assessments: u32,
    pub regenerations: u32,
    pub cache_hits: u32,
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    /// Topic source and raw/topic index failures that did not stop the run
    pub non_fatal_failures: u32,
    pub duration_ms: u64,
}

/// Totals across every run of one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub runs: u64,
    pub published: u64,
    pub rejected: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Runs whose content came from reuse or the generation cache
    pub reused: u64,
    pub generated: u64,
    pub total_cost: f64,
}

impl WorkflowStats {
    /// Share of content-producing runs that avoided fresh generation, in percent.
    pub fn reuse_rate(&self) -> f64 {
        let produced = self.reused + self.generated;
        if produced == 0 {
            0.0
        } else {
            self.reused as f64 / produced as f64 * 100.0
        }
    }
}
