//! Topic deduplication and composite ranking.

use quill_common::{QuillError, Result, Topic};
use quill_index::SearchFilters;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::search::CachedSearch;

const TREND_WEIGHT: f64 = 0.4;
const GAP_WEIGHT: f64 = 0.3;
const ENGAGEMENT_WEIGHT: f64 = 0.3;

/// Search hits counted when measuring how much content already exists.
const EXISTING_CONTENT_LIMIT: usize = 10;

pub const DEFAULT_ENGAGEMENT: f64 = 6.0;

/// Audience engagement weight for a keyword.
pub fn keyword_engagement(keyword: &str) -> f64 {
    match keyword {
        "cryptocurrency" | "bitcoin" => 9.0,
        "investment" | "real estate" => 8.5,
        "retirement" | "debt" | "stocks" => 8.0,
        "budget" => 7.5,
        "savings" => 7.0,
        _ => DEFAULT_ENGAGEMENT,
    }
}

/// Mean keyword engagement of a topic.
pub fn engagement_potential(topic: &Topic) -> f64 {
    let keywords = topic.keywords();
    if keywords.is_empty() {
        return DEFAULT_ENGAGEMENT;
    }
    keywords.iter().map(|k| keyword_engagement(k)).sum::<f64>() / keywords.len() as f64
}

/// Collapse topics sharing a fingerprint, keeping the highest trend score.
/// Survivors keep the position their fingerprint was first seen at.
pub fn dedup(topics: impl IntoIterator<Item = Topic>) -> Vec<Topic> {
    let mut unique: Vec<Topic> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for topic in topics {
        match positions.get(&topic.fingerprint()) {
            Some(&pos) => {
                if topic.trend_score() > unique[pos].trend_score() {
                    unique[pos] = topic;
                }
            }
            None => {
                positions.insert(topic.fingerprint(), unique.len());
                unique.push(topic);
            }
        }
    }
    unique
}

/// A candidate with the parts of its composite score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTopic {
    pub topic: Topic,
    pub existing: usize,
    pub engagement: f64,
    pub composite: f64,
}

pub struct TopicRanker {
    search: CachedSearch,
    candidate_cap: usize,
}

impl TopicRanker {
    pub fn new(search: CachedSearch, candidate_cap: usize) -> Self {
        Self {
            search,
            candidate_cap: candidate_cap.max(1),
        }
    }

    /// Deduplicate and keep the `candidate_cap` highest-trend topics.
    pub fn shortlist(&self, topics: impl IntoIterator<Item = Topic>) -> Vec<Topic> {
        let mut unique = dedup(topics);
        unique.sort_by(|a, b| b.trend_score().total_cmp(&a.trend_score()));
        unique.truncate(self.candidate_cap);
        unique
    }

    async fn score(&self, topic: Topic) -> Result<RankedTopic> {
        let filters = SearchFilters::default().category(topic.category());
        let existing = self
            .search
            .search(&topic.query_string(), &filters, EXISTING_CONTENT_LIMIT)
            .await?
            .len();
        let engagement = engagement_potential(&topic);
        let gap = (10.0 - existing as f64).max(0.0);
        let composite =
            TREND_WEIGHT * topic.trend_score() + GAP_WEIGHT * gap + ENGAGEMENT_WEIGHT * engagement;

        debug!(
            fingerprint = %topic.fingerprint(),
            trend = topic.trend_score(),
            existing,
            engagement,
            composite,
            "Scored topic"
        );
        Ok(RankedTopic {
            topic,
            existing,
            engagement,
            composite,
        })
    }

    /// Shortlist `topics` and pick the best composite score. Ties go to the
    /// lexicographically smallest fingerprint.
    #[instrument(skip(self, topics))]
    pub async fn select(&self, topics: Vec<Topic>) -> Result<RankedTopic> {
        let shortlist = self.shortlist(topics);
        if shortlist.is_empty() {
            return Err(QuillError::NoTopicsAvailable);
        }

        let mut best: Option<RankedTopic> = None;
        for topic in shortlist {
            let ranked = self.score(topic).await?;
            let better = match &best {
                None => true,
                Some(current) => match ranked.composite.total_cmp(&current.composite) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Equal => {
                        ranked.topic.fingerprint() < current.topic.fingerprint()
                    }
                    std::cmp::Ordering::Less => false,
                },
            };
            if better {
                best = Some(ranked);
            }
        }

        let selected = best.ok_or(QuillError::NoTopicsAvailable)?;
        info!(
            fingerprint = %selected.topic.fingerprint(),
            trend_score = selected.topic.trend_score(),
            composite = selected.composite,
            "Topic selected"
        );
        Ok(selected)
    }
}
