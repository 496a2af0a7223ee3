//! Candidate topics and their canonical fingerprint.

use crate::{QuillError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound of the trend score scale.
pub const MAX_TREND_SCORE: f64 = 10.0;

/// A topic that content can be generated about.
///
/// Keywords are stored lower-cased in a sorted set, so the fingerprint does
/// not depend on the order they were supplied in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    keywords: BTreeSet<String>,
    category: String,
    trend_score: f64,
    #[serde(default)]
    context: serde_json::Map<String, serde_json::Value>,
}

impl Topic {
    pub fn new<I, S>(keywords: I, category: impl Into<String>, trend_score: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: BTreeSet<String> = keywords
            .into_iter()
            .map(|k| normalize_keyword(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(QuillError::InvalidTopic(
                "a topic needs at least one keyword".into(),
            ));
        }

        let category = category.into().trim().to_lowercase();
        if category.is_empty() {
            return Err(QuillError::InvalidTopic("category must not be empty".into()));
        }

        Ok(Self {
            keywords,
            category,
            trend_score: clamp_score(trend_score),
            context: serde_json::Map::new(),
        })
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Same topic with a different trend score. The fingerprint is unchanged.
    pub fn with_trend_score(mut self, trend_score: f64) -> Self {
        self.trend_score = clamp_score(trend_score);
        self
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn trend_score(&self) -> f64 {
        self.trend_score
    }

    pub fn context(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.context
    }

    /// `category + "_" + sorted(keywords).join("_")`
    pub fn fingerprint(&self) -> String {
        let joined: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        format!("{}_{}", self.category, joined.join("_"))
    }

    /// Space-separated keywords, the form used as a search query.
    pub fn query_string(&self) -> String {
        let joined: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        joined.join(" ")
    }

    /// Keywords joined for prompts, e.g. "bitcoin, budget".
    pub fn display_keywords(&self) -> String {
        let joined: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        joined.join(", ")
    }
}

fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_TREND_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_independent() {
        let a = Topic::new(["savings", "Budget", "debt"], "finance", 5.0).unwrap();
        let b = Topic::new(["debt", "savings", "budget"], "finance", 5.0).unwrap();
        let c = Topic::new(["budget", "debt", "savings"], "finance", 5.0).unwrap();

        assert_eq!(a.fingerprint(), "finance_budget_debt_savings");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_trend_score() {
        let a = Topic::new(["bitcoin"], "finance", 9.0).unwrap();
        let b = a.clone().with_trend_score(2.5);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.trend_score(), b.trend_score());
    }

    #[test]
    fn keywords_are_normalized() {
        let topic = Topic::new(["  Real   Estate ", "REAL ESTATE"], "Finance", 3.0).unwrap();
        assert_eq!(topic.keywords().len(), 1);
        assert_eq!(topic.fingerprint(), "finance_real estate");
    }

    #[test]
    fn empty_keywords_rejected() {
        assert!(Topic::new(Vec::<String>::new(), "finance", 1.0).is_err());
        assert!(Topic::new(["  "], "finance", 1.0).is_err());
        assert!(Topic::new(["bitcoin"], " ", 1.0).is_err());
    }

    #[test]
    fn trend_score_is_clamped() {
        assert_eq!(Topic::new(["a"], "c", 42.0).unwrap().trend_score(), 10.0);
        assert_eq!(Topic::new(["a"], "c", -3.0).unwrap().trend_score(), 0.0);
        assert_eq!(Topic::new(["a"], "c", f64::NAN).unwrap().trend_score(), 0.0);
    }

    #[test]
    fn serde_roundtrip_keeps_fingerprint() {
        let topic = Topic::new(["stocks", "bonds"], "investing", 7.0)
            .unwrap()
            .with_context("mention_count", serde_json::json!(14));
        let json = serde_json::to_string(&topic).unwrap();
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fingerprint(), topic.fingerprint());
        assert_eq!(back.context()["mention_count"], 14);
    }
}
