//! The article aggregate and its lifecycle.

use crate::content::{Content, ContentStyle, QualityMetrics};
use crate::topic::Topic;
use crate::{QuillError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique article identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Generated,
    Assessed,
    Regenerating,
    Approved,
    Published,
    Rejected,
    Failed,
    Cancelled,
}

impl ArticleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Published | Self::Rejected | Self::Failed | Self::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Assessed => "assessed",
            Self::Regenerating => "regenerating",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        match (self, next) {
            (from, Failed | Cancelled) => !from.is_terminal(),
            (Draft, Generated) => true,
            (Generated | Regenerating, Assessed) => true,
            (Assessed, Regenerating | Approved | Rejected) => true,
            (Approved, Published) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof that an article's processed content reached the knowledge index.
///
/// Publishing requires one, so an article that was never indexed cannot be
/// marked published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReceipt {
    pub article_id: ArticleId,
    pub indexed_at: DateTime<Utc>,
}

impl IndexReceipt {
    pub fn new(article_id: ArticleId, indexed_at: DateTime<Utc>) -> Self {
        Self {
            article_id,
            indexed_at,
        }
    }
}

/// Article aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub topic: Topic,
    pub content: Option<Content>,
    pub status: ArticleStatus,
    pub style: ContentStyle,
    pub quality_metrics: Option<QualityMetrics>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn draft(topic: Topic, style: ContentStyle) -> Self {
        Self {
            id: ArticleId::new(),
            topic,
            content: None,
            status: ArticleStatus::Draft,
            style,
            quality_metrics: None,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    /// Create an article whose content already exists (fresh or reused).
    pub fn generated(topic: Topic, style: ContentStyle, content: Content) -> Self {
        let mut article = Self::draft(topic, style);
        article.content = Some(content);
        article.status = ArticleStatus::Generated;
        article
    }

    fn transition(&mut self, next: ArticleStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(QuillError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.title.as_str())
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.quality_metrics.as_ref().map(QualityMetrics::overall_score)
    }

    pub fn record_assessment(&mut self, metrics: QualityMetrics) -> Result<()> {
        if self.content.is_none() {
            return Err(QuillError::Assessment(
                "cannot assess an article without content".into(),
            ));
        }
        self.transition(ArticleStatus::Assessed)?;
        self.quality_metrics = Some(metrics);
        Ok(())
    }

    pub fn begin_regeneration(&mut self) -> Result<()> {
        self.transition(ArticleStatus::Regenerating)
    }

    /// Swap in regenerated content. Only valid while regenerating.
    pub fn replace_content(&mut self, content: Content) -> Result<()> {
        if self.status != ArticleStatus::Regenerating {
            return Err(QuillError::InvalidTransition {
                from: self.status.to_string(),
                to: "content replacement".into(),
            });
        }
        self.content = Some(content);
        Ok(())
    }

    pub fn approve(&mut self, threshold: f64) -> Result<()> {
        match self.overall_score() {
            Some(score) if score >= threshold => self.transition(ArticleStatus::Approved),
            Some(score) => Err(QuillError::InvalidTransition {
                from: format!("{} (score {score:.2} below {threshold:.2})", self.status),
                to: ArticleStatus::Approved.to_string(),
            }),
            None => Err(QuillError::InvalidTransition {
                from: format!("{} (unassessed)", self.status),
                to: ArticleStatus::Approved.to_string(),
            }),
        }
    }

    pub fn reject(&mut self) -> Result<()> {
        self.transition(ArticleStatus::Rejected)
    }

    pub fn publish(&mut self, receipt: &IndexReceipt) -> Result<()> {
        if receipt.article_id != self.id {
            return Err(QuillError::InvalidTransition {
                from: format!("{} (receipt for {})", self.status, receipt.article_id),
                to: ArticleStatus::Published.to_string(),
            });
        }
        self.transition(ArticleStatus::Published)?;
        self.published_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the article failed. No-op when it is already terminal.
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = ArticleStatus::Failed;
        }
    }

    /// Mark the article cancelled. No-op when it is already terminal.
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = ArticleStatus::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        let topic = Topic::new(["bitcoin"], "finance", 9.0).unwrap();
        let content = Content {
            title: "Bitcoin".into(),
            ..Default::default()
        };
        Article::generated(topic, ContentStyle::default(), content)
    }

    #[test]
    fn approve_then_publish() {
        let mut a = article();
        a.record_assessment(QualityMetrics::new(9.0, 9.0, 9.0, 9.0, 9.0))
            .unwrap();
        a.approve(8.0).unwrap();
        let receipt = IndexReceipt::new(a.id.clone(), Utc::now());
        a.publish(&receipt).unwrap();
        assert_eq!(a.status, ArticleStatus::Published);
        assert!(a.published_at.is_some());
    }

    #[test]
    fn cannot_publish_without_approval() {
        let mut a = article();
        let receipt = IndexReceipt::new(a.id.clone(), Utc::now());
        assert!(a.publish(&receipt).is_err());
        assert!(a.published_at.is_none());
    }

    #[test]
    fn receipt_must_match_article() {
        let mut a = article();
        a.record_assessment(QualityMetrics::new(9.0, 9.0, 9.0, 9.0, 9.0))
            .unwrap();
        a.approve(8.0).unwrap();
        let receipt = IndexReceipt::new(ArticleId::new(), Utc::now());
        assert!(a.publish(&receipt).is_err());
        assert_eq!(a.status, ArticleStatus::Approved);
    }

    #[test]
    fn approval_requires_threshold() {
        let mut a = article();
        a.record_assessment(QualityMetrics::new(5.0, 5.0, 5.0, 5.0, 5.0))
            .unwrap();
        assert!(a.approve(8.0).is_err());
        assert_eq!(a.status, ArticleStatus::Assessed);
    }

    #[test]
    fn regeneration_cycle() {
        let mut a = article();
        a.record_assessment(QualityMetrics::new(5.0, 5.0, 5.0, 5.0, 5.0))
            .unwrap();
        a.begin_regeneration().unwrap();
        a.replace_content(Content {
            title: "Better".into(),
            ..Default::default()
        })
        .unwrap();
        a.record_assessment(QualityMetrics::new(9.0, 9.0, 9.0, 9.0, 9.0))
            .unwrap();
        assert_eq!(a.title(), Some("Better"));
        assert_eq!(a.status, ArticleStatus::Assessed);
    }

    #[test]
    fn replace_content_outside_regeneration_fails() {
        let mut a = article();
        assert!(a.replace_content(Content::default()).is_err());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut a = article();
        a.cancel();
        assert_eq!(a.status, ArticleStatus::Cancelled);
        a.fail();
        assert_eq!(a.status, ArticleStatus::Cancelled);
        assert!(a.record_assessment(QualityMetrics::new(9.0, 9.0, 9.0, 9.0, 9.0)).is_err());
    }
}
