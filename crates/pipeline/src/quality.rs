//! The generate-assess-regenerate loop.

use quill_common::{
    Article, Assessor, CancelSignal, Content, Generator, QualityDimension, QualityMetrics, Result,
};
use quill_llm::{with_backoff, Collaborator, RetryConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::compose::truncate_chars;
use crate::metrics::RunMetrics;

pub const REGENERATE_MAX_TOKENS: u32 = 1500;
pub const REGENERATE_TEMPERATURE: f32 = 0.7;

const REGENERATE_EXCERPT_CHARS: usize = 1000;
const INTRO_CHARS: usize = 300;

/// Outcome of quality gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    /// Still below the threshold after every allowed regeneration.
    BelowThreshold,
}

impl Verdict {
    pub fn kind(self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::BelowThreshold => "quality_below_threshold",
        }
    }
}

/// Rebuild content from a rewrite: the first line is the title, the rest the
/// body. Conclusion, insights and steps carry over.
fn apply_rewrite(previous: &Content, rewrite: &str) -> Content {
    let mut lines = rewrite.trim().lines();
    let title = lines
        .next()
        .map(|l| l.trim_start_matches('#').trim())
        .filter(|l| !l.is_empty())
        .unwrap_or(previous.title.as_str())
        .to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    let body = if body.is_empty() {
        rewrite.trim().to_string()
    } else {
        body
    };

    Content {
        title,
        introduction: truncate_chars(&body, INTRO_CHARS).to_string(),
        main_content: body,
        conclusion: previous.conclusion.clone(),
        key_insights: previous.key_insights.clone(),
        actionable_steps: previous.actionable_steps.clone(),
    }
}

pub struct QualityGate {
    assessor: Arc<dyn Assessor>,
    generator: Arc<dyn Generator>,
    threshold: f64,
    max_regeneration_attempts: u32,
    retry: RetryConfig,
}

impl QualityGate {
    pub fn new(
        assessor: Arc<dyn Assessor>,
        generator: Arc<dyn Generator>,
        threshold: f64,
        max_regeneration_attempts: u32,
    ) -> Self {
        Self {
            assessor,
            generator,
            threshold,
            max_regeneration_attempts,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn score(&self, dimension: QualityDimension, content: &Content) -> Result<f64> {
        let assessor = &self.assessor;
        with_backoff(&self.retry, Collaborator::Assessor, dimension.as_str(), move || {
            assessor.score(dimension, content)
        })
        .await
    }

    /// Score all five dimensions concurrently.
    pub async fn assess(&self, content: &Content) -> Result<QualityMetrics> {
        let (readability, engagement, educational_value, actionability, originality) = futures::try_join!(
            self.score(QualityDimension::Readability, content),
            self.score(QualityDimension::Engagement, content),
            self.score(QualityDimension::EducationalValue, content),
            self.score(QualityDimension::Actionability, content),
            self.score(QualityDimension::Originality, content),
        )?;
        Ok(QualityMetrics::new(
            readability,
            engagement,
            educational_value,
            actionability,
            originality,
        ))
    }

    async fn suggestions(&self, content: &Content) -> Vec<String> {
        let assessor = &self.assessor;
        match with_backoff(&self.retry, Collaborator::Assessor, "suggest_improvements", move || {
            assessor.suggest_improvements(content)
        })
        .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(error = %e, "No improvement suggestions, regenerating without feedback");
                Vec::new()
            }
        }
    }

    async fn regenerate(&self, content: &Content, feedback: &[String]) -> Result<(Content, f64)> {
        let feedback = if feedback.is_empty() {
            "- Make it clearer, more engaging and more actionable".to_string()
        } else {
            feedback.join("\n")
        };
        let prompt = format!(
            "Improve this financial content based on the feedback:\n\n\
             Original Content:\n\
             Title: {}\n{}...\n\n\
             Feedback for improvement:\n{feedback}\n\n\
             Rewrite the content addressing these concerns while maintaining the core message. \
             Put the title on the first line.",
            content.title,
            truncate_chars(&content.full_text(), REGENERATE_EXCERPT_CHARS),
        );

        let (generator, rewrite_prompt) = (&self.generator, prompt.as_str());
        let rewrite = with_backoff(&self.retry, Collaborator::Generator, "regenerate", move || {
            generator.generate(rewrite_prompt, REGENERATE_MAX_TOKENS, REGENERATE_TEMPERATURE)
        })
        .await?;
        let cost = self.generator.estimate_cost(&prompt, &rewrite);
        Ok((apply_rewrite(content, &rewrite), cost))
    }

    /// Drive `article` from `Generated` to `Approved` or `Rejected`.
    ///
    /// Performs at most `max_regeneration_attempts + 1` assessments. A failed
    /// regeneration still consumes its attempt and keeps the previous
    /// content. `metrics` is updated as the loop runs.
    #[instrument(skip_all, fields(article_id = %article.id))]
    pub async fn refine(
        &self,
        article: &mut Article,
        metrics: &mut RunMetrics,
        cancel: &CancelSignal,
    ) -> Result<Verdict> {
        let mut attempts = 0;
        loop {
            let content = article.content.clone().unwrap_or_default();
            let assessed = self.assess(&content).await?;
            metrics.assessments += 1;
            cancel.check()?;

            article.record_assessment(assessed)?;
            let score = assessed.overall_score();
            metrics.final_score = Some(score);

            if score >= self.threshold {
                article.approve(self.threshold)?;
                info!(quality_score = score, attempts, "Article approved");
                return Ok(Verdict::Approved);
            }

            if attempts >= self.max_regeneration_attempts {
                article.reject()?;
                warn!(
                    final_score = score,
                    threshold = self.threshold,
                    attempts,
                    "Article failed quality assurance after regeneration attempts"
                );
                return Ok(Verdict::BelowThreshold);
            }

            article.begin_regeneration()?;
            attempts += 1;
            metrics.regenerations += 1;

            let feedback = self.suggestions(&content).await;
            cancel.check()?;

            let regenerated = self.regenerate(&content, &feedback).await;
            metrics.generation_calls += 1;
            cancel.check()?;

            match regenerated {
                Ok((improved, cost)) => {
                    metrics.estimated_cost += cost;
                    article.replace_content(improved)?;
                    info!(previous_score = score, attempt = attempts, "Content regenerated");
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempts, "Regeneration failed, keeping previous content");
                }
            }
        }
    }
}
