//! Assessor backed by an LLM client plus structural heuristics.

use async_trait::async_trait;
use quill_common::{Assessor, Content, QualityDimension, QuillError, Result};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{instrument, warn};

use crate::client::{LlmClient, LlmRequest};

/// Score used when the model's reply holds no number.
pub const FALLBACK_SCORE: f64 = 7.0;

/// Characters of article text shown to the model when scoring.
const SCORING_EXCERPT: usize = 1000;
const SUGGESTION_EXCERPT: usize = 1500;
const MAX_SUGGESTIONS: usize = 5;

const COMMON_PHRASES: &[&str] = &[
    "financial freedom",
    "passive income",
    "compound interest",
    "diversify your portfolio",
    "emergency fund",
];

/// Readability, engagement and educational value are rated by the model;
/// actionability and originality are computed from the content itself.
pub struct LlmAssessor {
    client: Arc<dyn LlmClient>,
}

impl LlmAssessor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    async fn rate(&self, dimension: QualityDimension, content: &Content) -> Result<f64> {
        let prompt = rating_prompt(dimension, &content.full_text());
        let response = self
            .client
            .complete(LlmRequest::prompt(prompt, 10, 0.0))
            .await
            .map_err(|e| match e {
                QuillError::TransientCollaborator(_) => e,
                other => QuillError::Assessment(format!("{}: {other}", dimension.as_str())),
            })?;

        Ok(parse_score(&response.content).unwrap_or_else(|| {
            warn!(
                dimension = dimension.as_str(),
                reply = %response.content,
                "Unparseable score, using fallback"
            );
            FALLBACK_SCORE
        }))
    }
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn rating_prompt(dimension: QualityDimension, text: &str) -> String {
    let (subject, criteria) = match dimension {
        QualityDimension::Readability => (
            "the readability of this financial content",
            "sentence complexity, vocabulary accessibility, clear structure, financial jargon usage",
        ),
        QualityDimension::Engagement => (
            "the engagement potential of this content",
            "hook effectiveness, emotional resonance, storytelling elements, reader retention",
        ),
        _ => (
            "the educational value of this financial content",
            "depth of insights, learning opportunities, financial literacy contribution, practical knowledge",
        ),
    };
    format!(
        "Rate {subject} on a scale of 0-10:\n\n{}...\n\nConsider: {criteria}.\n\nReturn only a number between 0-10.",
        excerpt(text, SCORING_EXCERPT)
    )
}

/// First number in the reply, clamped to `[0, 10]`.
fn parse_score(reply: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").ok())
        .as_ref()?;
    re.find(reply)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|score| score.clamp(0.0, 10.0))
}

/// 9 with three or more steps, 7 with at least one, 5 otherwise.
pub fn actionability_score(content: &Content) -> f64 {
    match content.actionable_steps.len() {
        n if n >= 3 => 9.0,
        n if n >= 1 => 7.0,
        _ => 5.0,
    }
}

/// Starts at 10 and loses half a point per stock phrase, never below 5.
pub fn originality_score(content: &Content) -> f64 {
    let text = content.full_text().to_lowercase();
    let common = COMMON_PHRASES.iter().filter(|p| text.contains(*p)).count();
    (10.0 - common as f64 * 0.5).clamp(5.0, 10.0)
}

fn default_suggestions() -> Vec<String> {
    vec![
        "Consider adding more specific examples".to_string(),
        "Include clearer action steps".to_string(),
    ]
}

#[async_trait]
impl Assessor for LlmAssessor {
    #[instrument(skip(self, content))]
    async fn score(&self, dimension: QualityDimension, content: &Content) -> Result<f64> {
        match dimension {
            QualityDimension::Actionability => Ok(actionability_score(content)),
            QualityDimension::Originality => Ok(originality_score(content)),
            _ => self.rate(dimension, content).await,
        }
    }

    async fn suggest_improvements(&self, content: &Content) -> Result<Vec<String>> {
        let prompt = format!(
            "Analyze this financial content and provide 3-5 specific improvement suggestions:\n\n\
             Title: {}\nContent: {}...\n\n\
             Focus on content structure, engagement factors, educational value and actionability.\n\
             Provide concrete, actionable suggestions, one per line.",
            content.title,
            excerpt(&content.full_text(), SUGGESTION_EXCERPT)
        );

        match self.client.complete(LlmRequest::prompt(prompt, 500, 0.3)).await {
            Ok(response) => {
                let suggestions: Vec<String> = response
                    .content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .take(MAX_SUGGESTIONS)
                    .map(str::to_string)
                    .collect();
                if suggestions.is_empty() {
                    Ok(default_suggestions())
                } else {
                    Ok(suggestions)
                }
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                warn!(error = %e, "Suggestion request failed, using defaults");
                Ok(default_suggestions())
            }
        }
    }
}
