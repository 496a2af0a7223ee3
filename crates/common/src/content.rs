//! Article content, quality metrics and content styles.

use serde::{Deserialize, Serialize};

/// Generated (or reused) article content.
///
/// Content is never edited in place by the pipeline; a regeneration produces
/// a new value that replaces the old one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub introduction: String,
    pub main_content: String,
    pub conclusion: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub actionable_steps: Vec<String>,
}

impl Content {
    /// Title, introduction, main content and conclusion, in that order.
    pub fn full_text(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.title, self.introduction, self.main_content, self.conclusion
        )
    }

    pub fn word_count(&self) -> usize {
        self.full_text().split_whitespace().count()
    }
}

/// The five quality dimensions an Assessor scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Readability,
    Engagement,
    EducationalValue,
    Actionability,
    Originality,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 5] = [
        QualityDimension::Readability,
        QualityDimension::Engagement,
        QualityDimension::EducationalValue,
        QualityDimension::Actionability,
        QualityDimension::Originality,
    ];

    /// Weight of this dimension in the overall score. The weights sum to 1.0.
    pub fn weight(self) -> f64 {
        match self {
            Self::Readability => 0.20,
            Self::Engagement => 0.25,
            Self::EducationalValue => 0.25,
            Self::Actionability => 0.20,
            Self::Originality => 0.10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readability => "readability",
            Self::Engagement => "engagement",
            Self::EducationalValue => "educational_value",
            Self::Actionability => "actionability",
            Self::Originality => "originality",
        }
    }
}

/// Immutable result of one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub readability: f64,
    pub engagement: f64,
    pub educational_value: f64,
    pub actionability: f64,
    pub originality: f64,
}

impl QualityMetrics {
    /// Build metrics, clamping every sub-score into `[0, 10]`.
    pub fn new(
        readability: f64,
        engagement: f64,
        educational_value: f64,
        actionability: f64,
        originality: f64,
    ) -> Self {
        Self {
            readability: clamp(readability),
            engagement: clamp(engagement),
            educational_value: clamp(educational_value),
            actionability: clamp(actionability),
            originality: clamp(originality),
        }
    }

    pub fn score(&self, dimension: QualityDimension) -> f64 {
        match dimension {
            QualityDimension::Readability => self.readability,
            QualityDimension::Engagement => self.engagement,
            QualityDimension::EducationalValue => self.educational_value,
            QualityDimension::Actionability => self.actionability,
            QualityDimension::Originality => self.originality,
        }
    }

    pub fn overall_score(&self) -> f64 {
        QualityDimension::ALL
            .iter()
            .map(|d| d.weight() * self.score(*d))
            .sum()
    }
}

fn clamp(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 10.0)
    }
}

/// Writing style an article is generated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStyle {
    #[default]
    MotivationalFinance,
    PhilosophicalMoney,
    PracticalWisdom,
    HistoricalInsights,
}

impl ContentStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MotivationalFinance => "motivational_finance",
            Self::PhilosophicalMoney => "philosophical_money",
            Self::PracticalWisdom => "practical_wisdom",
            Self::HistoricalInsights => "historical_insights",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "motivational_finance" => Some(Self::MotivationalFinance),
            "philosophical_money" => Some(Self::PhilosophicalMoney),
            "practical_wisdom" => Some(Self::PracticalWisdom),
            "historical_insights" => Some(Self::HistoricalInsights),
            _ => None,
        }
    }

    /// Pick a style from the first keyword that maps to one.
    pub fn for_keywords<'a>(keywords: impl IntoIterator<Item = &'a String>) -> Self {
        keywords
            .into_iter()
            .find_map(|k| match k.as_str() {
                "investment" | "savings" | "budget" => Some(Self::PracticalWisdom),
                "retirement" | "economy" => Some(Self::HistoricalInsights),
                "debt" => Some(Self::MotivationalFinance),
                "cryptocurrency" => Some(Self::PhilosophicalMoney),
                _ => None,
            })
            .unwrap_or_default()
    }
}
