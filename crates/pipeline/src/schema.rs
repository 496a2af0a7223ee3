//! Static mapping from article fields to document-workspace properties.

use quill_common::Article;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Property types a document workspace understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    RichText,
    Select,
    MultiSelect,
    Number,
    Date,
}

impl PropertyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Number => "number",
            Self::Date => "date",
        }
    }
}

/// One logical field, the property it is written to, and how its value is
/// derived. `None` leaves the property out.
pub struct PropertySpec {
    pub field: &'static str,
    pub name: &'static str,
    pub kind: PropertyKind,
    transform: fn(&Article) -> Option<Value>,
}

fn rounded(value: f64) -> Value {
    json!((value * 100.0).round() / 100.0)
}

const MAX_KEYWORDS: usize = 10;

pub static ARTICLE_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        field: "title",
        name: "Title",
        kind: PropertyKind::Title,
        transform: |a| Some(json!(a.title().unwrap_or("Untitled"))),
    },
    PropertySpec {
        field: "id",
        name: "Article ID",
        kind: PropertyKind::RichText,
        transform: |a| Some(json!(a.id.as_str())),
    },
    PropertySpec {
        field: "status",
        name: "Status",
        kind: PropertyKind::Select,
        transform: |a| Some(json!(a.status.as_str())),
    },
    PropertySpec {
        field: "style",
        name: "Content Style",
        kind: PropertyKind::Select,
        transform: |a| Some(json!(a.style.as_str())),
    },
    PropertySpec {
        field: "topic.category",
        name: "Topic Category",
        kind: PropertyKind::Select,
        transform: |a| Some(json!(a.topic.category())),
    },
    PropertySpec {
        field: "topic.keywords",
        name: "Keywords",
        kind: PropertyKind::MultiSelect,
        transform: |a| {
            Some(json!(a
                .topic
                .keywords()
                .iter()
                .take(MAX_KEYWORDS)
                .collect::<Vec<_>>()))
        },
    },
    PropertySpec {
        field: "topic.trend_score",
        name: "Trend Score",
        kind: PropertyKind::Number,
        transform: |a| Some(rounded(a.topic.trend_score())),
    },
    PropertySpec {
        field: "created_at",
        name: "Created At",
        kind: PropertyKind::Date,
        transform: |a| Some(json!(a.created_at.to_rfc3339())),
    },
    PropertySpec {
        field: "published_at",
        name: "Published At",
        kind: PropertyKind::Date,
        transform: |a| a.published_at.map(|at| json!(at.to_rfc3339())),
    },
    PropertySpec {
        field: "quality.overall",
        name: "Overall Score",
        kind: PropertyKind::Number,
        transform: |a| a.overall_score().map(rounded),
    },
    PropertySpec {
        field: "quality.readability",
        name: "Readability",
        kind: PropertyKind::Number,
        transform: |a| a.quality_metrics.map(|m| rounded(m.readability)),
    },
    PropertySpec {
        field: "quality.engagement",
        name: "Engagement",
        kind: PropertyKind::Number,
        transform: |a| a.quality_metrics.map(|m| rounded(m.engagement)),
    },
    PropertySpec {
        field: "quality.educational_value",
        name: "Educational Value",
        kind: PropertyKind::Number,
        transform: |a| a.quality_metrics.map(|m| rounded(m.educational_value)),
    },
    PropertySpec {
        field: "quality.actionability",
        name: "Actionability",
        kind: PropertyKind::Number,
        transform: |a| a.quality_metrics.map(|m| rounded(m.actionability)),
    },
    PropertySpec {
        field: "quality.originality",
        name: "Originality",
        kind: PropertyKind::Number,
        transform: |a| a.quality_metrics.map(|m| rounded(m.originality)),
    },
    PropertySpec {
        field: "content.word_count",
        name: "Word Count",
        kind: PropertyKind::Number,
        transform: |a| a.content.as_ref().map(|c| json!(c.word_count())),
    },
    PropertySpec {
        field: "content.key_insights",
        name: "Insights Count",
        kind: PropertyKind::Number,
        transform: |a| a.content.as_ref().map(|c| json!(c.key_insights.len())),
    },
    PropertySpec {
        field: "content.actionable_steps",
        name: "Action Steps",
        kind: PropertyKind::Number,
        transform: |a| a.content.as_ref().map(|c| json!(c.actionable_steps.len())),
    },
];

/// Property payload for `article`: `{name: {kind: value}}`.
pub fn article_properties(article: &Article) -> Map<String, Value> {
    ARTICLE_PROPERTIES
        .iter()
        .filter_map(|spec| {
            (spec.transform)(article).map(|value| {
                let mut typed = Map::new();
                typed.insert(spec.kind.as_str().to_string(), value);
                (spec.name.to_string(), Value::Object(typed))
            })
        })
        .collect()
}

/// Disagreement between the mapping and a sink's reported schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    Missing {
        name: &'static str,
    },
    KindMismatch {
        name: &'static str,
        expected: PropertyKind,
        found: PropertyKind,
    },
    Unknown {
        name: String,
    },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { name } => write!(f, "property '{name}' is missing from the sink"),
            Self::KindMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "property '{name}' is {} in the sink, expected {}",
                found.as_str(),
                expected.as_str()
            ),
            Self::Unknown { name } => write!(f, "sink property '{name}' is not mapped"),
        }
    }
}

/// Compare the mapping with the schema a sink reports.
pub fn validate_schema(reported: &HashMap<String, PropertyKind>) -> Vec<SchemaIssue> {
    let mut issues: Vec<SchemaIssue> = ARTICLE_PROPERTIES
        .iter()
        .filter_map(|spec| match reported.get(spec.name) {
            None => Some(SchemaIssue::Missing { name: spec.name }),
            Some(&found) if found != spec.kind => Some(SchemaIssue::KindMismatch {
                name: spec.name,
                expected: spec.kind,
                found,
            }),
            Some(_) => None,
        })
        .collect();

    let mut unknown: Vec<&String> = reported
        .keys()
        .filter(|name| !ARTICLE_PROPERTIES.iter().any(|spec| spec.name == name.as_str()))
        .collect();
    unknown.sort();
    issues.extend(unknown.into_iter().map(|name| SchemaIssue::Unknown { name: name.clone() }));
    issues
}

/// Log every schema issue as a startup warning.
pub fn warn_on_schema_issues(sink: &str, issues: &[SchemaIssue]) {
    for issue in issues {
        warn!(sink = sink, "{issue}");
    }
}

/// The schema the mapping expects, as a sink would report it.
pub fn expected_schema() -> HashMap<String, PropertyKind> {
    ARTICLE_PROPERTIES
        .iter()
        .map(|spec| (spec.name.to_string(), spec.kind))
        .collect()
}
