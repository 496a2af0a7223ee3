//! Producing article content: light edits of reused content, or fresh
//! generation section by section.

use quill_cache::{CacheClass, CacheManager};
use quill_common::{CancelSignal, Content, ContentStyle, Generator, Result, SearchResult, Topic};
use quill_llm::{with_backoff, Collaborator, RetryConfig};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::templates::{is_step_line, ContentTemplate};
use crate::variation::VariationStrategy;

pub const SECTION_MAX_TOKENS: u32 = 300;
pub const SECTION_TEMPERATURE: f32 = 0.7;
pub const EDIT_MAX_TOKENS: u32 = 800;
pub const EDIT_TEMPERATURE: f32 = 0.5;

const REUSE_INTRO_CHARS: usize = 300;
const EDIT_EXCERPT_CHARS: usize = 1000;
const MAX_NEW_STEPS: usize = 3;

/// How a composition was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Reused { source_id: String },
    Cached,
    Generated,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub content: Content,
    pub origin: Origin,
    pub cost: f64,
    pub generation_calls: u32,
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Existing search result viewed as article content.
pub fn content_from_result(result: &SearchResult) -> Content {
    Content {
        title: result.title.clone(),
        introduction: truncate_chars(&result.body, REUSE_INTRO_CHARS).to_string(),
        main_content: result.body.clone(),
        ..Default::default()
    }
}

/// Apply an edit reply: first line is the new title, the next two the new
/// introduction; up to three step lines are appended.
fn apply_edit(mut content: Content, reply: &str) -> Content {
    let lines: Vec<&str> = reply.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let Some(first) = lines.first() else {
        return content;
    };

    content.title = first.trim_start_matches('#').trim().to_string();
    let intro: Vec<&str> = lines
        .iter()
        .skip(1)
        .take(2)
        .copied()
        .filter(|l| !is_step_line(l))
        .collect();
    if !intro.is_empty() {
        content.introduction = intro.join("\n");
    }
    content.actionable_steps.extend(
        lines
            .iter()
            .filter(|l| is_step_line(l))
            .take(MAX_NEW_STEPS)
            .map(|l| l.to_string()),
    );
    content
}

pub struct ContentComposer {
    generator: Arc<dyn Generator>,
    editor: Arc<dyn Generator>,
    cache: Arc<CacheManager>,
    variation: Arc<dyn VariationStrategy>,
    retry: RetryConfig,
}

impl ContentComposer {
    pub fn new(
        generator: Arc<dyn Generator>,
        editor: Arc<dyn Generator>,
        cache: Arc<CacheManager>,
        variation: Arc<dyn VariationStrategy>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            generator,
            editor,
            cache,
            variation,
            retry,
        }
    }

    fn cache_id(topic: &Topic, style: ContentStyle) -> String {
        format!("{}:{}", topic.fingerprint(), style.as_str())
    }

    /// Adapt existing content to `topic`. A failed edit keeps the original.
    #[instrument(skip(self, existing, topic, cancel), fields(source_id = %existing.content_id))]
    pub async fn reuse(
        &self,
        existing: &SearchResult,
        topic: &Topic,
        cancel: &CancelSignal,
    ) -> Result<Composition> {
        let original = content_from_result(existing);
        let prompt = format!(
            "Adapt this financial content for the topic: {}\n\n\
             Original content: {}\n{}...\n\n\
             Please:\n\
             1. Put an updated title focused on the new topic on the first line\n\
             2. Follow it with a two-line introduction that is more relevant\n\
             3. Add 2-3 new actionable steps related to the topic, one numbered step per line\n\
             4. Maintain the original quality and style",
            topic.display_keywords(),
            original.title,
            truncate_chars(&original.full_text(), EDIT_EXCERPT_CHARS),
        );

        let (editor, edit_prompt) = (&self.editor, prompt.as_str());
        let edited = with_backoff(&self.retry, Collaborator::Generator, "edit", move || {
            editor.generate(edit_prompt, EDIT_MAX_TOKENS, EDIT_TEMPERATURE)
        })
        .await;
        cancel.check()?;

        let source_id = existing.content_id.clone();
        match edited {
            Ok(reply) => {
                let cost = self.editor.estimate_cost(&prompt, &reply);
                Ok(Composition {
                    content: apply_edit(original, &reply),
                    origin: Origin::Reused { source_id },
                    cost,
                    generation_calls: 1,
                })
            }
            Err(e) => {
                warn!(error = %e, "Content customization failed, using original");
                Ok(Composition {
                    content: original,
                    origin: Origin::Reused { source_id },
                    cost: 0.0,
                    generation_calls: 1,
                })
            }
        }
    }

    /// Generate content for `topic` in `style`, or reuse a cached generation
    /// for the same fingerprint and style.
    #[instrument(
        skip(self, topic, style, context, cancel),
        fields(fingerprint = %topic.fingerprint(), style = style.as_str())
    )]
    pub async fn fresh(
        &self,
        topic: &Topic,
        style: ContentStyle,
        context: &str,
        cancel: &CancelSignal,
    ) -> Result<Composition> {
        let generated = self.cache.typed::<Content>(CacheClass::GeneratedContent);
        let cache_id = Self::cache_id(topic, style);

        if let Some(content) = generated.get(&cache_id).await {
            info!("Using cached content");
            return Ok(Composition {
                content,
                origin: Origin::Cached,
                cost: 0.0,
                generation_calls: 0,
            });
        }

        let template = ContentTemplate::for_style(style);
        let mut sections = Vec::with_capacity(template.sections().len());
        let mut cost = 0.0;
        let mut calls = 0;

        for section in template.sections() {
            let prompt = template.section_prompt(section, topic, context, self.variation.as_ref());
            let (generator, section_prompt) = (&self.generator, prompt.as_str());
            let text = with_backoff(&self.retry, Collaborator::Generator, section.name, move || {
                generator.generate(section_prompt, SECTION_MAX_TOKENS, SECTION_TEMPERATURE)
            })
            .await?;
            calls += 1;
            cancel.check()?;

            cost += self.generator.estimate_cost(&prompt, &text);
            sections.push((section.name, text));
        }

        let content = template.assemble(topic, &sections, self.variation.as_ref());
        generated.set(&cache_id, &content).await;

        info!(
            sections = sections.len(),
            estimated_cost = cost,
            "Content generated"
        );
        Ok(Composition {
            content,
            origin: Origin::Generated,
            cost,
            generation_calls: calls,
        })
    }
}
