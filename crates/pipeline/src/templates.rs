//! Section templates per content style and assembly of generated sections.

use quill_common::{Content, ContentStyle, Topic};

use crate::variation::VariationStrategy;

/// One section of a styled article, with interchangeable prompt phrasings.
/// `{topic}` is replaced by the topic's keywords.
#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    phrasings: &'static [&'static str],
}

const MOTIVATIONAL: &[Section] = &[
    Section {
        name: "hook",
        phrasings: &[
            "Create an engaging hook about {topic} that captures attention",
            "Open with a vivid moment that makes {topic} feel urgent",
            "Start with a surprising fact or question about {topic}",
        ],
    },
    Section {
        name: "problem",
        phrasings: &[
            "Describe a common financial problem related to {topic}",
            "Explain where most people go wrong with {topic}",
        ],
    },
    Section {
        name: "wisdom",
        phrasings: &[
            "Share profound financial wisdom about {topic}",
            "Explain the one principle about {topic} that changes everything",
        ],
    },
    Section {
        name: "practical_steps",
        phrasings: &[
            "Provide 3-5 actionable steps for {topic}, one numbered step per line",
            "List 3-5 concrete things a reader can do this week about {topic}, one numbered step per line",
        ],
    },
    Section {
        name: "inspiration",
        phrasings: &[
            "End with an inspiring message about {topic}",
            "Close by showing the reader what mastering {topic} makes possible",
        ],
    },
];

const PHILOSOPHICAL: &[Section] = &[
    Section {
        name: "quote",
        phrasings: &[
            "Start with a relevant quote about {topic}",
            "Open with a line from a well-known thinker that speaks to {topic}",
        ],
    },
    Section {
        name: "historical_context",
        phrasings: &[
            "Provide historical context for {topic}",
            "Trace how people thought about {topic} a century ago",
        ],
    },
    Section {
        name: "modern_application",
        phrasings: &[
            "Apply this wisdom to modern {topic}",
            "Show what this idea means for {topic} today",
        ],
    },
    Section {
        name: "reflection",
        phrasings: &[
            "Conclude with thoughtful reflection on {topic}",
            "Leave the reader with a question worth sitting with about {topic}",
        ],
    },
];

const PRACTICAL: &[Section] = &[
    Section {
        name: "scenario",
        phrasings: &[
            "Present a realistic scenario involving {topic}",
            "Describe a household facing a real decision about {topic}",
        ],
    },
    Section {
        name: "principle",
        phrasings: &[
            "Explain the underlying principle of {topic}",
            "Name the rule of thumb behind good decisions about {topic}",
        ],
    },
    Section {
        name: "implementation",
        phrasings: &[
            "Show how to implement {topic} practically, one numbered step per line",
            "Walk through putting {topic} into practice, one numbered step per line",
        ],
    },
    Section {
        name: "results",
        phrasings: &[
            "Describe expected outcomes from {topic}",
            "Explain what changes after six months of applying {topic}",
        ],
    },
];

const HISTORICAL: &[Section] = &[
    Section {
        name: "historical_event",
        phrasings: &[
            "Describe a historical event related to {topic}",
            "Tell the story of a market episode that shaped {topic}",
        ],
    },
    Section {
        name: "lesson",
        phrasings: &[
            "Extract the key lesson about {topic}",
            "State what that episode teaches about {topic}",
        ],
    },
    Section {
        name: "modern_parallel",
        phrasings: &[
            "Draw parallels to modern {topic}",
            "Show where the same pattern appears in {topic} now",
        ],
    },
    Section {
        name: "application",
        phrasings: &[
            "Show how to apply this to {topic} today, one numbered step per line",
            "Turn the lesson into steps for {topic}, one numbered step per line",
        ],
    },
];

/// Sections whose lines become actionable steps.
const STEP_SECTIONS: &[&str] = &["practical_steps", "implementation", "application"];
/// Sections summarized into key insights.
const INSIGHT_SECTIONS: &[&str] = &["wisdom", "principle", "lesson"];

const INSIGHT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct ContentTemplate {
    style: ContentStyle,
    sections: &'static [Section],
}

impl ContentTemplate {
    pub fn for_style(style: ContentStyle) -> Self {
        let sections = match style {
            ContentStyle::MotivationalFinance => MOTIVATIONAL,
            ContentStyle::PhilosophicalMoney => PHILOSOPHICAL,
            ContentStyle::PracticalWisdom => PRACTICAL,
            ContentStyle::HistoricalInsights => HISTORICAL,
        };
        Self { style, sections }
    }

    pub fn style(&self) -> ContentStyle {
        self.style
    }

    pub fn sections(&self) -> &'static [Section] {
        self.sections
    }

    pub fn section_prompt(
        &self,
        section: &Section,
        topic: &Topic,
        context: &str,
        variation: &dyn VariationStrategy,
    ) -> String {
        let keywords = topic.display_keywords();
        let phrasing = section.phrasings[variation.pick(section.phrasings.len())]
            .replace("{topic}", &keywords);
        let context = if context.is_empty() { "none" } else { context };

        format!(
            "Write a {section} section for a financial wisdom article.\n\n\
             Topic: {keywords}\n\
             Category: {category}\n\
             Style: {style}\n\n\
             {phrasing}\n\n\
             Additional context: {context}\n\n\
             Requirements:\n\
             - Write in an engaging, accessible tone\n\
             - Include practical insights\n\
             - Keep it concise but impactful (150-250 words)\n\
             - Focus on actionable financial wisdom",
            section = section.name,
            category = topic.category(),
            style = self.style.as_str(),
        )
    }

    /// Build content from generated sections, given in template order.
    ///
    /// The first section is the introduction, the last the conclusion and
    /// everything between becomes the main content.
    pub fn assemble(
        &self,
        topic: &Topic,
        sections: &[(&'static str, String)],
        variation: &dyn VariationStrategy,
    ) -> Content {
        let introduction = sections.first().map(|(_, t)| t.clone()).unwrap_or_default();
        let conclusion = if sections.len() > 1 {
            sections.last().map(|(_, t)| t.clone()).unwrap_or_default()
        } else {
            String::new()
        };
        let main_content = sections
            .iter()
            .skip(1)
            .take(sections.len().saturating_sub(2))
            .map(|(_, t)| t.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let actionable_steps = sections
            .iter()
            .filter(|(name, _)| STEP_SECTIONS.contains(name))
            .flat_map(|(_, text)| text.lines())
            .filter(|line| is_step_line(line))
            .map(|line| line.trim().to_string())
            .collect();

        let key_insights = sections
            .iter()
            .filter(|(name, _)| INSIGHT_SECTIONS.contains(name))
            .map(|(_, text)| summarize(text, INSIGHT_CHARS))
            .collect();

        Content {
            title: title_for(topic, variation),
            introduction,
            main_content,
            conclusion,
            key_insights,
            actionable_steps,
        }
    }
}

/// A numbered, bulleted or "Step" line.
pub fn is_step_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    let numbered = {
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        digits > 0 && matches!(line[digits..].chars().next(), Some('.') | Some(')'))
    };
    numbered
        || line.starts_with('-')
        || line.starts_with('•')
        || line.starts_with('*')
        || line.to_lowercase().starts_with("step")
}

fn summarize(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    word.split_whitespace()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title from the lead keyword. Investment and savings topics get a fixed
/// framing; other categories vary.
pub fn title_for(topic: &Topic, variation: &dyn VariationStrategy) -> String {
    let lead = capitalize(topic.keywords().iter().next().map(String::as_str).unwrap_or_default());
    let titles = [
        format!("The Ultimate Guide to {lead}"),
        format!("How {lead} Can Transform Your Financial Future"),
        format!("Master {lead}: Wisdom for Financial Success"),
        format!("The Power of {lead} in Building Wealth"),
    ];
    let pick = match topic.category() {
        "investment" => 1,
        "savings" => 3,
        _ => variation.pick(titles.len()),
    };
    titles[pick].clone()
}
