//! Best-effort segmentation of chat output into labeled sections.
//!
//! The model is an untrusted producer: headings may be missing, reordered or
//! restyled. Parsing never fails; a field whose heading is not found is `""`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)###\s*Answer\s*(.*?)###\s*Product Improvement Suggestions\s*(.*?)###\s*Sources\s*(.*)",
    )
    .expect("valid regex")
});

static SECONDARY_HEADINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)###\s*Product Improvement Suggestions|###\s*Sources").expect("valid regex")
});

static LEADING_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*###\s*Answer\b").expect("valid regex"));

static MARKETING_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)#{2,}[^\n#]*marketing[^\n]*").expect("valid regex"));

static ANY_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*#{2,}").expect("valid regex"));

/// Which strategy produced the answer/suggestions/sources split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// All three headings found in order.
    Labeled,
    /// Split on the secondary headings; segments assigned by position.
    Positional,
    /// No known heading; the whole text is the answer.
    Unstructured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerSections {
    pub answer: String,
    pub suggestions: String,
    pub sources: String,
    pub marketing: String,
    pub strategy: ParseStrategy,
}

impl AnswerSections {
    /// Sections carrying only a message in `answer`, for when no model output exists.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            suggestions: String::new(),
            sources: String::new(),
            marketing: String::new(),
            strategy: ParseStrategy::Unstructured,
        }
    }
}

/// Parses raw chat output into sections. Pure; the same input always yields the same sections.
pub fn parse_answer(raw: &str) -> AnswerSections {
    let (answer, suggestions, sources, strategy) = match LABELED.captures(raw) {
        Some(caps) => (
            caps[1].to_string(),
            caps[2].to_string(),
            caps[3].to_string(),
            ParseStrategy::Labeled,
        ),
        None => split_positionally(raw),
    };

    AnswerSections {
        answer: answer.trim().to_string(),
        suggestions: cut_marketing(&suggestions).trim().to_string(),
        sources: sources.trim().to_string(),
        marketing: extract_marketing(raw),
        strategy,
    }
}

fn split_positionally(raw: &str) -> (String, String, String, ParseStrategy) {
    let mut parts = SECONDARY_HEADINGS.split(raw);
    let first = parts.next().unwrap_or_default();
    let answer = LEADING_ANSWER.replace(first, "").into_owned();
    let suggestions = parts.next().map(str::to_string);
    let sources = parts.next().unwrap_or_default().to_string();
    let strategy = match suggestions {
        Some(_) => ParseStrategy::Positional,
        None => ParseStrategy::Unstructured,
    };
    (answer, suggestions.unwrap_or_default(), sources, strategy)
}

/// Body of the first 2+-level heading mentioning "Marketing", up to the next 2+-level heading.
pub fn extract_marketing(raw: &str) -> String {
    let Some(heading) = MARKETING_HEADING.find(raw) else {
        return String::new();
    };
    let body = &raw[heading.end()..];
    let end = ANY_HEADING.find(body).map_or(body.len(), |m| m.start());
    body[..end].trim().to_string()
}

/// The template places Marketing between Suggestions and Sources, so drop it from suggestions.
fn cut_marketing(suggestions: &str) -> &str {
    match MARKETING_HEADING.find(suggestions) {
        Some(m) => &suggestions[..m.start()],
        None => suggestions,
    }
}
