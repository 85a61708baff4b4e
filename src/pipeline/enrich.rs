//! LLM enrichment: TL;DR, tags, affiliations and the figure description.
//!
//! The markup slicing (sections, author block) and response parsing are pure
//! functions; the `async` entry points only glue them to [`LlmClient`].
//! A failed call surfaces as an [`ArtifactError`] for the caller to record;
//! an unparseable answer is treated as "nothing found".

use crate::config::DigestConfig;
use crate::error::ArtifactError;
use crate::output::TokenUsage;
use crate::pipeline::encode::encode_figure;
use crate::pipeline::image::ImageArtifact;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::postprocess::{clean_llm_text, truncate_chars};
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const INTRO_EXCERPT_CHARS: usize = 1000;

// ── Markup slicing ───────────────────────────────────────────────────────────

static RE_CITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~?\\cite[a-zA-Z]*\*?(?:\[[^\]]*\])*\{[^}]*\}").unwrap());
static RE_FIGURE_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{figure\*?\}.*?\\end\{figure\*?\}").unwrap());
static RE_TABLE_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{table\*?\}.*?\\end\{table\*?\}").unwrap());

static RE_INTRODUCTION: Lazy<Regex> = Lazy::new(|| section_regex("introduction"));
static RE_CONCLUSION: Lazy<Regex> = Lazy::new(|| section_regex("conclusions?"));

static RE_AUTHOR_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\author.*?\\maketitle").unwrap());
static RE_FRONT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{document\}.*?\\begin\{abstract\}").unwrap());

fn section_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)(\\section\*?\{{(?i:{name})\}}(.*?))(?:\\section|\\end\{{document\}}|\\bibliography|\\appendix|\z)"
    ))
    .unwrap()
}

/// Document text without citations, figures and tables.
pub fn strip_floats(text: &str) -> String {
    let s = RE_CITE.replace_all(text, "");
    let s = RE_FIGURE_ENV.replace_all(&s, "");
    RE_TABLE_ENV.replace_all(&s, "").into_owned()
}

/// `\section{Introduction}` up to the next section-level boundary.
pub fn introduction_section(text: &str) -> Option<&str> {
    RE_INTRODUCTION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// `\section{Conclusion}` (or `Conclusions`) up to the next boundary.
pub fn conclusion_section(text: &str) -> Option<&str> {
    RE_CONCLUSION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First `max_chars` characters of the introduction body (header excluded).
pub fn introduction_excerpt(text: &str, max_chars: usize) -> Option<&str> {
    RE_INTRODUCTION
        .captures(text)
        .and_then(|c| c.get(2))
        .map(|m| truncate_chars(m.as_str(), max_chars))
}

/// Markup region that carries author names and affiliations.
pub fn author_region(text: &str) -> Option<&str> {
    RE_AUTHOR_BLOCK
        .find(text)
        .or_else(|| RE_FRONT_BLOCK.find(text))
        .map(|m| m.as_str())
}

// ── Response parsing ─────────────────────────────────────────────────────────

static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*?\]").unwrap());
static RE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"|'([^']*)'"#).unwrap());

/// Parse a list of strings out of a model answer.
///
/// Accepts a JSON array anywhere in the text, or a bracketed list of single-
/// or double-quoted items. `None` when the answer holds no list at all.
pub fn parse_string_list(response: &str) -> Option<Vec<String>> {
    let cleaned = clean_llm_text(response);
    if let (Some(open), Some(close)) = (cleaned.find('['), cleaned.rfind(']')) {
        if open < close {
            if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(&cleaned[open..=close]) {
                return Some(items.iter().filter_map(value_to_item).collect());
            }
        }
    }
    let list = RE_BRACKETED.find(&cleaned)?;
    Some(
        RE_QUOTED
            .captures_iter(list.as_str())
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn value_to_item(v: &serde_json::Value) -> Option<String> {
    let s = match v {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    (!s.is_empty()).then_some(s)
}

/// Keep the first occurrence of every item.
pub fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// ── LLM tasks ────────────────────────────────────────────────────────────────

/// One-sentence summary in the configured language.
pub async fn tldr(
    client: &LlmClient,
    config: &DigestConfig,
    title: &str,
    summary: &str,
    text: Option<&str>,
) -> Result<(String, TokenUsage), ArtifactError> {
    let body = text.map(strip_floats).unwrap_or_default();
    let introduction = introduction_section(&body).unwrap_or_default();
    let conclusion = conclusion_section(&body).unwrap_or_default();
    debug!(
        "TL;DR context: introduction {} chars, conclusion {} chars",
        introduction.len(),
        conclusion.len()
    );

    let prompt = prompts::tldr_prompt(&config.language, title, summary, introduction, conclusion);
    let prompt = truncate_chars(&prompt, config.prompt_char_budget);
    let reply = client.generate("tldr", prompts::TLDR_SYSTEM_PROMPT, prompt).await?;
    Ok((clean_llm_text(&reply.text), TokenUsage::from(&reply)))
}

/// Up to [`prompts::MAX_TAGS`] key terms.
pub async fn tags(
    client: &LlmClient,
    config: &DigestConfig,
    title: &str,
    summary: &str,
    text: Option<&str>,
) -> Result<(Vec<String>, TokenUsage), ArtifactError> {
    let excerpt = text.and_then(|t| introduction_excerpt(t, INTRO_EXCERPT_CHARS));
    let prompt = prompts::tags_prompt(&config.language, title, summary, excerpt);
    let prompt = truncate_chars(&prompt, config.prompt_char_budget / 2);
    let system = prompts::tags_system_prompt(&config.language);
    let reply = client.generate("tags", &system, prompt).await?;

    let mut tags = parse_string_list(&reply.text).unwrap_or_else(|| {
        debug!("Tag response holds no list");
        Vec::new()
    });
    tags.truncate(prompts::MAX_TAGS);
    Ok((tags, TokenUsage::from(&reply)))
}

/// Affiliations in author order, de-duplicated.
///
/// `Ok((None, _))` when the document has no author region (no call is made)
/// or the answer holds no list.
pub async fn affiliations(
    client: &LlmClient,
    config: &DigestConfig,
    text: &str,
) -> Result<(Option<Vec<String>>, TokenUsage), ArtifactError> {
    let Some(region) = author_region(text) else {
        debug!("No author region in document; skipping affiliations");
        return Ok((None, TokenUsage::default()));
    };
    let prompt = prompts::affiliations_prompt(region);
    let prompt = truncate_chars(&prompt, config.prompt_char_budget);
    let reply = client
        .generate("affiliations", prompts::AFFILIATIONS_SYSTEM_PROMPT, prompt)
        .await?;

    let parsed = parse_string_list(&reply.text).map(dedup_in_order);
    if parsed.is_none() {
        debug!("Affiliation response holds no list");
    }
    Ok((parsed, TokenUsage::from(&reply)))
}

/// Short description of the overview figure from the image and its caption.
pub async fn describe_figure(
    client: &LlmClient,
    config: &DigestConfig,
    title: &str,
    caption: &str,
    image: &ImageArtifact,
) -> Result<(String, TokenUsage), ArtifactError> {
    let prompt = prompts::figure_prompt(&config.language, title, caption);
    let attachment = encode_figure(&image.bytes, image.mime_type());
    let reply = client
        .generate_with_vision("figure description", prompts::FIGURE_SYSTEM_PROMPT, &prompt, attachment)
        .await?;
    Ok((clean_llm_text(&reply.text), TokenUsage::from(&reply)))
}
