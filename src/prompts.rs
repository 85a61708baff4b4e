//! Prompts for the enrichment calls (TL;DR, tags, affiliations, figure
//! description).
//!
//! Builders take already-extracted markup snippets and return the user
//! message; the matching system prompts are constants so tests can inspect
//! them without a model.

/// System prompt for the one-sentence summary.
pub const TLDR_SYSTEM_PROMPT: &str = "You are an assistant who perfectly summarizes scientific papers, \
and gives the core idea of the paper to the user.";

/// System prompt for tag extraction. `{lang}` is replaced with the language.
pub const TAGS_SYSTEM_PROMPT: &str = "You are an expert at extracting key technical terms from research \
papers. You always return results in {lang}. You return ONLY a JSON list of strings, nothing else.";

/// System prompt for affiliation extraction.
pub const AFFILIATIONS_SYSTEM_PROMPT: &str = r#"You are an assistant who perfectly extracts affiliations of authors from the author information of a paper. You should return a JSON list of affiliations sorted by the author order, like ["Tsinghua University", "Peking University"]. If an affiliation consists of multiple levels, like "Department of Computer Science, Tsinghua University", return the top-level affiliation "Tsinghua University" only. Do not return duplicated affiliations. If there is no affiliation, return an empty list []. Return only the final list."#;

/// System prompt for the figure description.
pub const FIGURE_SYSTEM_PROMPT: &str = "You are an expert reader of machine-learning papers. \
You explain method diagrams precisely and briefly.";

/// Maximum number of tags kept from a response.
pub const MAX_TAGS: usize = 8;

/// Build the TL;DR prompt.
///
/// `introduction` and `conclusion` are raw markup spans and may be empty.
pub fn tldr_prompt(
    language: &str,
    title: &str,
    summary: &str,
    introduction: &str,
    conclusion: &str,
) -> String {
    format!(
        "Given the title, abstract, introduction and the conclusion (if any) of a paper in \
LaTeX format, generate a one-sentence TLDR summary in {language}:\n\n\
\\title{{{title}}}\n\
\\begin{{abstract}}{summary}\\end{{abstract}}\n\
{introduction}\n\
{conclusion}\n"
    )
}

/// Build the tag-extraction prompt.
pub fn tags_prompt(language: &str, title: &str, summary: &str, intro_excerpt: Option<&str>) -> String {
    let mut content = format!("Title: {title}\n\nAbstract: {summary}");
    if let Some(intro) = intro_excerpt {
        content.push_str(&format!("\n\nIntroduction (excerpt): {intro}"));
    }
    format!(
        "Given the following research paper information, extract 5-{MAX_TAGS} key technical terms \
or concepts as tags. The tags should be in {language} and represent the main techniques, methods, \
datasets, or concepts discussed in the paper.\n\n{content}\n\n\
Please return ONLY a JSON list of strings (e.g. [\"tag1\", \"tag2\", \"tag3\"]), without any \
additional explanation. Each tag should be concise (2-6 words)."
    )
}

/// Build the affiliation-extraction prompt from the author region.
pub fn affiliations_prompt(author_region: &str) -> String {
    format!(
        "Given the author information of a paper in LaTeX format, extract the affiliations of the \
authors as a JSON list, sorted by the author order. If there is no affiliation, return an empty \
list []. Following is the author information:\n{author_region}"
    )
}

/// Build the figure-description prompt sent alongside the image.
pub fn figure_prompt(language: &str, title: &str, caption: &str) -> String {
    format!(
        "The attached image is the overview figure of the paper \"{title}\".\n\
Its caption reads: \"{caption}\"\n\n\
In {language}, describe in 2-3 sentences what the figure shows: the main components, \
how data flows between them, and what the method contributes. \
Output only the description."
    )
}

/// Substitute the language into [`TAGS_SYSTEM_PROMPT`].
pub fn tags_system_prompt(language: &str) -> String {
    TAGS_SYSTEM_PROMPT.replace("{lang}", language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tldr_prompt_embeds_parts() {
        let p = tldr_prompt("German", "T", "S", "\\section{Introduction} I", "");
        assert!(p.contains("summary in German"));
        assert!(p.contains("\\title{T}"));
        assert!(p.contains("\\begin{abstract}S\\end{abstract}"));
        assert!(p.contains("\\section{Introduction} I"));
    }

    #[test]
    fn tags_prompt_optional_intro() {
        let without = tags_prompt("English", "T", "S", None);
        assert!(!without.contains("Introduction (excerpt)"));
        let with = tags_prompt("English", "T", "S", Some("intro text"));
        assert!(with.contains("Introduction (excerpt): intro text"));
        assert!(with.contains("5-8"));
    }

    #[test]
    fn tags_system_prompt_substitutes_language() {
        assert!(tags_system_prompt("Chinese").contains("results in Chinese"));
    }
}
