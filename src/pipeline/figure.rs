//! Overview-figure selection.
//!
//! Every `figure` / `figure*` environment becomes a [`FigureCandidate`]. Its
//! cleaned caption is scored against a weighted vocabulary of words that
//! usually describe a method overview. When no caption scores, a second
//! vocabulary of results-oriented words is tried and the survivors are
//! flagged as fallbacks. The highest score wins; ties go to the figure that
//! appears first.

use crate::pipeline::postprocess::clean_caption;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Words that suggest an overview / architecture figure.
pub const PRIMARY_VOCABULARY: &[(&str, u32)] = &[
    ("overview", 10),
    ("architecture", 8),
    ("framework", 8),
    ("pipeline", 7),
    ("proposed", 5),
    ("diagram", 5),
    ("illustration", 4),
    ("approach", 4),
    ("structure", 3),
    ("method", 3),
    ("model", 2),
];

/// Words used when no caption matches [`PRIMARY_VOCABULARY`].
pub const FALLBACK_VOCABULARY: &[(&str, u32)] = &[
    ("result", 3),
    ("performance", 3),
    ("comparison", 2),
    ("experiment", 2),
    ("evaluation", 2),
    ("ablation", 2),
    ("visualization", 1),
    ("example", 1),
];

/// One figure environment found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureCandidate {
    /// Position among all figure environments, in document order.
    pub index: usize,
    pub raw_block: String,
    /// Raw caption argument, braces balanced, markup intact.
    pub caption: String,
    pub priority: u32,
    pub matched_keywords: Vec<String>,
    pub is_fallback: bool,
    /// First `\includegraphics` argument, if the block declares one.
    pub image_reference: Option<String>,
}

impl FigureCandidate {
    pub fn cleaned_caption(&self) -> String {
        clean_caption(&self.caption)
    }
}

static RE_FIGURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{figure\*?\}.*?\\end\{figure\*?\}").unwrap());
static RE_CAPTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\caption\*?\s*(?:\[[^\]]*\])?\s*\{").unwrap());
static RE_INCLUDEGRAPHICS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\includegraphics\*?\s*(?:\[[^\]]*\])?\s*\{([^}]+)\}").unwrap()
});

/// All figure environments in `text`, unscored.
pub fn extract_figures(text: &str) -> Vec<FigureCandidate> {
    RE_FIGURE
        .find_iter(text)
        .enumerate()
        .map(|(index, m)| {
            let block = m.as_str();
            FigureCandidate {
                index,
                raw_block: block.to_string(),
                caption: caption_of(block).unwrap_or_default(),
                priority: 0,
                matched_keywords: Vec::new(),
                is_fallback: false,
                image_reference: image_reference_of(block),
            }
        })
        .collect()
}

/// Pick the overview figure of `text`, if any caption scores.
pub fn select(text: &str) -> Option<FigureCandidate> {
    let figures: Vec<FigureCandidate> = extract_figures(text)
        .into_iter()
        .filter(|f| !f.caption.trim().is_empty())
        .collect();
    if figures.is_empty() {
        debug!("No captioned figure environment found");
        return None;
    }

    let mut ranked = score_all(&figures, PRIMARY_VOCABULARY, false);
    if ranked.is_empty() {
        debug!(
            "No caption matched the primary vocabulary; trying fallback over {} figures",
            figures.len()
        );
        ranked = score_all(&figures, FALLBACK_VOCABULARY, true);
    }

    // Stable: equal priorities keep document order.
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
    let best = ranked.into_iter().next();
    match &best {
        Some(f) => debug!(
            "Selected figure {} (priority {}, keywords {:?}, fallback {})",
            f.index, f.priority, f.matched_keywords, f.is_fallback
        ),
        None => debug!("No figure caption matched any vocabulary"),
    }
    best
}

fn score_all(
    figures: &[FigureCandidate],
    vocabulary: &[(&str, u32)],
    is_fallback: bool,
) -> Vec<FigureCandidate> {
    figures
        .iter()
        .filter_map(|f| {
            let (priority, matched) = score_caption(&f.cleaned_caption(), vocabulary);
            (priority > 0).then(|| FigureCandidate {
                priority,
                matched_keywords: matched,
                is_fallback,
                ..f.clone()
            })
        })
        .collect()
}

/// Sum the weights of every vocabulary word that occurs in `caption`
/// (case-insensitive substring match).
pub fn score_caption(caption: &str, vocabulary: &[(&str, u32)]) -> (u32, Vec<String>) {
    let lower = caption.to_lowercase();
    let mut priority = 0;
    let mut matched = Vec::new();
    for (word, weight) in vocabulary {
        if lower.contains(word) {
            priority += weight;
            matched.push((*word).to_string());
        }
    }
    (priority, matched)
}

/// Argument of the first `\caption[...]{…}` in `block`, braces balanced.
fn caption_of(block: &str) -> Option<String> {
    let start = RE_CAPTION_START.find(block)?.end();
    balanced_argument(&block[start..])
}

fn image_reference_of(block: &str) -> Option<String> {
    RE_INCLUDEGRAPHICS
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read up to the `}` that closes an already opened brace.
///
/// Escaped braces (`\{`, `\}`) do not count. `None` when the argument is
/// never closed.
fn balanced_argument(after_open: &str) -> Option<String> {
    let mut depth = 1usize;
    let mut escaped = false;
    for (i, ch) in after_open.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(after_open[..i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figure(env: &str, body: &str) -> String {
        format!("\\begin{{{env}}}\n\\centering\n{body}\n\\end{{{env}}}\n")
    }

    #[test]
    fn extracts_both_figure_forms_in_order() {
        let text = format!(
            "{}text{}",
            figure("figure", "\\includegraphics[width=\\linewidth]{fig/a}\\caption{A}"),
            figure("figure*", "\\includegraphics*{b.pdf}\\caption{B}")
        );
        let figs = extract_figures(&text);
        assert_eq!(figs.len(), 2);
        assert_eq!(figs[0].caption, "A");
        assert_eq!(figs[0].image_reference.as_deref(), Some("fig/a"));
        assert_eq!(figs[1].index, 1);
        assert_eq!(figs[1].image_reference.as_deref(), Some("b.pdf"));
    }

    #[test]
    fn caption_is_brace_balanced_and_skips_short_form() {
        let block = figure(
            "figure",
            "\\caption[Short]{The \\textbf{full} model \\{x\\} here}\\label{f}",
        );
        let figs = extract_figures(&block);
        assert_eq!(figs[0].caption, "The \\textbf{full} model \\{x\\} here");
    }

    #[test]
    fn scenario_overview_beats_results() {
        let text = format!(
            "{}{}",
            figure("figure", "\\caption{Qualitative results}"),
            figure(
                "figure*",
                "\\caption{Overview of our proposed architecture~\\cite{foo2020}}"
            )
        );
        let best = select(&text).expect("selected");
        assert_eq!(best.index, 1);
        assert!(best.priority >= 18, "priority {}", best.priority);
        assert!(!best.is_fallback);
        assert_eq!(
            best.matched_keywords,
            vec!["overview", "architecture", "proposed"]
        );
    }

    #[test]
    fn fallback_vocabulary_marks_candidates() {
        let text = figure("figure", "\\caption{Qualitative results}");
        let best = select(&text).expect("fallback");
        assert!(best.is_fallback);
        assert_eq!(best.priority, 3);
    }

    #[test]
    fn ties_keep_document_order() {
        let text = format!(
            "{}{}",
            figure("figure", "\\caption{Method one}"),
            figure("figure", "\\caption{Method two}")
        );
        assert_eq!(select(&text).unwrap().index, 0);
    }

    #[test]
    fn never_returns_zero_priority() {
        let text = format!(
            "{}{}",
            figure("figure", "\\caption{A photograph}"),
            figure("figure", "no caption here")
        );
        assert_eq!(select(&text), None);
        assert_eq!(select("no figures at all"), None);
    }

    #[test]
    fn uncaptioned_figure_is_excluded() {
        let text = format!(
            "{}{}",
            figure("figure", "\\includegraphics{overview.png}"),
            figure("figure", "\\caption{Model}")
        );
        assert_eq!(select(&text).unwrap().index, 1);
    }

    #[test]
    fn scores_on_cleaned_caption() {
        let (priority, matched) = score_caption("The Pipeline", PRIMARY_VOCABULARY);
        assert_eq!(priority, 7);
        assert_eq!(matched, vec!["pipeline"]);
    }
}
