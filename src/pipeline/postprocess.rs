//! Post-processing: deterministic cleanup of markup captions and LLM text.
//!
//! Two independent pipelines live here:
//!
//! - [`clean_caption`] turns a raw LaTeX caption into one plain sentence that
//!   can be shown in a preview or placed in a prompt.
//! - [`clean_llm_text`] strips the formatting quirks models add to otherwise
//!   correct answers (code fences, CRLF, zero-width characters).
//!
//! Every rule is a pure `&str → String` pass so each one is testable on its
//! own, and rule order matters.

use once_cell::sync::Lazy;
use regex::Regex;

// ══ Captions ═════════════════════════════════════════════════════════════════

/// Reduce a raw LaTeX caption to plain text.
///
/// Rules (applied in order):
/// 1. Remove citation directives including a leading `~`
/// 2. Remove `\label{…}`
/// 3. Unescape `\% \& \_ \# \$`
/// 4. `~` → space
/// 5. Unwrap `\cmd{arg}` → `arg`, innermost first, until nothing changes
/// 6. Drop remaining bare directives, backslashes and braces
/// 7. Collapse whitespace and trim
///
/// The output contains no backslash, brace or tilde, so a second pass is a
/// no-op.
pub fn clean_caption(raw: &str) -> String {
    let s = remove_citations(raw);
    let s = remove_labels(&s);
    let s = unescape_specials(&s);
    let s = s.replace('~', " ");
    let s = unwrap_directives(&s);
    let s = drop_markup(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Citations ────────────────────────────────────────────────────────

static RE_CITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~?\\cite[a-zA-Z]*\*?(?:\[[^\]]*\])*\{[^}]*\}").unwrap());

fn remove_citations(input: &str) -> String {
    RE_CITE.replace_all(input, "").into_owned()
}

// ── Rule 2: Labels ───────────────────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\label\{[^}]*\}").unwrap());

fn remove_labels(input: &str) -> String {
    RE_LABEL.replace_all(input, "").into_owned()
}

// ── Rule 3: Escaped specials ─────────────────────────────────────────────────

static RE_ESCAPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([%&_#$])").unwrap());

fn unescape_specials(input: &str) -> String {
    RE_ESCAPED.replace_all(input, "${1}").into_owned()
}

// ── Rule 5: Single-argument directives ───────────────────────────────────────

static RE_UNARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\*?\{([^{}]*)\}").unwrap());

fn unwrap_directives(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = RE_UNARY.replace_all(&current, "${1}");
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

// ── Rule 6: Leftover markup ──────────────────────────────────────────────────

static RE_BARE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\*?").unwrap());

fn drop_markup(input: &str) -> String {
    RE_BARE_DIRECTIVE
        .replace_all(input, "")
        .replace(['\\', '{', '}'], "")
}

// ── Rule 7: Whitespace ───────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

// ══ LLM responses ════════════════════════════════════════════════════════════

/// Normalise a model response.
///
/// 1. Strip outer code fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim
pub fn clean_llm_text(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_drops_citation_and_label() {
        let raw = r"Overview of our proposed architecture~\cite{foo2020}.\label{fig:arch}";
        assert_eq!(clean_caption(raw), "Overview of our proposed architecture.");
    }

    #[test]
    fn caption_handles_cite_variants() {
        let raw = r"Compared with prior work \citep[see][p.~3]{a,b} and \citet*{c}.";
        assert_eq!(clean_caption(raw), "Compared with prior work and .");
    }

    #[test]
    fn caption_unwraps_nested_directives() {
        let raw = r"\textbf{The \emph{full} pipeline}: stage 1 \& stage 2 at 50\% cost";
        assert_eq!(
            clean_caption(raw),
            "The full pipeline: stage 1 & stage 2 at 50% cost"
        );
    }

    #[test]
    fn caption_drops_bare_directives() {
        let raw = "\\centering  Results   on\n \\small{ImageNet}\\\\ val";
        assert_eq!(clean_caption(raw), "Results on ImageNet val");
    }

    #[test]
    fn caption_cleaning_is_idempotent() {
        let samples = [
            r"Overview of our proposed architecture~\cite{foo2020}",
            r"\textbf{A}~\ref{fig:x} with \{braces\} and snake\_case",
            r"\small{\textit{\textbf{deep}}} \alpha_{1}",
            "",
        ];
        for raw in samples {
            let once = clean_caption(raw);
            assert_eq!(clean_caption(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn llm_text_strips_fences() {
        assert_eq!(clean_llm_text("```\nhello\n```"), "hello");
        assert_eq!(clean_llm_text("```json\n[\"a\"]\n```\n"), "[\"a\"]");
        assert_eq!(clean_llm_text("no fences"), "no fences");
    }

    #[test]
    fn llm_text_normalises_whitespace() {
        let input = "  line one   \r\n\r\n\r\n\r\nline two\u{200B}  ";
        assert_eq!(clean_llm_text(input), "line one\n\nline two");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("ab€cd", 3), "ab€");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 99), "abc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }
}
