//! Document resolution: collapse a multi-file LaTeX bundle into one text.
//!
//! ## Steps
//!
//! 1. Enumerate `.tex` entries. None → no document.
//! 2. Guess the main file from the `.bbl` layout (see [`main_from_bibliography`]).
//! 3. Read and clean every `.tex` file; when step 2 was inconclusive the first
//!    cleaned file containing `\begin{document}` becomes main. Cleaning runs
//!    first because a commented-out `\begin{document}` must not count.
//! 4. Inline `\input{…}` / `\include{…}` of the main file, one level deep.
//!
//! The result is a flat arena of cleaned texts indexed by file name plus the
//! merged main text; downstream consumers only ever need flat text.

use crate::error::{ArchiveError, DigestError};
use crate::pipeline::archive::ArchiveReader;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

/// Synthetic key under which the merged main document is addressable.
pub const MERGED_KEY: &str = "all";

const MARKUP_EXT: &str = ".tex";
const BIBLIOGRAPHY_EXT: &str = ".bbl";

/// A resolved source bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedDocument {
    files: Vec<(String, String)>,
    main_file: Option<String>,
    merged: Option<String>,
}

impl ArchivedDocument {
    /// Cleaned markup files in archive order.
    pub fn files(&self) -> &[(String, String)] {
        &self.files
    }

    pub fn main_file(&self) -> Option<&str> {
        self.main_file.as_deref()
    }

    /// Fully inlined main document; `None` iff no main file was found.
    pub fn merged(&self) -> Option<&str> {
        self.merged.as_deref()
    }

    /// Look up a cleaned file by name; [`MERGED_KEY`] returns the merged text.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == MERGED_KEY {
            return self.merged();
        }
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    /// The best single body of text: merged when available, otherwise every
    /// cleaned file joined by newlines.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.merged {
            Some(m) => Cow::Borrowed(m.as_str()),
            None => Cow::Owned(
                self.files
                    .iter()
                    .map(|(_, c)| c.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

/// Resolve an opened archive into an [`ArchivedDocument`].
///
/// `Ok(None)` means "no markup in this bundle". Only a read failure on an
/// entry the index itself listed is fatal.
pub fn resolve_document(archive: &ArchiveReader) -> Result<Option<ArchivedDocument>, DigestError> {
    let tex_files: Vec<&String> = archive
        .entries()
        .iter()
        .filter(|n| n.ends_with(MARKUP_EXT))
        .collect();
    if tex_files.is_empty() {
        debug!("No {MARKUP_EXT} file in archive");
        return Ok(None);
    }

    let bbl_files: Vec<&String> = archive
        .entries()
        .iter()
        .filter(|n| n.ends_with(BIBLIOGRAPHY_EXT))
        .collect();

    let mut main_file = main_from_bibliography(&tex_files, &bbl_files);
    if main_file.is_none() {
        debug!("Main file undetermined from bibliography layout; scanning for \\begin{{document}}");
    }

    let mut files = Vec::with_capacity(tex_files.len());
    for name in tex_files {
        let raw = archive.read_entry(name).map_err(|e| match e {
            ArchiveError::NotFound { name } => DigestError::CorruptArchive {
                detail: format!("indexed entry '{name}' cannot be read"),
            },
            other => other.into(),
        })?;
        let content = clean_markup(&String::from_utf8_lossy(raw));
        if main_file.is_none() && RE_DOCUMENT_ROOT.is_match(&content) {
            debug!("Choosing {name} as main file (contains document root)");
            main_file = Some(name.clone());
        }
        files.push((name.clone(), content));
    }

    let merged = match &main_file {
        Some(main) => {
            let source = files
                .iter()
                .find(|(n, _)| n == main)
                .map(|(_, c)| c.as_str())
                .unwrap_or_default();
            Some(inline_includes(source, &files))
        }
        None => {
            debug!("No file contains the document root; merged text unavailable");
            None
        }
    };

    Ok(Some(ArchivedDocument {
        files,
        main_file,
        merged,
    }))
}

/// First-stage main-file heuristic based on the `.bbl` layout.
///
/// | `.bbl` files | `.tex` files | Result |
/// |--------------|--------------|--------|
/// | 1 | any | `<bbl stem>.tex` if present, else undetermined |
/// | 0 | 1 | that file |
/// | 0 | > 1 | undetermined |
/// | > 1 | any | undetermined |
pub fn main_from_bibliography(tex_files: &[&String], bbl_files: &[&String]) -> Option<String> {
    match bbl_files {
        [] => match tex_files {
            [only] => Some((*only).clone()),
            _ => {
                debug!("Several {MARKUP_EXT} files and no {BIBLIOGRAPHY_EXT} file");
                None
            }
        },
        [bbl] => {
            let stem = bbl.strip_suffix(BIBLIOGRAPHY_EXT).unwrap_or(bbl.as_str());
            let candidate = format!("{stem}{MARKUP_EXT}");
            if tex_files.iter().any(|t| **t == candidate) {
                Some(candidate)
            } else {
                debug!("{bbl} does not match any {MARKUP_EXT} file");
                None
            }
        }
        _ => {
            debug!("Several {BIBLIOGRAPHY_EXT} files");
            None
        }
    }
}

// ── Cleaning ─────────────────────────────────────────────────────────────────

static RE_DOCUMENT_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\begin\{document\}").unwrap());
// `%` preceded by an even run of backslashes starts a comment; `\%` is a literal.
static RE_LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(^|[^\\])((?:\\\\)*)%.*$").unwrap());
static RE_COMMENT_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\begin\{comment\}.*?\\end\{comment\}").unwrap());
static RE_IFFALSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\iffalse.*?\\fi\b").unwrap());
static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\x0C]{3,}").unwrap());

/// Strip comments and disabled regions and normalise whitespace.
pub fn clean_markup(raw: &str) -> String {
    let s = RE_LINE_COMMENT.replace_all(raw, "${1}${2}");
    let s = RE_COMMENT_ENV.replace_all(&s, "");
    let s = RE_IFFALSE.replace_all(&s, "");
    let s = RE_NEWLINES.replace_all(&s, "\n");
    let s = s.replace(r"\\", "");
    RE_HSPACE.replace_all(&s, " ").into_owned()
}

// ── Inlining ─────────────────────────────────────────────────────────────────

static RE_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:input|include)\{([^}]+)\}").unwrap());

/// Replace every first-level `\input{…}` / `\include{…}` with the cleaned
/// content of the referenced file.
///
/// Replacement text is not rescanned, so directives inside an inlined file
/// stay as written.
pub fn inline_includes(main_source: &str, files: &[(String, String)]) -> String {
    RE_INCLUDE
        .replace_all(main_source, |caps: &Captures<'_>| {
            let reference = caps[1].trim();
            let file_name = if reference.ends_with(MARKUP_EXT) {
                reference.to_string()
            } else {
                format!("{reference}{MARKUP_EXT}")
            };
            match lookup(files, &file_name) {
                Some(content) => content.to_string(),
                None => {
                    debug!("Included file {file_name} not in archive; dropping directive");
                    String::new()
                }
            }
        })
        .into_owned()
}

fn lookup<'a>(files: &'a [(String, String)], name: &str) -> Option<&'a str> {
    let wanted = name.trim_start_matches("./");
    files
        .iter()
        .find(|(n, _)| n == name || n.trim_start_matches("./") == wanted)
        .map(|(_, c)| c.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::archive::tests::tar_bytes;

    fn resolve(files: &[(&str, &str)]) -> Option<ArchivedDocument> {
        let entries: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (*n, c.as_bytes())).collect();
        let archive = ArchiveReader::open(&tar_bytes(&entries)).expect("open");
        resolve_document(&archive).expect("resolve")
    }

    #[test]
    fn strips_line_comments_but_keeps_escaped_percent() {
        let out = clean_markup("a 50\\% rate % a comment\nnext");
        assert_eq!(out, "a 50\\% rate \nnext");
    }

    #[test]
    fn comment_after_line_break_is_stripped() {
        let out = clean_markup("row one\\\\% note\n\\\\\\% kept");
        assert_eq!(out, "row one\n\\% kept");
    }

    #[test]
    fn strips_comment_env_and_iffalse() {
        let out = clean_markup("keep\\begin{comment}drop\\end{comment} \\iffalse gone \\fi\\fill");
        assert_eq!(out, "keep \\fill");
    }

    #[test]
    fn collapses_newlines_linebreaks_and_spaces() {
        let out = clean_markup("a\\\\\n\n\nb    c\t\t\td  e");
        assert_eq!(out, "a\nb c d  e");
    }

    #[test]
    fn single_tex_without_bbl_is_main() {
        let raw = "\\documentclass{article}\n\n%c\n\\begin{document}Hi\\end{document}";
        let doc = resolve(&[("paper.tex", raw)]).expect("document");
        assert_eq!(doc.main_file(), Some("paper.tex"));
        assert_eq!(doc.merged(), Some(clean_markup(raw).as_str()));
        assert_eq!(doc.get(MERGED_KEY), doc.get("paper.tex"));
    }

    #[test]
    fn bbl_stem_picks_main() {
        let doc = resolve(&[
            ("intro.tex", "\\section{Intro}"),
            ("ms.tex", "no marker here"),
            ("ms.bbl", "\\begin{thebibliography}"),
        ])
        .unwrap();
        assert_eq!(doc.main_file(), Some("ms.tex"));
    }

    #[test]
    fn unmatched_bbl_falls_back_to_marker_scan() {
        let doc = resolve(&[
            ("a.tex", "\\section{A}"),
            ("b.tex", "\\begin{document}\\input{a}\\end{document}"),
            ("refs.bbl", ""),
        ])
        .unwrap();
        assert_eq!(doc.main_file(), Some("b.tex"));
        assert_eq!(
            doc.merged(),
            Some("\\begin{document}\\section{A}\\end{document}")
        );
    }

    #[test]
    fn several_bbl_files_fall_back_to_marker_scan() {
        let doc = resolve(&[
            ("x.tex", "\\begin{document}x"),
            ("y.tex", "\\begin{document}y"),
            ("x.bbl", ""),
            ("y.bbl", ""),
        ])
        .unwrap();
        assert_eq!(doc.main_file(), Some("x.tex"));
    }

    #[test]
    fn commented_marker_does_not_count() {
        let doc = resolve(&[
            ("old.tex", "% \\begin{document}\nold"),
            ("new.tex", "\\begin{document}new"),
        ])
        .unwrap();
        assert_eq!(doc.main_file(), Some("new.tex"));
    }

    #[test]
    fn no_marker_means_no_merged_text() {
        let doc = resolve(&[("a.tex", "alpha"), ("b.tex", "beta")]).unwrap();
        assert_eq!(doc.main_file(), None);
        assert_eq!(doc.merged(), None);
        assert_eq!(doc.get(MERGED_KEY), None);
        assert_eq!(doc.text(), "alpha\nbeta");
    }

    #[test]
    fn archive_without_markup_is_absent() {
        assert!(resolve(&[("fig.png", "png")]).is_none());
    }

    #[test]
    fn inlining_is_one_level_deep() {
        let doc = resolve(&[
            ("main.tex", "\\begin{document}\n\\input{sec/one}\n\\include{two.tex}\n\\end{document}"),
            ("sec/one.tex", "ONE \\input{sec/deep}"),
            ("two.tex", "TWO"),
            ("sec/deep.tex", "DEEP"),
            ("main.bbl", ""),
        ])
        .unwrap();
        let merged = doc.merged().unwrap();
        assert!(merged.contains("ONE \\input{sec/deep}"), "got: {merged}");
        assert!(merged.contains("TWO"));
        assert!(!merged.contains("DEEP"));
    }

    #[test]
    fn missing_include_becomes_empty() {
        let merged = inline_includes("a\\input{ghost}b", &[]);
        assert_eq!(merged, "ab");
    }

    #[test]
    fn main_file_choice_is_deterministic() {
        let files = [
            ("b.tex", "\\begin{document}b"),
            ("a.tex", "\\begin{document}a"),
        ];
        let first = resolve(&files).unwrap();
        let second = resolve(&files).unwrap();
        assert_eq!(first.main_file(), Some("b.tex"));
        assert_eq!(first, second);
    }
}
