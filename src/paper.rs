//! A paper: metadata plus its source bundle, with the archive and resolved
//! document computed lazily and cached.
//!
//! Code-link and figure extraction both read the resolved document; the
//! cache makes sure the archive is opened and resolved once per paper no
//! matter how many artifacts are derived from it.

use crate::error::{ArchiveError, DigestError};
use crate::pipeline::archive::ArchiveReader;
use crate::pipeline::fetch::SourceBundle;
use crate::pipeline::figure::{self, FigureCandidate};
use crate::pipeline::links::extract_code_url;
use crate::pipeline::postprocess::truncate_chars;
use crate::pipeline::resolve::{resolve_document, ArchivedDocument};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Already-fetched article metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMeta {
    pub arxiv_id: String,
    pub title: String,
    /// The abstract.
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl PaperMeta {
    pub fn new(arxiv_id: impl Into<String>) -> Self {
        Self {
            arxiv_id: arxiv_id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }
}

/// One paper to digest.
#[derive(Debug)]
pub struct Paper {
    pub meta: PaperMeta,
    source: SourceBundle,
    archive: OnceCell<Option<Arc<ArchiveReader>>>,
    document: OnceCell<Option<ArchivedDocument>>,
}

impl Paper {
    pub fn new(meta: PaperMeta, source: SourceBundle) -> Self {
        Self {
            meta,
            source,
            archive: OnceCell::new(),
            document: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &SourceBundle {
        &self.source
    }

    /// The opened archive; `None` when there is no source or the payload is
    /// not an archive. A corrupt archive is an error.
    pub fn archive(&self) -> Result<Option<&Arc<ArchiveReader>>, DigestError> {
        let cached = self.archive.get_or_try_init(|| match &self.source {
            SourceBundle::NotPublished => {
                debug!("{}: no source bundle", self.meta.arxiv_id);
                Ok(None)
            }
            SourceBundle::Available(bytes) => match ArchiveReader::open(bytes) {
                Ok(reader) => Ok(Some(Arc::new(reader))),
                Err(ArchiveError::NotAnArchive { detail }) => {
                    debug!("{}: source is not an archive ({detail})", self.meta.arxiv_id);
                    Ok(None)
                }
                Err(e) => Err(DigestError::from(e)),
            },
        })?;
        Ok(cached.as_ref())
    }

    /// The resolved document, computed on first use.
    pub fn document(&self) -> Result<Option<&ArchivedDocument>, DigestError> {
        let cached = self.document.get_or_try_init(|| match self.archive()? {
            Some(archive) => resolve_document(archive),
            None => Ok(None),
        })?;
        Ok(cached.as_ref())
    }

    /// Code link from the abstract, else from the first `front_matter_chars`
    /// characters of the document.
    pub fn code_url(&self, front_matter_chars: usize) -> Result<Option<String>, DigestError> {
        if let Some(url) = extract_code_url(&self.meta.summary) {
            debug!("{}: code link found in abstract", self.meta.arxiv_id);
            return Ok(Some(url));
        }
        let Some(document) = self.document()? else {
            return Ok(None);
        };
        let text = document.text();
        let front = truncate_chars(&text, front_matter_chars);
        debug!(
            "{}: searching {} chars of front matter for a code link",
            self.meta.arxiv_id,
            front.chars().count()
        );
        let url = extract_code_url(front);
        if url.is_none() {
            debug!("{}: no code link found", self.meta.arxiv_id);
        }
        Ok(url)
    }

    /// The best overview-figure candidate of the document.
    pub fn overview_candidate(&self) -> Result<Option<FigureCandidate>, DigestError> {
        Ok(self
            .document()?
            .and_then(|document| figure::select(&document.text())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::archive::tests::{gzip, tar_bytes};

    fn paper(summary: &str, files: &[(&str, &str)]) -> Paper {
        let entries: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (*n, c.as_bytes())).collect();
        Paper::new(
            PaperMeta::new("2401.00001").with_summary(summary),
            SourceBundle::Available(gzip(&tar_bytes(&entries))),
        )
    }

    #[test]
    fn abstract_link_wins_without_opening_archive() {
        let p = Paper::new(
            PaperMeta::new("x").with_summary("Code: https://github.com/a/b"),
            SourceBundle::Available(b"garbage".to_vec()),
        );
        assert_eq!(
            p.code_url(8000).unwrap().as_deref(),
            Some("https://github.com/a/b")
        );
        assert!(p.archive.get().is_none());
    }

    #[test]
    fn front_matter_window_limits_search() {
        let body = format!(
            "\\begin{{document}}{}\\url{{https://github.com/late/repo}}",
            "x".repeat(200)
        );
        let p = paper("no link", &[("main.tex", body.as_str())]);
        assert_eq!(p.code_url(100).unwrap(), None);
        assert_eq!(
            p.code_url(8000).unwrap().as_deref(),
            Some("https://github.com/late/repo")
        );
    }

    #[test]
    fn not_published_has_no_document() {
        let p = Paper::new(PaperMeta::new("x"), SourceBundle::NotPublished);
        assert!(p.document().unwrap().is_none());
        assert_eq!(p.code_url(8000).unwrap(), None);
        assert_eq!(p.overview_candidate().unwrap(), None);
    }

    #[test]
    fn non_archive_payload_is_absent() {
        let p = Paper::new(
            PaperMeta::new("x"),
            SourceBundle::Available(gzip(b"\\documentclass{article} just one file")),
        );
        assert!(p.archive().unwrap().is_none());
        assert!(p.document().unwrap().is_none());
    }

    #[test]
    fn document_is_resolved_once() {
        let p = paper("", &[("main.tex", "\\begin{document}hi")]);
        let first = p.document().unwrap().unwrap() as *const ArchivedDocument;
        let second = p.document().unwrap().unwrap() as *const ArchivedDocument;
        assert_eq!(first, second);
    }

    #[test]
    fn overview_candidate_reads_merged_text() {
        let p = paper(
            "",
            &[
                ("main.tex", "\\begin{document}\\input{figs}\\end{document}"),
                (
                    "figs.tex",
                    "\\begin{figure}\\includegraphics{arch}\\caption{Framework overview}\\end{figure}",
                ),
            ],
        );
        let fig = p.overview_candidate().unwrap().expect("figure");
        assert_eq!(fig.image_reference.as_deref(), Some("arch"));
        assert_eq!(fig.priority, 18);
    }
}
