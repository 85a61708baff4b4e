//! Error types for the arxiv-digest library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`DigestError`]: **Fatal** for one paper: the source could not be
//!   fetched for a reason other than "not published", the archive is corrupt
//!   past its first header, the provider is not configured. Returned as
//!   `Err(DigestError)` from the top-level `digest*` functions.
//!
//! * [`ArtifactError`]: **Non-fatal**: one artifact (the overview image, the
//!   TL;DR, …) could not be produced. Stored in
//!   [`crate::output::PaperDigest::warnings`] while every other field is
//!   still filled in.
//!
//! * [`ArchiveError`]: low-level failures of [`crate::pipeline::archive`].
//!   Most are soft (`NotAnArchive`, `NotFound`); `CorruptArchive` is promoted
//!   to [`DigestError::CorruptArchive`] by the resolver.
//!
//! Expected absence (no source, no figure, no code link) is not an error at
//! all: it is `None`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arxiv-digest library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Local source archive was not found at the given path.
    #[error("Source archive not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path nor an arXiv identifier/URL.
    #[error("Invalid input '{input}': not a file path, an arXiv identifier or an arXiv URL")]
    InvalidInput { input: String },

    /// The e-print endpoint answered with something other than 200 or 404.
    ///
    /// A 404 is the normal "source not published" case and never ends up
    /// here. Anything else means the fetch assumptions broke.
    #[error("Failed to download source for '{arxiv_id}': {reason}")]
    SourceTransport { arxiv_id: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Source download timed out after {secs}s for '{arxiv_id}'\nIncrease --download-timeout.")]
    DownloadTimeout { arxiv_id: String, secs: u64 },

    // ── Archive errors ────────────────────────────────────────────────────
    /// The archive parsed for at least one entry and then broke.
    #[error("Source archive is corrupt: {detail}")]
    CorruptArchive { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the archive layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArchiveError {
    /// The payload is not a tar container (plain text, truncated gzip, …).
    #[error("payload is not a tar archive: {detail}")]
    NotAnArchive { detail: String },

    /// The payload started as a valid tar archive but could not be read to
    /// the end.
    #[error("archive corrupt after {entries_read} entries: {detail}")]
    CorruptArchive { entries_read: usize, detail: String },

    /// No entry with this exact name.
    #[error("no archive entry named '{name}'")]
    NotFound { name: String },

    /// PDF → raster conversion is not possible (pdfium missing, bad PDF).
    #[error("raster conversion unavailable: {detail}")]
    ConversionUnavailable { detail: String },
}

/// A non-fatal error for a single artifact of a paper.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ArtifactError {
    /// The selected figure declares no `\includegraphics` reference.
    #[error("figure {figure} has no image reference")]
    NoImageReference { figure: usize },

    /// None of the candidate entry names resolved.
    #[error("image '{reference}' not found in archive ({tried} candidates tried)")]
    ImageNotFound { reference: String, tried: usize },

    /// The entry resolved but could not be turned into a raster image.
    #[error("image '{entry}' could not be converted: {detail}")]
    ConversionFailed { entry: String, detail: String },

    /// An LLM call failed after retries.
    #[error("{task}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        task: String,
        retries: u32,
        detail: String,
    },

    /// An LLM call timed out.
    #[error("{task}: LLM call timed out after {secs}s")]
    Timeout { task: String, secs: u64 },
}

impl From<ArchiveError> for DigestError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::CorruptArchive { .. } => DigestError::CorruptArchive {
                detail: e.to_string(),
            },
            other => DigestError::Internal(other.to_string()),
        }
    }
}
