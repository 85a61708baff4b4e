//! # arxiv-digest
//!
//! Digest arXiv papers from their LaTeX source bundles: find the code
//! repository link, pick and render the overview figure, and (optionally)
//! ask an LLM for a TL;DR, key terms and author affiliations.
//!
//! ## Pipeline Overview
//!
//! ```text
//! arXiv id / URL / local archive
//!  │
//!  ├─ 1. Fetch    download the e-print bundle (404 → no source)
//!  ├─ 2. Archive  gzip/tar index, entries read by name
//!  ├─ 3. Resolve  main file, comment cleanup, \input inlining
//!  ├─ 4. Links    GitHub / GitHub Pages / Hugging Face link
//!  ├─ 5. Figure   caption scoring, image lookup, PDF → PNG via pdfium
//!  ├─ 6. Enrich   TL;DR, tags, affiliations, figure description (LLM)
//!  └─ 7. Output   PaperDigest (JSON) + warnings + stats
//! ```
//!
//! Failures of a single artifact never abort a paper: they are reported in
//! [`PaperDigest::warnings`]. Only [`DigestError`] is fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv_digest::{digest, load_paper, DigestConfig, PaperMeta};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = DigestConfig::default();
//!     let meta = PaperMeta::new("2401.00001").with_title("Some paper");
//!     let paper = load_paper("2401.00001", meta, &config).await?;
//!     let digest = digest(&paper, &config).await?;
//!     println!("code: {:?}", digest.code_url);
//!     println!("tldr: {:?}", digest.tldr);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arxiv-digest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arxiv-digest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod paper;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DigestConfig, DigestConfigBuilder};
pub use digest::{digest, digest_batch, digest_sync, digest_to_file, load_paper, write_json};
pub use error::{ArchiveError, ArtifactError, DigestError};
pub use output::{DigestStats, OverviewFigure, PaperDigest, TokenUsage};
pub use paper::{Paper, PaperMeta};
pub use pipeline::fetch::{SourceBundle, SourceInput};
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback};
