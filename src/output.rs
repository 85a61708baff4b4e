//! Output types: what a digested paper looks like once serialised.

use crate::error::ArtifactError;
use crate::pipeline::llm::LlmReply;
use serde::{Deserialize, Serialize};

/// Everything derived from one paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDigest {
    pub arxiv_id: String,
    pub title: String,
    /// Whether a source bundle was available and readable as an archive.
    pub source_available: bool,
    /// Markup file judged to hold the document root.
    pub main_file: Option<String>,
    pub code_url: Option<String>,
    pub overview: Option<OverviewFigure>,
    pub tldr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub affiliations: Option<Vec<String>>,
    /// Artifacts that could not be produced. Everything else is still filled in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ArtifactError>,
    pub stats: DigestStats,
}

/// The selected overview figure, ready for embedding in a preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewFigure {
    /// Raster image, base64 (standard alphabet).
    pub image_base64: String,
    pub mime_type: String,
    /// Plain-text caption.
    pub caption: String,
    /// Vision-model description, when requested and successful.
    pub description: Option<String>,
    /// Archive entry the image was read from.
    pub source_entry: String,
    pub priority: u32,
    pub matched_keywords: Vec<String>,
    /// Selected through the results-oriented fallback vocabulary.
    pub is_fallback: bool,
}

/// Counters and timings for one paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestStats {
    /// Markup files found in the archive.
    pub markup_files: usize,
    /// Characters in the merged (or joined) document text.
    pub document_chars: usize,
    /// Figure environments found.
    pub figures_found: usize,
    pub tokens: TokenUsage,
    pub resolve_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// LLM token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl From<&LlmReply> for TokenUsage {
    fn from(reply: &LlmReply) -> Self {
        Self {
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
        }
    }
}
