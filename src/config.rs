//! Configuration types for paper digestion.
//!
//! Everything tunable lives in [`DigestConfig`], built via
//! [`DigestConfigBuilder`]. The heuristics (front-matter window, vocabulary)
//! run without any network or model access; the LLM knobs only matter when
//! `enable_llm` is set.

use crate::error::DigestError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for digesting one or more papers.
///
/// # Example
/// ```rust
/// use arxiv_digest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .front_matter_chars(6000)
///     .language("French")
///     .enable_llm(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.front_matter_chars, 6000);
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Characters at the start of the document text searched for a code link
    /// when the abstract has none. Default: 8000.
    ///
    /// The window covers the preamble, title block, abstract and the start of
    /// the introduction, where code links almost always sit.
    pub front_matter_chars: usize,

    /// Output language of generated summaries. Default: "English".
    pub language: String,

    /// Run TL;DR, tag, affiliation and figure-description generation. Default: true.
    pub enable_llm: bool,

    /// Ask the vision model to describe the selected figure. Default: true.
    pub describe_figure: bool,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 1024.
    pub max_tokens: usize,

    /// Retries after the first failed LLM attempt. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 5000.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Source download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Base URL of the e-print endpoint; the arXiv id is appended.
    /// Default: "https://arxiv.org/e-print".
    pub source_base_url: String,

    /// Longest edge of a rasterised PDF figure in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Explicit pdfium shared library. Default: `PDFIUM_LIB_PATH`, else the
    /// system search path.
    pub pdfium_library: Option<PathBuf>,

    /// Character budget of the TL;DR prompt. Default: 16000.
    pub prompt_char_budget: usize,

    /// Papers digested concurrently by [`crate::digest_batch`]. Default: 4.
    pub concurrency: usize,

    /// Optional per-paper progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            front_matter_chars: 8000,
            language: "English".to_string(),
            enable_llm: true,
            describe_figure: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 5000,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            source_base_url: "https://arxiv.org/e-print".to_string(),
            max_rendered_pixels: 2000,
            pdfium_library: std::env::var_os("PDFIUM_LIB_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            prompt_char_budget: 16000,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("front_matter_chars", &self.front_matter_chars)
            .field("language", &self.language)
            .field("enable_llm", &self.enable_llm)
            .field("describe_figure", &self.describe_figure)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("source_base_url", &self.source_base_url)
            .field("pdfium_library", &self.pdfium_library)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DigestProgressCallback>"),
            )
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigestConfig`].
#[derive(Debug)]
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn front_matter_chars(mut self, n: usize) -> Self {
        self.config.front_matter_chars = n;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn enable_llm(mut self, v: bool) -> Self {
        self.config.enable_llm = v;
        self
    }

    pub fn describe_figure(mut self, v: bool) -> Self {
        self.config.describe_figure = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn source_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_base_url = url.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn prompt_char_budget(mut self, n: usize) -> Self {
        self.config.prompt_char_budget = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if c.front_matter_chars == 0 {
            return Err(DigestError::InvalidConfig(
                "front_matter_chars must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DigestError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.language.trim().is_empty() {
            return Err(DigestError::InvalidConfig("language must not be empty".into()));
        }
        if c.prompt_char_budget < 1000 {
            return Err(DigestError::InvalidConfig(format!(
                "prompt_char_budget must be ≥ 1000, got {}",
                c.prompt_char_budget
            )));
        }
        if !(c.source_base_url.starts_with("http://") || c.source_base_url.starts_with("https://"))
        {
            return Err(DigestError::InvalidConfig(format!(
                "source_base_url must be an http(s) URL, got '{}'",
                c.source_base_url
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let c = DigestConfig::default();
        assert_eq!(c.front_matter_chars, 8000);
        assert_eq!(c.language, "English");
        assert!(c.enable_llm);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 5000);
        assert_eq!(c.api_timeout_secs, 120);
        assert_eq!(c.source_base_url, "https://arxiv.org/e-print");
        assert_eq!(c.concurrency, 4);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = DigestConfig::builder()
            .temperature(9.0)
            .concurrency(0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_rendered_pixels, 100);

        let err = DigestConfig::builder().front_matter_chars(0).build().unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig(_)));

        let err = DigestConfig::builder()
            .source_base_url("ftp://mirror")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://mirror"));
    }

    #[test]
    fn debug_hides_provider() {
        let c = DigestConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("DigestConfig"));
        assert!(dbg.contains("front_matter_chars: 8000"));
    }
}
