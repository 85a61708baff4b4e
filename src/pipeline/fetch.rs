//! Source retrieval: turn a user-supplied path, arXiv identifier or arXiv URL
//! into the raw bytes of a source bundle.
//!
//! The e-print endpoint answers 404 for papers whose authors never uploaded
//! LaTeX (PDF-only submissions). That is an expected outcome and becomes
//! [`SourceBundle::NotPublished`]; every other non-success status is a
//! transport failure and aborts the paper.

use crate::config::DigestConfig;
use crate::error::DigestError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw source of one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBundle {
    /// Archive bytes as served (usually gzip-compressed tar).
    Available(Vec<u8>),
    /// The paper has no source bundle.
    NotPublished,
}

/// Where a paper's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// A local archive file.
    Local(PathBuf),
    /// An arXiv identifier, version suffix kept if given.
    Arxiv(String),
}

impl SourceInput {
    /// Identifier used in logs and the digest: the arXiv id, or the archive
    /// file name without its compression suffixes.
    pub fn label(&self) -> String {
        match self {
            SourceInput::Arxiv(id) => id.clone(),
            SourceInput::Local(path) => archive_stem(path),
        }
    }
}

static RE_NEW_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}\.\d{4,5}(?:v\d+)?$").unwrap());
static RE_OLD_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7}(?:v\d+)?$").unwrap());
static RE_ARXIV_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.|export\.)?arxiv\.org/(?:abs|pdf|e-print|src)/(.+?)(?:\.pdf)?/?$")
        .unwrap()
});
static RE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+$").unwrap());

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether `id` is a syntactically valid arXiv identifier.
pub fn is_arxiv_id(id: &str) -> bool {
    RE_NEW_ID.is_match(id) || RE_OLD_ID.is_match(id)
}

/// `2401.00001v3` → `2401.00001`.
pub fn strip_version(id: &str) -> &str {
    match RE_VERSION.find(id) {
        Some(m) => &id[..m.start()],
        None => id,
    }
}

/// Classify a command-line input.
///
/// Existing files win over identifier syntax, so an archive literally named
/// `2401.00001` is read from disk.
pub fn classify_input(input: &str) -> Result<SourceInput, DigestError> {
    let input = input.trim();
    if is_url(input) {
        return RE_ARXIV_URL
            .captures(input)
            .map(|c| c[1].to_string())
            .filter(|id| is_arxiv_id(id))
            .map(SourceInput::Arxiv)
            .ok_or_else(|| DigestError::InvalidInput {
                input: input.to_string(),
            });
    }

    let path = Path::new(input);
    if path.exists() {
        return Ok(SourceInput::Local(path.to_path_buf()));
    }
    if is_arxiv_id(input) {
        return Ok(SourceInput::Arxiv(input.to_string()));
    }
    if input.contains(std::path::MAIN_SEPARATOR) || path.extension().is_some() {
        return Err(DigestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Err(DigestError::InvalidInput {
        input: input.to_string(),
    })
}

/// Fetch the source bundle for `input`.
pub async fn fetch_source(
    input: &SourceInput,
    config: &DigestConfig,
) -> Result<SourceBundle, DigestError> {
    match input {
        SourceInput::Local(path) => read_local(path).await,
        SourceInput::Arxiv(id) => download_source(id, config).await,
    }
}

async fn read_local(path: &Path) -> Result<SourceBundle, DigestError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DigestError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DigestError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    debug!("Read local source archive: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceBundle::Available(bytes))
}

/// Download `{source_base_url}/{arxiv_id}`.
pub async fn download_source(
    arxiv_id: &str,
    config: &DigestConfig,
) -> Result<SourceBundle, DigestError> {
    let url = format!("{}/{}", config.source_base_url.trim_end_matches('/'), arxiv_id);
    info!("Downloading source: {url}");

    let transport = |reason: String| DigestError::SourceTransport {
        arxiv_id: arxiv_id.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.download_timeout_secs))
        .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| transport(e.to_string()))?;

    let response = client.get(&url).send().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                arxiv_id: arxiv_id.to_string(),
                secs: config.download_timeout_secs,
            }
        } else {
            transport(e.to_string())
        }
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        warn!("Source for {arxiv_id} not found (404); skipping source analysis");
        return Ok(SourceBundle::NotPublished);
    }
    if !status.is_success() {
        return Err(transport(format!("HTTP {status}")));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                arxiv_id: arxiv_id.to_string(),
                secs: config.download_timeout_secs,
            }
        } else {
            transport(e.to_string())
        }
    })?;
    info!("Downloaded {} bytes for {arxiv_id}", bytes.len());
    Ok(SourceBundle::Available(bytes.to_vec()))
}

fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    [".tar.gz", ".tgz", ".tar", ".gz"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .map(str::to_string)
        .unwrap_or(name)
}
